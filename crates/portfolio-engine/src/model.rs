//! Domain Models
//!
//! Core data types shared by the scanner, analyzer, generator and executor.
//! Money and quantities are `rust_decimal`; statistics (returns, fractions,
//! volatility) are `f64`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EngineError, Result};

/// Tolerance used when checking that fractions sum to one
pub const FRACTION_EPSILON: f64 = 1e-6;

/// Declared risk appetite of a portfolio or investor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskProfile {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl RiskProfile {
    pub const ALL: [Self; 3] = [Self::Conservative, Self::Moderate, Self::Aggressive];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Moderate => "moderate",
            Self::Aggressive => "aggressive",
        }
    }

    /// Target annualized portfolio volatility, in percent
    pub const fn target_volatility(self) -> f64 {
        match self {
            Self::Conservative => 10.0,
            Self::Moderate => 15.0,
            Self::Aggressive => 20.0,
        }
    }

    /// Long-run asset-class targets used when checking an existing portfolio
    pub fn holding_targets(self) -> AssetAllocation {
        let (equity, fixed_income, alternatives, cash) = match self {
            Self::Conservative => (0.40, 0.50, 0.05, 0.05),
            Self::Moderate => (0.60, 0.30, 0.07, 0.03),
            Self::Aggressive => (0.80, 0.15, 0.03, 0.02),
        };
        AssetAllocation::from_pairs([
            ("equity", equity),
            ("fixed_income", fixed_income),
            ("alternatives", alternatives),
            ("cash", cash),
        ])
    }
}

impl std::fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentHorizon {
    Short,
    #[default]
    Medium,
    Long,
}

impl InvestmentHorizon {
    pub const ALL: [Self; 3] = [Self::Short, Self::Medium, Self::Long];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }
}

/// Map common asset-class spellings onto one label.
///
/// Reports keep the caller's labels; comparisons against target tables go
/// through this.
pub fn canonical_asset_class(label: &str) -> String {
    let lower = label.trim().to_lowercase().replace([' ', '-'], "_");
    match lower.as_str() {
        "equity" | "equities" | "stock" | "stocks" => "equity".into(),
        "bond" | "bonds" | "fixed_income" | "fixedincome" => "fixed_income".into(),
        "alternative" | "alternatives" | "alts" => "alternatives".into(),
        "cash" | "money_market" | "cash_equivalents" => "cash".into(),
        _ => lower,
    }
}

fn unknown_label() -> String {
    "unknown".into()
}

/// A single position in a portfolio
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Ticker symbol; stored upper-cased
    pub symbol: String,

    /// Units held
    #[serde(default)]
    pub quantity: Decimal,

    /// Current market value
    pub value: Decimal,

    /// Asset-class label (equity, bond, cash, ...)
    pub asset_class: String,

    #[serde(default = "unknown_label")]
    pub sector: String,
}

impl Holding {
    pub fn new(
        symbol: impl Into<String>,
        value: Decimal,
        asset_class: impl Into<String>,
        sector: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            quantity: Decimal::ZERO,
            value,
            asset_class: asset_class.into(),
            sector: sector.into(),
        }
    }

    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(EngineError::invalid("holding symbol must not be empty"));
        }
        if self.value < Decimal::ZERO {
            return Err(EngineError::invalid(format!(
                "holding {} has negative value {}",
                self.symbol, self.value
            )));
        }
        if self.quantity < Decimal::ZERO {
            return Err(EngineError::invalid(format!(
                "holding {} has negative quantity {}",
                self.symbol, self.quantity
            )));
        }
        if self.asset_class.trim().is_empty() {
            return Err(EngineError::invalid(format!(
                "holding {} is missing an asset class",
                self.symbol
            )));
        }
        Ok(())
    }
}

/// Holdings plus the owner's declared risk profile.
///
/// Duplicate symbols are allowed and aggregate wherever values are grouped.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub holdings: Vec<Holding>,

    #[serde(default)]
    pub risk_profile: RiskProfile,
}

impl Portfolio {
    pub fn new(holdings: Vec<Holding>, risk_profile: RiskProfile) -> Self {
        let holdings = holdings
            .into_iter()
            .map(|mut h| {
                h.symbol = h.symbol.trim().to_uppercase();
                h
            })
            .collect();
        Self { holdings, risk_profile }
    }

    pub fn validate(&self) -> Result<()> {
        self.holdings.iter().try_for_each(Holding::validate)?;
        if self.checked_total_value().is_none() {
            return Err(EngineError::invalid("total portfolio value overflows"));
        }
        Ok(())
    }

    /// Sum of holding values, `None` on overflow
    pub fn checked_total_value(&self) -> Option<Decimal> {
        self.holdings
            .iter()
            .try_fold(Decimal::ZERO, |total, h| total.checked_add(h.value))
    }

    /// Sum of holding values; saturates where `validate` would reject
    pub fn total_value(&self) -> Decimal {
        self.checked_total_value().unwrap_or(Decimal::MAX)
    }

    /// Value per symbol, duplicates summed
    pub fn value_by_symbol(&self) -> BTreeMap<String, Decimal> {
        self.group_by(|h| h.symbol.clone())
    }

    pub fn value_by_asset_class(&self) -> BTreeMap<String, Decimal> {
        self.group_by(|h| h.asset_class.clone())
    }

    pub fn value_by_sector(&self) -> BTreeMap<String, Decimal> {
        self.group_by(|h| h.sector.clone())
    }

    /// Current allocation keyed by canonical asset class
    pub fn allocation(&self) -> AssetAllocation {
        let total = self.total_value();
        if total <= Decimal::ZERO {
            return AssetAllocation::default();
        }

        let mut fractions = BTreeMap::new();
        for (class, value) in self.group_by(|h| canonical_asset_class(&h.asset_class)) {
            fractions.insert(class, ratio(value, total));
        }
        AssetAllocation(fractions)
    }

    fn group_by(&self, key: impl Fn(&Holding) -> String) -> BTreeMap<String, Decimal> {
        let mut groups: BTreeMap<String, Decimal> = BTreeMap::new();
        for holding in &self.holdings {
            *groups.entry(key(holding)).or_default() += holding.value;
        }
        groups
    }
}

/// `part / total` as a float; zero when the total is not positive
pub fn ratio(part: Decimal, total: Decimal) -> f64 {
    if total <= Decimal::ZERO {
        return 0.0;
    }
    (part / total).to_f64().unwrap_or(0.0)
}

/// Mapping from asset-class label to target fraction
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetAllocation(pub BTreeMap<String, f64>);

impl AssetAllocation {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    pub fn get(&self, asset_class: &str) -> f64 {
        self.0.get(asset_class).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the fractions sum to one within `FRACTION_EPSILON`
    pub fn is_normalized(&self) -> bool {
        (self.total() - 1.0).abs() <= FRACTION_EPSILON
    }

    /// Scale so fractions sum to one; an all-zero allocation stays as is
    pub fn normalized(&self) -> Self {
        let total = self.total();
        if total <= 0.0 {
            return self.clone();
        }
        Self(self.0.iter().map(|(k, v)| (k.clone(), v / total)).collect())
    }

    /// Merge synonymous labels (`bonds` and `fixed_income`, ...)
    pub fn canonicalized(&self) -> Self {
        let mut merged: BTreeMap<String, f64> = BTreeMap::new();
        for (class, fraction) in &self.0 {
            *merged.entry(canonical_asset_class(class)).or_default() += fraction;
        }
        Self(merged)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some((class, fraction)) = self.0.iter().find(|(_, f)| !f.is_finite() || **f < 0.0) {
            return Err(EngineError::invalid(format!(
                "allocation for {class} must be a non-negative fraction, got {fraction}"
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Retirement,
    Education,
    HomePurchase,
    Income,
    #[serde(other)]
    Other,
}

/// One investment goal of an investor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvestmentGoal {
    #[serde(alias = "type")]
    pub goal_type: GoalType,

    #[serde(alias = "amount")]
    pub target_amount: Decimal,

    pub time_horizon_years: u32,
}

impl InvestmentGoal {
    pub const fn new(goal_type: GoalType, target_amount: Decimal, time_horizon_years: u32) -> Self {
        Self { goal_type, target_amount, time_horizon_years }
    }

    /// Yearly amount the goal asks for; larger and nearer goals pull harder
    pub fn pull(&self) -> f64 {
        let years = Decimal::from(self.time_horizon_years.max(1));
        (self.target_amount / years).to_f64().unwrap_or(0.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestorProfile {
    #[serde(default)]
    pub risk_tolerance: RiskProfile,

    #[serde(default)]
    pub investment_horizon: InvestmentHorizon,

    #[serde(default, alias = "investment_goals")]
    pub goals: Vec<InvestmentGoal>,
}

impl InvestorProfile {
    pub const fn new(risk_tolerance: RiskProfile, investment_horizon: InvestmentHorizon) -> Self {
        Self {
            risk_tolerance,
            investment_horizon,
            goals: Vec::new(),
        }
    }

    pub fn with_goal(mut self, goal: InvestmentGoal) -> Self {
        self.goals.push(goal);
        self
    }

    pub fn validate(&self) -> Result<()> {
        for goal in &self.goals {
            if goal.target_amount < Decimal::ZERO {
                return Err(EngineError::invalid(format!(
                    "goal target amount must not be negative, got {}",
                    goal.target_amount
                )));
            }
            if goal.time_horizon_years == 0 {
                return Err(EngineError::invalid("goal time horizon must be at least one year"));
            }
        }
        if self.goal_total().is_none() {
            return Err(EngineError::invalid("total goal amount overflows"));
        }
        Ok(())
    }

    /// Sum of goal target amounts, `None` on overflow
    pub fn goal_total(&self) -> Option<Decimal> {
        self.goals
            .iter()
            .try_fold(Decimal::ZERO, |total, g| total.checked_add(g.target_amount))
    }
}

/// One OHLCV bar
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Bar whose open/high/low all equal the close
    pub const fn flat(timestamp: DateTime<Utc>, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }
}

/// Chronological bar history for one symbol
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Bars are sorted by timestamp on construction
    pub fn new(symbol: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        Self {
            symbol: symbol.into().to_uppercase(),
            bars,
        }
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// The most recent `n` bars (all of them if fewer)
    pub fn tail(&self, n: usize) -> &[PriceBar] {
        &self.bars[self.bars.len().saturating_sub(n)..]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    #[serde(alias = "BUY")]
    Buy,
    #[serde(alias = "SELL")]
    Sell,
}

impl Side {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl OrderType {
    pub const fn requires_price(self) -> bool {
        !matches!(self, Self::Market)
    }
}

/// A single proposed order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeProposal {
    pub symbol: String,

    #[serde(alias = "action")]
    pub side: Side,

    pub quantity: Decimal,

    #[serde(default)]
    pub order_type: OrderType,

    /// Limit or stop trigger price; required for every non-market order
    #[serde(default, alias = "price")]
    pub limit_price: Option<Decimal>,

    /// Last known price, used to simulate market fills
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_price: Option<Decimal>,
}

impl TradeProposal {
    pub fn market(symbol: impl Into<String>, side: Side, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            side,
            quantity,
            order_type: OrderType::Market,
            limit_price: None,
            reference_price: None,
        }
    }

    pub fn limit(symbol: impl Into<String>, side: Side, quantity: Decimal, price: Decimal) -> Self {
        Self {
            order_type: OrderType::Limit,
            limit_price: Some(price),
            ..Self::market(symbol, side, quantity)
        }
    }

    pub const fn with_reference_price(mut self, price: Decimal) -> Self {
        self.reference_price = Some(price);
        self
    }
}
