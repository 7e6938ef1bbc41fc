//! Portfolio Optimization
//!
//! Re-weights a portfolio's symbols from their historical risk and return,
//! then lists the per-symbol trades that move it to the new weights.
//!
//! Base weights are proportional to each symbol's positive Sharpe ratio,
//! falling back to inverse volatility when no symbol has one. The base is
//! blended with equal weights by `risk factor × objective factor`; above 1
//! the base is used as is.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use super::metrics::{self, ReturnPanel};
use crate::config::RiskConfig;
use crate::error::{EngineError, Result};
use crate::market::SkippedSymbol;
use crate::model::{Portfolio, PriceSeries, RiskProfile, ratio};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    Income,
    #[default]
    Balanced,
    Growth,
}

impl Objective {
    pub const fn factor(self) -> f64 {
        match self {
            Self::Income => 0.5,
            Self::Balanced => 1.0,
            Self::Growth => 1.5,
        }
    }
}

const fn risk_factor(risk: RiskProfile) -> f64 {
    match risk {
        RiskProfile::Conservative => 0.5,
        RiskProfile::Moderate => 1.0,
        RiskProfile::Aggressive => 2.0,
    }
}

/// What to optimize for, and symbols worth adding beyond the holdings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationRequest {
    #[serde(default)]
    pub objective: Objective,

    #[serde(default)]
    pub candidates: Vec<String>,
}

impl OptimizationRequest {
    /// Trimmed, upper-cased, deduplicated candidate symbols
    pub fn candidate_symbols(&self) -> BTreeSet<String> {
        self.candidates
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// How the pre-blend weights were derived
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingMethod {
    Sharpe,
    InverseVolatility,
    Equal,

    /// No symbol had usable history; targets equal current weights
    Unchanged,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceActionKind {
    Buy,
    Sell,
    BuyNew,
    SellAll,
}

/// One per-symbol move toward the optimized weights
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RebalanceAction {
    pub symbol: String,
    pub action: RebalanceActionKind,
    pub current_weight: f64,
    pub target_weight: f64,

    /// `target_weight − current_weight`
    pub weight_difference: f64,

    /// Signed value to trade; negative sells
    pub value_difference: Decimal,
}

/// Annualized statistics of the optimized weights over the common window, in percent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpectedMetrics {
    pub expected_return: f64,
    pub expected_volatility: f64,
    pub sharpe_ratio: Option<f64>,
    pub observations: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub optimized_at: DateTime<Utc>,
    pub risk_profile: RiskProfile,
    pub objective: Objective,
    pub method: WeightingMethod,
    pub blend_factor: f64,

    /// Symbol → target fraction of total value; sums to one
    pub target_weights: BTreeMap<String, f64>,

    /// Largest absolute value difference first, ties by symbol
    pub rebalancing_plan: Vec<RebalanceAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<ExpectedMetrics>,

    /// Symbols left at their current weight for lack of usable history
    pub skipped: Vec<SkippedSymbol>,
}

/// Optimize `portfolio` over its holdings plus the request's candidates.
///
/// Held symbols without usable history keep their current weight and the
/// rest of the value is optimized. Symbols in `already_skipped` are not
/// looked up again.
pub fn optimize(
    portfolio: &Portfolio,
    request: &OptimizationRequest,
    history: &BTreeMap<String, PriceSeries>,
    already_skipped: Vec<SkippedSymbol>,
    config: &RiskConfig,
) -> Result<OptimizationReport> {
    portfolio.validate()?;
    let total = portfolio.total_value();
    if total <= Decimal::ZERO {
        return Err(EngineError::invalid("optimization needs a portfolio with positive value"));
    }

    let current: BTreeMap<String, f64> = portfolio
        .value_by_symbol()
        .into_iter()
        .map(|(symbol, value)| (symbol, ratio(value, total)))
        .collect();

    let mut universe: BTreeSet<String> = current.keys().cloned().collect();
    universe.extend(request.candidate_symbols());

    let mut skipped = already_skipped;
    let mut covered: Vec<(String, &PriceSeries)> = Vec::new();
    for symbol in &universe {
        if skipped.iter().any(|s| &s.symbol == symbol) {
            continue;
        }
        match history.get(symbol) {
            None => skipped.push(SkippedSymbol::new(symbol, "no price history")),
            Some(series) => match metrics::usable(series) {
                Ok(()) => covered.push((symbol.clone(), series)),
                Err(reason) => skipped.push(SkippedSymbol::new(symbol, reason)),
            },
        }
    }
    skipped.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    skipped.dedup_by(|a, b| a.symbol == b.symbol);

    let frozen: BTreeMap<String, f64> = skipped
        .iter()
        .filter_map(|s| current.get(&s.symbol).map(|w| (s.symbol.clone(), *w)))
        .collect();
    let free_share = (1.0 - frozen.values().sum::<f64>()).max(0.0);

    let risk_profile = portfolio.risk_profile;
    let blend_factor = risk_factor(risk_profile) * request.objective.factor();

    let panel = ReturnPanel::aligned(covered.iter().map(|(symbol, series)| (symbol.clone(), 0.0, *series)));
    let Some(panel) = panel else {
        tracing::warn!(symbols = universe.len(), "no usable history; optimization leaves weights unchanged");
        return Ok(OptimizationReport {
            optimized_at: Utc::now(),
            risk_profile,
            objective: request.objective,
            method: WeightingMethod::Unchanged,
            blend_factor,
            target_weights: current,
            rebalancing_plan: Vec::new(),
            expected: None,
            skipped,
        });
    };

    let (method, weights) = blended_weights(&panel, blend_factor, config);
    let expected = expected_metrics(panel.reweighted(weights.clone()), config);

    let mut target_weights = frozen;
    for ((symbol, _), weight) in covered.iter().zip(&weights) {
        target_weights.insert(symbol.clone(), weight * free_share);
    }

    let plan = rebalancing_plan(&current, &target_weights, total, config.optimization_min_shift);

    tracing::info!(
        risk = %risk_profile,
        objective = ?request.objective,
        method = ?method,
        symbols = target_weights.len(),
        actions = plan.len(),
        skipped = skipped.len(),
        "portfolio optimized"
    );

    Ok(OptimizationReport {
        optimized_at: Utc::now(),
        risk_profile,
        objective: request.objective,
        method,
        blend_factor,
        target_weights,
        rebalancing_plan: plan,
        expected: Some(expected),
        skipped,
    })
}

/// Normalized weights in panel order
fn blended_weights(panel: &ReturnPanel, blend_factor: f64, config: &RiskConfig) -> (WeightingMethod, Vec<f64>) {
    let covariance = panel.covariance();
    let n = panel.symbols().len();
    #[allow(clippy::cast_precision_loss)]
    let equal = 1.0 / n as f64;

    let volatility: Vec<f64> = (0..n)
        .map(|i| (covariance[i][i] * config.trading_days).max(0.0).sqrt())
        .collect();
    let sharpe: Vec<f64> = panel
        .mean_returns()
        .iter()
        .zip(&volatility)
        .map(|(m, vol)| {
            if *vol > f64::EPSILON {
                (m * config.trading_days - config.risk_free_rate) / vol
            } else {
                0.0
            }
        })
        .collect();

    let total_sharpe: f64 = sharpe.iter().map(|s| s.max(0.0)).sum();
    let total_inverse: f64 = volatility.iter().filter(|v| **v > f64::EPSILON).map(|v| 1.0 / v).sum();

    let (method, base): (WeightingMethod, Vec<f64>) = if total_sharpe > 0.0 {
        (WeightingMethod::Sharpe, sharpe.iter().map(|s| s.max(0.0) / total_sharpe).collect())
    } else if total_inverse > 0.0 {
        let base = volatility
            .iter()
            .map(|v| if *v > f64::EPSILON { 1.0 / v / total_inverse } else { 0.0 })
            .collect();
        (WeightingMethod::InverseVolatility, base)
    } else {
        (WeightingMethod::Equal, vec![equal; n])
    };

    let blended: Vec<f64> = if blend_factor > 1.0 {
        base
    } else {
        base.iter()
            .map(|w| blend_factor.mul_add(*w, (1.0 - blend_factor) * equal))
            .collect()
    };

    let total: f64 = blended.iter().sum();
    if total <= 0.0 {
        return (method, vec![equal; n]);
    }
    (method, blended.iter().map(|w| w / total).collect())
}

fn expected_metrics(panel: ReturnPanel, config: &RiskConfig) -> ExpectedMetrics {
    let daily_return: f64 = panel
        .mean_returns()
        .iter()
        .zip(panel.weights())
        .map(|(m, w)| m * w)
        .sum();
    let expected_return = daily_return * config.trading_days * 100.0;
    let expected_volatility = (panel.weighted_variance() * config.trading_days).sqrt() * 100.0;

    ExpectedMetrics {
        expected_return,
        expected_volatility,
        sharpe_ratio: metrics::sharpe(expected_return, expected_volatility, config.risk_free_rate),
        observations: panel.observations(),
    }
}

/// Per-symbol actions whose weight change reaches `min_shift`
pub fn rebalancing_plan(
    current: &BTreeMap<String, f64>,
    target: &BTreeMap<String, f64>,
    total_value: Decimal,
    min_shift: f64,
) -> Vec<RebalanceAction> {
    let symbols: BTreeSet<&String> = current.keys().chain(target.keys()).collect();

    let mut actions: Vec<RebalanceAction> = symbols
        .into_iter()
        .filter_map(|symbol| {
            let from = current.get(symbol).copied().unwrap_or(0.0);
            let to = target.get(symbol).copied().unwrap_or(0.0);
            let diff = to - from;
            if diff.abs() < min_shift || diff.abs() <= f64::EPSILON {
                return None;
            }

            let action = if from <= 0.0 {
                RebalanceActionKind::BuyNew
            } else if to <= 0.0 {
                RebalanceActionKind::SellAll
            } else if diff > 0.0 {
                RebalanceActionKind::Buy
            } else {
                RebalanceActionKind::Sell
            };
            let value_difference = Decimal::from_f64(diff)
                .and_then(|d| d.checked_mul(total_value))
                .unwrap_or(Decimal::ZERO)
                .round_dp(2);

            Some(RebalanceAction {
                symbol: symbol.clone(),
                action,
                current_weight: from,
                target_weight: to,
                weight_difference: diff,
                value_difference,
            })
        })
        .collect();

    actions.sort_by(|a, b| {
        b.value_difference
            .abs()
            .cmp(&a.value_difference.abs())
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    actions
}
