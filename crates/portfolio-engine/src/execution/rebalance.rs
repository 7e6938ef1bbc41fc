//! Rebalance Expansion
//!
//! Turns a transition plan into market orders: sells first, then buys, each
//! side in plan order.

use std::collections::BTreeMap;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::model::{AssetAllocation, InvestorProfile, Side, TradeProposal, canonical_asset_class};
use crate::strategy::{StrategyGenerator, TransitionAction, TransitionPlan};

/// Instrument used to trade an asset class
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub price: Decimal,
}

/// Either a ready plan, or a profile plus current allocation to plan from
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RebalanceRequest {
    #[serde(default)]
    pub transition_plan: Option<TransitionPlan>,

    #[serde(default)]
    pub profile: Option<InvestorProfile>,

    #[serde(default)]
    pub current_allocation: Option<AssetAllocation>,

    pub portfolio_value: Decimal,

    /// Asset class → instrument
    pub instruments: BTreeMap<String, Instrument>,
}

/// An asset class the rebalance could not trade
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedClass {
    pub asset_class: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RebalanceOrders {
    pub trades: Vec<TradeProposal>,
    pub skipped: Vec<SkippedClass>,
}

impl RebalanceRequest {
    pub fn resolve_plan(&self, generator: &StrategyGenerator) -> Result<TransitionPlan> {
        if let Some(plan) = &self.transition_plan {
            return Ok(plan.clone());
        }
        match (&self.profile, &self.current_allocation) {
            (Some(profile), Some(current)) => generator.transition(profile, current),
            _ => Err(EngineError::invalid(
                "rebalance needs a transition_plan, or a profile with a current_allocation",
            )),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.portfolio_value <= Decimal::ZERO {
            return Err(EngineError::invalid(format!(
                "portfolio_value must be positive, got {}",
                self.portfolio_value
            )));
        }
        if let Some((class, _)) = self.instruments.iter().find(|(_, i)| i.price <= Decimal::ZERO) {
            return Err(EngineError::invalid(format!("instrument price for {class} must be positive")));
        }
        Ok(())
    }
}

/// Size orders for every non-hold step of the plan.
///
/// Quantity is `|delta| × portfolio_value / price`, rounded down to
/// `quantity_scale` decimal places. Steps whose size overflows are skipped.
pub fn expand(request: &RebalanceRequest, plan: &TransitionPlan, quantity_scale: u32) -> Result<RebalanceOrders> {
    request.validate()?;

    let instruments: BTreeMap<String, &Instrument> = request
        .instruments
        .iter()
        .map(|(class, instrument)| (canonical_asset_class(class), instrument))
        .collect();

    let mut sells = Vec::new();
    let mut buys = Vec::new();
    let mut skipped = Vec::new();

    for step in &plan.steps {
        let side = match step.action {
            TransitionAction::Hold => continue,
            TransitionAction::Buy => Side::Buy,
            TransitionAction::Sell => Side::Sell,
        };

        let Some(instrument) = instruments.get(&canonical_asset_class(&step.asset_class)) else {
            skipped.push(SkippedClass {
                asset_class: step.asset_class.clone(),
                reason: "no instrument for asset class".into(),
            });
            continue;
        };

        let fraction = Decimal::from_f64(step.delta.abs()).unwrap_or(Decimal::ZERO);
        let Some(quantity) = fraction
            .checked_mul(request.portfolio_value)
            .and_then(|notional| notional.checked_div(instrument.price))
            .map(|q| q.round_dp_with_strategy(quantity_scale, RoundingStrategy::ToZero))
        else {
            skipped.push(SkippedClass {
                asset_class: step.asset_class.clone(),
                reason: "order size overflows".into(),
            });
            continue;
        };

        if quantity <= Decimal::ZERO {
            skipped.push(SkippedClass {
                asset_class: step.asset_class.clone(),
                reason: "order rounds to zero quantity".into(),
            });
            continue;
        }

        let trade = TradeProposal::market(&instrument.symbol, side, quantity).with_reference_price(instrument.price);
        match side {
            Side::Sell => sells.push(trade),
            Side::Buy => buys.push(trade),
        }
    }

    sells.extend(buys);
    Ok(RebalanceOrders { trades: sells, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InvestmentHorizon, RiskProfile};
    use rust_decimal_macros::dec;

    fn instruments() -> BTreeMap<String, Instrument> {
        [
            ("equity".to_string(), Instrument { symbol: "VTI".into(), price: dec!(250) }),
            ("bonds".to_string(), Instrument { symbol: "BND".into(), price: dec!(72) }),
        ]
        .into()
    }

    #[test]
    fn test_sells_precede_buys() {
        let request = RebalanceRequest {
            transition_plan: None,
            profile: Some(InvestorProfile::new(RiskProfile::Moderate, InvestmentHorizon::Medium)),
            current_allocation: Some(AssetAllocation::from_pairs([("equity", 0.9), ("fixed_income", 0.1)])),
            portfolio_value: dec!(100000),
            instruments: instruments(),
        };
        let plan = request.resolve_plan(&StrategyGenerator::default()).unwrap();
        let orders = expand(&request, &plan, 4).unwrap();

        let sides: Vec<(&str, Side)> = orders.trades.iter().map(|t| (t.symbol.as_str(), t.side)).collect();
        assert_eq!(sides, vec![("VTI", Side::Sell), ("BND", Side::Buy)]);

        // 0.30 × 100 000 / 250
        assert_eq!(orders.trades[0].quantity, dec!(120));
        // 0.20 × 100 000 / 72 = 277.777...
        assert_eq!(orders.trades[1].quantity, dec!(277.7777));
        assert_eq!(orders.trades[1].reference_price, Some(dec!(72)));

        let skipped: Vec<&str> = orders.skipped.iter().map(|s| s.asset_class.as_str()).collect();
        assert_eq!(skipped, vec!["alternatives", "cash"]);
    }

    #[test]
    fn test_percent_allocation_sizes_like_fractions() {
        let request = |current: AssetAllocation| RebalanceRequest {
            transition_plan: None,
            profile: Some(InvestorProfile::new(RiskProfile::Moderate, InvestmentHorizon::Medium)),
            current_allocation: Some(current),
            portfolio_value: dec!(100000),
            instruments: instruments(),
        };
        let generator = StrategyGenerator::default();

        let fractions = request(AssetAllocation::from_pairs([("equity", 0.9), ("fixed_income", 0.1)]));
        let percents = request(AssetAllocation::from_pairs([("equity", 90.0), ("fixed_income", 10.0)]));
        let a = expand(&fractions, &fractions.resolve_plan(&generator).unwrap(), 4).unwrap();
        let b = expand(&percents, &percents.resolve_plan(&generator).unwrap(), 4).unwrap();

        assert_eq!(a.trades, b.trades);
        assert_eq!(b.trades[0].quantity, dec!(120));
    }

    #[test]
    fn test_oversized_order_is_skipped() {
        let request = RebalanceRequest {
            transition_plan: None,
            profile: Some(InvestorProfile::new(RiskProfile::Moderate, InvestmentHorizon::Medium)),
            current_allocation: Some(AssetAllocation::from_pairs([("equity", 0.8), ("fixed_income", 0.2)])),
            portfolio_value: dec!(1000000000000000),
            instruments: [(
                "equity".to_string(),
                Instrument { symbol: "DUST".into(), price: dec!(0.0000000000000001) },
            )]
            .into(),
        };
        let plan = request.resolve_plan(&StrategyGenerator::default()).unwrap();
        let orders = expand(&request, &plan, 4).unwrap();

        assert!(orders.trades.is_empty());
        let equity = orders.skipped.iter().find(|s| s.asset_class == "equity").unwrap();
        assert_eq!(equity.reason, "order size overflows");
    }

    #[test]
    fn test_needs_plan_or_profile() {
        let request = RebalanceRequest {
            transition_plan: None,
            profile: None,
            current_allocation: None,
            portfolio_value: dec!(1000),
            instruments: BTreeMap::new(),
        };
        assert!(request.resolve_plan(&StrategyGenerator::default()).is_err());
    }

    #[test]
    fn test_portfolio_value_must_be_positive() {
        let request = RebalanceRequest {
            transition_plan: None,
            profile: None,
            current_allocation: None,
            portfolio_value: dec!(0),
            instruments: instruments(),
        };
        assert!(request.validate().is_err());
    }
}
