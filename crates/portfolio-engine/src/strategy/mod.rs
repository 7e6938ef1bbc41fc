//! Strategy Generator
//!
//! Maps an investor profile to a target allocation, tilts it toward the
//! investor's goals and plans the transition from a current allocation.
//! Pure: no market data is needed.

mod symbol;
pub mod tables;
mod transition;

pub use symbol::{InstitutionalAlignment, SymbolStrategy, SymbolStrategyKind, implementation_steps, recommend_for_symbol};
pub use tables::{GoalApproach, RebalancingFrequency, VolatilityApproach, VolatilityStance};
pub use transition::{StepPriority, TransitionAction, TransitionPlan, TransitionStep};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::config::StrategyConfig;
use crate::error::Result;
use crate::model::{AssetAllocation, GoalType, Holding, InvestorProfile, Portfolio};

/// What the investor holds today, either as fractions or as holdings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CurrentPortfolio {
    Holdings { holdings: Vec<Holding> },
    Allocation(AssetAllocation),
}

impl CurrentPortfolio {
    pub fn allocation(&self) -> Result<AssetAllocation> {
        match self {
            Self::Holdings { holdings } => {
                let portfolio = Portfolio::new(holdings.clone(), crate::model::RiskProfile::default());
                portfolio.validate()?;
                Ok(portfolio.allocation())
            }
            Self::Allocation(allocation) => current_fractions(allocation),
        }
    }
}

/// Validated, canonical and summing to one, so percents and fractions plan alike.
///
/// An all-zero allocation stays empty and plans as a fresh deposit.
fn current_fractions(current: &AssetAllocation) -> Result<AssetAllocation> {
    current.validate()?;
    Ok(current.canonicalized().normalized())
}

/// Weight one goal added before re-normalization
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GoalTilt {
    pub goal_type: GoalType,

    /// Target amount per year of horizon
    pub pull: f64,

    /// Total weight added across the goal's asset mix
    pub tilt: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxFocus {
    High,
    Medium,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyReport {
    pub profile: InvestorProfile,

    /// Risk × horizon table entry before any goal tilt
    pub base_allocation: AssetAllocation,

    /// Always sums to 1
    pub target_allocation: AssetAllocation,

    pub goal_adjustments: Vec<GoalTilt>,
    pub goal_based_approaches: Vec<GoalApproach>,
    pub volatility_approach: VolatilityApproach,
    pub rebalancing_frequency: RebalancingFrequency,
    pub tax_efficiency_focus: TaxFocus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_plan: Option<TransitionPlan>,
}

/// Strategy generator
#[derive(Clone, Debug, Default)]
pub struct StrategyGenerator {
    config: StrategyConfig,
}

impl StrategyGenerator {
    pub const fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Tilt per goal: `max_goal_tilt × pull / (pull + goal_pull_scale)`
    pub fn goal_tilt(&self, pull: f64) -> f64 {
        if pull <= 0.0 {
            return 0.0;
        }
        self.config.max_goal_tilt * pull / (pull + self.config.goal_pull_scale)
    }

    /// Base allocation with each goal's tilt added, re-normalized.
    ///
    /// With no tilting goals the base table entry is returned as is.
    pub fn target_allocation(&self, profile: &InvestorProfile) -> (AssetAllocation, Vec<GoalTilt>) {
        let base = tables::base_allocation(profile.risk_tolerance, profile.investment_horizon);

        let mut adjusted = base.clone();
        let mut tilts = Vec::new();

        for goal in &profile.goals {
            let mix = tables::goal_mix(goal.goal_type);
            if mix.is_empty() {
                continue;
            }
            let pull = goal.pull();
            let tilt = self.goal_tilt(pull);
            if tilt <= 0.0 {
                continue;
            }
            for (class, share) in mix {
                *adjusted.0.entry((*class).to_string()).or_default() += tilt * share;
            }
            tilts.push(GoalTilt {
                goal_type: goal.goal_type,
                pull,
                tilt,
            });
        }

        if tilts.is_empty() {
            return (base, tilts);
        }
        (adjusted.normalized(), tilts)
    }

    pub fn generate(&self, profile: &InvestorProfile, current: Option<&AssetAllocation>) -> Result<StrategyReport> {
        profile.validate()?;
        let current = current.map(current_fractions).transpose()?;

        let risk = profile.risk_tolerance;
        let base_allocation = tables::base_allocation(risk, profile.investment_horizon);
        let (target_allocation, goal_adjustments) = self.target_allocation(profile);

        let mut seen = Vec::new();
        let goal_based_approaches = profile
            .goals
            .iter()
            .filter(|g| {
                let first = !seen.contains(&g.goal_type);
                seen.push(g.goal_type);
                first
            })
            .filter_map(|g| tables::goal_approach(g.goal_type))
            .collect();

        let goal_total = profile.goal_total().unwrap_or(Decimal::MAX);
        let tax_efficiency_focus = if goal_total.to_f64().unwrap_or(0.0) > self.config.tax_focus_threshold {
            TaxFocus::High
        } else {
            TaxFocus::Medium
        };

        let transition_plan = current.map(|c| transition::plan(&c, &target_allocation, risk, &self.config));

        tracing::info!(
            risk = %risk,
            horizon = profile.investment_horizon.as_str(),
            goals = profile.goals.len(),
            with_transition = transition_plan.is_some(),
            "strategy generated"
        );

        Ok(StrategyReport {
            profile: profile.clone(),
            base_allocation,
            target_allocation,
            goal_adjustments,
            goal_based_approaches,
            volatility_approach: tables::volatility_approach(risk),
            rebalancing_frequency: tables::rebalancing_frequency(risk),
            tax_efficiency_focus,
            transition_plan,
        })
    }

    /// Plan a move from `current` to this profile's target
    pub fn transition(&self, profile: &InvestorProfile, current: &AssetAllocation) -> Result<TransitionPlan> {
        profile.validate()?;
        let current = current_fractions(current)?;
        let (target, _) = self.target_allocation(profile);
        Ok(transition::plan(&current, &target, profile.risk_tolerance, &self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InvestmentGoal, InvestmentHorizon, RiskProfile};
    use rust_decimal_macros::dec;

    #[test]
    fn test_no_goals_returns_base_table_unchanged() {
        let generator = StrategyGenerator::default();
        let profile = InvestorProfile::new(RiskProfile::Conservative, InvestmentHorizon::Short);

        let report = generator.generate(&profile, None).unwrap();
        assert_eq!(
            report.target_allocation,
            tables::base_allocation(RiskProfile::Conservative, InvestmentHorizon::Short)
        );
        assert!(report.goal_adjustments.is_empty());
        assert!(report.transition_plan.is_none());
        assert_eq!(report.tax_efficiency_focus, TaxFocus::Medium);
    }

    #[test]
    fn test_target_always_normalized() {
        let generator = StrategyGenerator::default();
        let goals = [
            InvestmentGoal::new(GoalType::Retirement, dec!(2000000), 30),
            InvestmentGoal::new(GoalType::HomePurchase, dec!(120000), 2),
            InvestmentGoal::new(GoalType::Income, dec!(50000), 10),
            InvestmentGoal::new(GoalType::Other, dec!(999999), 1),
        ];

        for risk in RiskProfile::ALL {
            for horizon in InvestmentHorizon::ALL {
                for n in 0..=goals.len() {
                    let mut profile = InvestorProfile::new(risk, horizon);
                    profile.goals = goals[..n].to_vec();
                    let (target, _) = generator.target_allocation(&profile);
                    assert!(target.is_normalized(), "{risk}/{horizon:?}/{n}");
                }
            }
        }
    }

    #[test]
    fn test_nearer_goal_pulls_harder() {
        let generator = StrategyGenerator::default();
        let near = InvestmentGoal::new(GoalType::HomePurchase, dec!(100000), 2);
        let far = InvestmentGoal::new(GoalType::HomePurchase, dec!(100000), 20);
        assert!(generator.goal_tilt(near.pull()) > generator.goal_tilt(far.pull()));

        let profile = InvestorProfile::new(RiskProfile::Aggressive, InvestmentHorizon::Long).with_goal(near);
        let (target, tilts) = generator.target_allocation(&profile);
        let base = tables::base_allocation(RiskProfile::Aggressive, InvestmentHorizon::Long);

        assert_eq!(tilts.len(), 1);
        // 0.3 × 50 000 / 100 000
        assert!((tilts[0].tilt - 0.15).abs() < 1e-9);
        assert!(target.get("cash") > base.get("cash"));
        assert!(target.get("equity") < base.get("equity"));
    }

    #[test]
    fn test_tax_focus_and_approaches() {
        let generator = StrategyGenerator::default();
        let profile = InvestorProfile::new(RiskProfile::Aggressive, InvestmentHorizon::Long)
            .with_goal(InvestmentGoal::new(GoalType::Retirement, dec!(400000), 25))
            .with_goal(InvestmentGoal::new(GoalType::Retirement, dec!(200000), 20));

        let report = generator.generate(&profile, None).unwrap();
        assert_eq!(report.tax_efficiency_focus, TaxFocus::High);
        assert_eq!(report.goal_based_approaches.len(), 1);
        assert_eq!(report.rebalancing_frequency, RebalancingFrequency::Quarterly);
        assert_eq!(report.volatility_approach.stance, VolatilityStance::Unhedged);
    }

    #[test]
    fn test_transition_from_holdings() {
        let generator = StrategyGenerator::default();
        let current = CurrentPortfolio::Holdings {
            holdings: vec![
                Holding::new("VTI", dec!(9000), "stocks", "broad_market"),
                Holding::new("BND", dec!(1000), "bonds", "fixed_income"),
            ],
        };
        let allocation = current.allocation().unwrap();
        let profile = InvestorProfile::new(RiskProfile::Moderate, InvestmentHorizon::Medium);

        let report = generator.generate(&profile, Some(&allocation)).unwrap();
        let plan = report.transition_plan.unwrap();
        assert_eq!(plan.steps[0].asset_class, "equity");
        assert_eq!(plan.steps[0].action, TransitionAction::Sell);
        assert!((plan.steps[0].delta + 0.30).abs() < 1e-9);
    }

    #[test]
    fn test_current_portfolio_shapes() {
        let from_map: CurrentPortfolio = serde_json::from_value(serde_json::json!({
            "stocks": 0.7, "bonds": 0.3
        }))
        .unwrap();
        assert!(matches!(from_map, CurrentPortfolio::Allocation(_)));
        assert!((from_map.allocation().unwrap().get("equity") - 0.7).abs() < 1e-9);

        let from_holdings: CurrentPortfolio = serde_json::from_value(serde_json::json!({
            "holdings": [{"symbol": "SPY", "value": "100", "asset_class": "equity"}]
        }))
        .unwrap();
        assert!(matches!(from_holdings, CurrentPortfolio::Holdings { .. }));
    }

    #[test]
    fn test_percent_current_allocation_plans_like_fractions() {
        let generator = StrategyGenerator::default();
        let profile = InvestorProfile::new(RiskProfile::Moderate, InvestmentHorizon::Medium);
        let fractions = AssetAllocation::from_pairs([("equity", 0.8), ("fixed_income", 0.2)]);
        let percents = AssetAllocation::from_pairs([("stocks", 80.0), ("bonds", 20.0)]);

        let from_fractions = generator.transition(&profile, &fractions).unwrap();
        let from_percents = generator.transition(&profile, &percents).unwrap();
        assert_eq!(from_fractions.steps.len(), from_percents.steps.len());
        for (a, b) in from_fractions.steps.iter().zip(&from_percents.steps) {
            assert_eq!(a.asset_class, b.asset_class);
            assert!((a.delta - b.delta).abs() < 1e-9);
        }
        assert!(from_percents.current_allocation.is_normalized());

        let report = generator.generate(&profile, Some(&percents)).unwrap();
        assert!((report.transition_plan.unwrap().turnover - from_fractions.turnover).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_goal_rejected() {
        let generator = StrategyGenerator::default();
        let profile = InvestorProfile::new(RiskProfile::Moderate, InvestmentHorizon::Medium)
            .with_goal(InvestmentGoal::new(GoalType::Education, dec!(-1), 5));
        assert!(generator.generate(&profile, None).is_err());
    }
}
