//! Strategy Tables
//!
//! Fixed mappings from profile to allocation, goal to asset mix and risk
//! tolerance to volatility stance.

use serde::{Deserialize, Serialize};

use crate::model::{AssetAllocation, GoalType, InvestmentHorizon, RiskProfile};

const EQUITY: &str = "equity";
const FIXED_INCOME: &str = "fixed_income";
const CASH: &str = "cash";
const ALTERNATIVES: &str = "alternatives";

use crate::model::InvestmentHorizon as H;
use crate::model::RiskProfile as R;

/// (equity, fixed income, cash, alternatives) per profile × horizon
const BASE_ALLOCATIONS: [(R, H, [f64; 4]); 9] = [
    (R::Conservative, H::Short, [0.20, 0.60, 0.20, 0.00]),
    (R::Conservative, H::Medium, [0.30, 0.60, 0.05, 0.05]),
    (R::Conservative, H::Long, [0.40, 0.50, 0.00, 0.10]),
    (R::Moderate, H::Short, [0.40, 0.40, 0.15, 0.05]),
    (R::Moderate, H::Medium, [0.60, 0.30, 0.05, 0.05]),
    (R::Moderate, H::Long, [0.70, 0.20, 0.00, 0.10]),
    (R::Aggressive, H::Short, [0.60, 0.20, 0.15, 0.05]),
    (R::Aggressive, H::Medium, [0.75, 0.15, 0.05, 0.05]),
    (R::Aggressive, H::Long, [0.85, 0.05, 0.00, 0.10]),
];

pub fn base_allocation(risk: RiskProfile, horizon: InvestmentHorizon) -> AssetAllocation {
    let [equity, fixed_income, cash, alternatives] = BASE_ALLOCATIONS
        .iter()
        .find(|(r, h, _)| *r == risk && *h == horizon)
        .map_or([0.60, 0.30, 0.05, 0.05], |(_, _, mix)| *mix);

    AssetAllocation::from_pairs([
        (EQUITY, equity),
        (FIXED_INCOME, fixed_income),
        (CASH, cash),
        (ALTERNATIVES, alternatives),
    ])
}

/// Asset classes a goal pulls toward, with their shares of the pull
pub const fn goal_mix(goal: GoalType) -> &'static [(&'static str, f64)] {
    match goal {
        GoalType::Retirement => &[(EQUITY, 0.7), (FIXED_INCOME, 0.3)],
        GoalType::Education => &[(FIXED_INCOME, 0.6), (EQUITY, 0.4)],
        GoalType::HomePurchase => &[(CASH, 0.5), (FIXED_INCOME, 0.5)],
        GoalType::Income => &[(FIXED_INCOME, 0.6), (EQUITY, 0.2), (ALTERNATIVES, 0.2)],
        GoalType::Other => &[],
    }
}

/// Narrative approach for one goal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalApproach {
    pub goal_type: GoalType,
    pub title: String,
    pub description: String,
    pub recommendations: Vec<String>,
}

pub fn goal_approach(goal: GoalType) -> Option<GoalApproach> {
    let (title, description, recommendations): (&str, &str, &[&str]) = match goal {
        GoalType::Retirement => (
            "Retirement Planning",
            "Build a diversified portfolio focused on long-term growth and eventual income.",
            &[
                "Maximize tax-advantaged retirement accounts",
                "Use low-cost index funds for core holdings",
                "Shift toward conservative allocations as retirement approaches",
            ],
        ),
        GoalType::Education => (
            "Education Funding",
            "Save for education expenses on a schedule tied to the start date.",
            &[
                "Use education-specific savings vehicles",
                "Prefer age-based portfolios that de-risk as the start date nears",
                "Review direct tuition payment options for tax advantages",
            ],
        ),
        GoalType::HomePurchase => (
            "Home Purchase",
            "Build a down payment while managing risk against the purchase timeline.",
            &[
                "Hold funds for purchases under three years out in savings or short-term bonds",
                "Add some equity exposure only for longer timeframes",
                "Keep a separate emergency fund before funding the down payment",
            ],
        ),
        GoalType::Income => (
            "Income Generation",
            "Create reliable income streams from the portfolio.",
            &[
                "Favor dividend-paying stocks and bonds",
                "Add REITs and preferred securities for income diversification",
                "Target yield while keeping risk within profile limits",
            ],
        ),
        GoalType::Other => return None,
    };

    Some(GoalApproach {
        goal_type: goal,
        title: title.into(),
        description: description.into(),
        recommendations: recommendations.iter().map(|s| (*s).to_string()).collect(),
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityStance {
    Hedged,
    Dynamic,
    Unhedged,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolatilityApproach {
    pub stance: VolatilityStance,
    pub description: String,
    pub strategies: Vec<String>,
}

pub fn volatility_approach(risk: RiskProfile) -> VolatilityApproach {
    let (stance, description, strategies): (_, &str, &[&str]) = match risk {
        RiskProfile::Conservative => (
            VolatilityStance::Hedged,
            "Prioritize capital preservation, taking selective opportunities during volatility.",
            &[
                "Keep 10-15% cash to deploy during corrections",
                "Favor defensive sectors with strong balance sheets",
                "Set stop-loss orders 10-15% below purchase price",
                "Buy protective puts on major positions in uncertain markets",
            ],
        ),
        RiskProfile::Moderate => (
            VolatilityStance::Dynamic,
            "Balance protection and opportunity as volatility changes.",
            &[
                "Keep 5-10% cash for opportunistic purchases",
                "Dollar-cost average through extended downturns",
                "Hedge concentrated positions selectively with options",
                "Favor quality companies that weather downturns",
            ],
        ),
        RiskProfile::Aggressive => (
            VolatilityStance::Unhedged,
            "Treat volatility as an opportunity for enhanced returns.",
            &[
                "Keep 3-5% cash for tactical opportunities",
                "Increase position sizes during significant corrections",
                "Use options for return enhancement as well as hedging",
            ],
        ),
    };

    VolatilityApproach {
        stance,
        description: description.into(),
        strategies: strategies.iter().map(|s| (*s).to_string()).collect(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalancingFrequency {
    Quarterly,
    SemiAnnually,
}

pub const fn rebalancing_frequency(risk: RiskProfile) -> RebalancingFrequency {
    match risk {
        RiskProfile::Aggressive => RebalancingFrequency::Quarterly,
        RiskProfile::Conservative | RiskProfile::Moderate => RebalancingFrequency::SemiAnnually,
    }
}

/// Months over which a transition should be phased in
pub const fn transition_timeline(risk: RiskProfile) -> &'static str {
    match risk {
        RiskProfile::Conservative => "12-18 months",
        RiskProfile::Moderate => "6-12 months",
        RiskProfile::Aggressive => "3-6 months",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_base_allocation_sums_to_one() {
        for risk in RiskProfile::ALL {
            for horizon in InvestmentHorizon::ALL {
                let allocation = base_allocation(risk, horizon);
                assert!(allocation.is_normalized(), "{risk}/{horizon:?}");
            }
        }
    }

    #[test]
    fn test_conservative_short_is_fixed_income_heavy() {
        let allocation = base_allocation(RiskProfile::Conservative, InvestmentHorizon::Short);
        assert!((allocation.get("fixed_income") - 0.60).abs() < f64::EPSILON);
        assert!((allocation.get("cash") - 0.20).abs() < f64::EPSILON);
    }

    #[test]
    fn test_goal_mixes_sum_to_one() {
        for goal in [GoalType::Retirement, GoalType::Education, GoalType::HomePurchase, GoalType::Income] {
            let total: f64 = goal_mix(goal).iter().map(|(_, share)| share).sum();
            assert!((total - 1.0).abs() < 1e-9);
            assert!(goal_approach(goal).is_some());
        }
        assert!(goal_mix(GoalType::Other).is_empty());
        assert!(goal_approach(GoalType::Other).is_none());
    }

    #[test]
    fn test_stance_follows_tolerance() {
        assert_eq!(volatility_approach(RiskProfile::Conservative).stance, VolatilityStance::Hedged);
        assert_eq!(volatility_approach(RiskProfile::Aggressive).stance, VolatilityStance::Unhedged);
        assert_eq!(rebalancing_frequency(RiskProfile::Aggressive), RebalancingFrequency::Quarterly);
        assert_eq!(rebalancing_frequency(RiskProfile::Moderate), RebalancingFrequency::SemiAnnually);
    }
}
