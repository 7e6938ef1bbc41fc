//! Transition Plan
//!
//! Per-asset-class deltas from a current allocation to a target, ordered by
//! largest absolute delta first, then asset class.

use serde::{Deserialize, Serialize};

use super::tables;
use crate::config::StrategyConfig;
use crate::model::{AssetAllocation, RiskProfile};

/// Shifts above these fractions are prioritized
const HIGH_PRIORITY_SHIFT: f64 = 0.15;
const MEDIUM_PRIORITY_SHIFT: f64 = 0.10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionAction {
    Buy,
    Sell,
    Hold,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPriority {
    High,
    Medium,
    Low,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionStep {
    pub asset_class: String,
    pub current: f64,
    pub target: f64,

    /// `target − current`, as a fraction of portfolio value
    pub delta: f64,
    pub action: TransitionAction,
    pub priority: StepPriority,
    pub significant: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionPlan {
    pub current_allocation: AssetAllocation,
    pub target_allocation: AssetAllocation,
    pub steps: Vec<TransitionStep>,
    pub timeline: String,

    /// Half the sum of absolute deltas: the share of value that changes hands
    pub turnover: f64,

    pub tax_considerations: Vec<String>,
}

impl TransitionPlan {
    pub fn significant_steps(&self) -> impl Iterator<Item = &TransitionStep> {
        self.steps.iter().filter(|s| s.significant)
    }
}

pub fn plan(
    current: &AssetAllocation,
    target: &AssetAllocation,
    risk: RiskProfile,
    config: &StrategyConfig,
) -> TransitionPlan {
    let current = current.canonicalized();
    let target = target.canonicalized();

    let mut classes: Vec<&String> = current.0.keys().chain(target.0.keys()).collect();
    classes.sort();
    classes.dedup();

    let mut steps: Vec<TransitionStep> = classes
        .into_iter()
        .map(|class| {
            let (from, to) = (current.get(class), target.get(class));
            let delta = to - from;
            let magnitude = delta.abs();
            TransitionStep {
                asset_class: class.clone(),
                current: from,
                target: to,
                delta,
                action: if magnitude <= f64::EPSILON {
                    TransitionAction::Hold
                } else if delta > 0.0 {
                    TransitionAction::Buy
                } else {
                    TransitionAction::Sell
                },
                priority: if magnitude > HIGH_PRIORITY_SHIFT {
                    StepPriority::High
                } else if magnitude > MEDIUM_PRIORITY_SHIFT {
                    StepPriority::Medium
                } else {
                    StepPriority::Low
                },
                significant: magnitude >= config.significant_shift,
            }
        })
        .collect();

    steps.sort_by(|a, b| {
        b.delta
            .abs()
            .total_cmp(&a.delta.abs())
            .then_with(|| a.asset_class.cmp(&b.asset_class))
    });

    let turnover = steps.iter().map(|s| s.delta.abs()).sum::<f64>() / 2.0;

    TransitionPlan {
        current_allocation: current,
        target_allocation: target,
        steps,
        timeline: tables::transition_timeline(risk).to_string(),
        turnover,
        tax_considerations: vec![
            "Make changes in tax-advantaged accounts first to limit tax impact".into(),
            "When reducing an allocation, sell lots with losses or the smallest gains first".into(),
            "Phase purchases in on a regular schedule over the transition period".into(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_ordered_by_magnitude_then_class() {
        let current = AssetAllocation::from_pairs([("stocks", 0.80), ("bonds", 0.20)]);
        let target = AssetAllocation::from_pairs([
            ("equity", 0.60),
            ("fixed_income", 0.30),
            ("cash", 0.05),
            ("alternatives", 0.05),
        ]);

        let plan = plan(&current, &target, RiskProfile::Moderate, &StrategyConfig::default());
        let order: Vec<&str> = plan.steps.iter().map(|s| s.asset_class.as_str()).collect();
        assert_eq!(order, vec!["equity", "fixed_income", "alternatives", "cash"]);

        assert_eq!(plan.steps[0].action, TransitionAction::Sell);
        assert!((plan.steps[0].delta + 0.20).abs() < 1e-9);
        assert_eq!(plan.steps[0].priority, StepPriority::High);
        assert_eq!(plan.steps[1].action, TransitionAction::Buy);
        assert!(plan.steps.iter().all(|s| s.significant));
        assert!((plan.turnover - 0.20).abs() < 1e-9);
        assert_eq!(plan.timeline, "6-12 months");
    }

    #[test]
    fn test_matching_allocation_holds() {
        let target = AssetAllocation::from_pairs([("equity", 0.5), ("fixed_income", 0.5)]);
        let plan = plan(&target, &target, RiskProfile::Conservative, &StrategyConfig::default());
        assert!(plan.steps.iter().all(|s| s.action == TransitionAction::Hold && !s.significant));
        assert_eq!(plan.significant_steps().count(), 0);
    }
}
