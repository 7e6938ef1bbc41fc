//! Rule-based Recommendations

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ConcentrationFlag, ConcentrationScope, Diversification};
use super::metrics::RiskMetrics;
use crate::config::RiskConfig;
use crate::model::{AssetAllocation, FRACTION_EPSILON, RiskProfile};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Rebalance,
    Diversification,
    Concentration,
    SectorConcentration,
    RiskReduction,
    RiskIncrease,
}

/// Ordered most urgent first
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub description: String,

    /// Holding, sector or asset class the recommendation is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Value to sell and reallocate so the position sits at the threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_amount: Option<Decimal>,

    /// Asset-class targets to rebalance toward
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<AssetAllocation>,
}

impl Recommendation {
    fn new(kind: RecommendationKind, priority: Priority, description: String) -> Self {
        Self {
            kind,
            priority,
            description,
            subject: None,
            trim_amount: None,
            targets: None,
        }
    }
}

pub struct RuleInputs<'a> {
    pub profile: RiskProfile,
    pub allocation: &'a AssetAllocation,
    pub metrics: &'a RiskMetrics,
    pub diversification: &'a Diversification,
    pub concentration: &'a [ConcentrationFlag],
}

/// Apply every rule, then stable-sort by priority
pub fn recommend(inputs: &RuleInputs<'_>, config: &RiskConfig) -> Vec<Recommendation> {
    let mut out = Vec::new();

    out.extend(rebalance_rule(inputs, config));
    out.extend(diversification_rule(inputs, config));
    out.extend(inputs.concentration.iter().map(|flag| concentration_rule(flag, config)));
    out.extend(volatility_rule(inputs));

    out.sort_by_key(|r| r.priority);
    out
}

fn rebalance_rule(inputs: &RuleInputs<'_>, config: &RiskConfig) -> Option<Recommendation> {
    let targets = inputs.profile.holding_targets();
    let current = inputs.allocation;

    let mut classes: Vec<&String> = targets.0.keys().chain(current.0.keys()).collect();
    classes.sort();
    classes.dedup();

    let drifts: Vec<(&String, f64)> = classes
        .into_iter()
        .map(|class| (class, current.get(class) - targets.get(class)))
        .filter(|(_, drift)| drift.abs() > config.rebalance_tolerance + FRACTION_EPSILON)
        .collect();

    if drifts.is_empty() {
        return None;
    }

    let worst = drifts.iter().map(|(_, d)| d.abs()).fold(0.0, f64::max);
    let priority = if worst > config.rebalance_urgent { Priority::High } else { Priority::Medium };
    let detail: Vec<String> = drifts
        .iter()
        .map(|(class, drift)| {
            let direction = if *drift > 0.0 { "over" } else { "under" };
            format!("{class} {direction} target by {:.1}%", drift.abs() * 100.0)
        })
        .collect();

    let mut rec = Recommendation::new(
        RecommendationKind::Rebalance,
        priority,
        format!(
            "Rebalance toward the {} allocation: {}",
            inputs.profile,
            detail.join(", ")
        ),
    );
    rec.targets = Some(targets);
    Some(rec)
}

fn diversification_rule(inputs: &RuleInputs<'_>, config: &RiskConfig) -> Option<Recommendation> {
    let score = inputs.diversification.score;
    if score >= config.low_diversification_score {
        return None;
    }

    let missing: Vec<String> = inputs
        .profile
        .holding_targets()
        .0
        .into_keys()
        .filter(|class| inputs.allocation.get(class) <= 0.0)
        .collect();

    let priority = if score < config.critical_diversification_score { Priority::High } else { Priority::Medium };
    let description = if missing.is_empty() {
        format!("Diversification score is {score:.0}/100; spread holdings across more sectors and securities")
    } else {
        format!(
            "Diversification score is {score:.0}/100; add uncorrelated asset classes such as {}",
            missing.join(", ")
        )
    };
    Some(Recommendation::new(RecommendationKind::Diversification, priority, description))
}

fn concentration_rule(flag: &ConcentrationFlag, config: &RiskConfig) -> Recommendation {
    let (kind, noun) = match flag.scope {
        ConcentrationScope::Holding => (RecommendationKind::Concentration, "position"),
        ConcentrationScope::Sector => (RecommendationKind::SectorConcentration, "sector exposure"),
    };
    let priority = if flag.fraction > 2.0 * config.concentration_threshold {
        Priority::High
    } else {
        Priority::Medium
    };

    let mut rec = Recommendation::new(
        kind,
        priority,
        format!(
            "Trim {} {noun} ({:.1}% of portfolio) by {} and reallocate the proceeds to bring it down to {:.0}%",
            flag.name,
            flag.fraction * 100.0,
            flag.trim_amount,
            config.concentration_threshold * 100.0
        ),
    );
    rec.subject = Some(flag.name.clone());
    rec.trim_amount = Some(flag.trim_amount);
    rec
}

fn volatility_rule(inputs: &RuleInputs<'_>) -> Option<Recommendation> {
    let volatility = inputs.metrics.volatility?;
    let target = inputs.profile.target_volatility();

    if volatility > target * 1.2 {
        Some(Recommendation::new(
            RecommendationKind::RiskReduction,
            Priority::High,
            format!(
                "Portfolio volatility {volatility:.1}% exceeds the {target:.0}% target for a {} profile; shift toward lower-volatility assets",
                inputs.profile
            ),
        ))
    } else if volatility < target * 0.8 {
        Some(Recommendation::new(
            RecommendationKind::RiskIncrease,
            Priority::Low,
            format!(
                "Portfolio volatility {volatility:.1}% is well below the {target:.0}% target for a {} profile; there is room for more growth assets",
                inputs.profile
            ),
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn diversification(score: f64) -> Diversification {
        Diversification {
            score,
            ..Diversification::default()
        }
    }

    #[test]
    fn test_balanced_moderate_portfolio_has_no_rebalance() {
        let allocation = RiskProfile::Moderate.holding_targets();
        let metrics = RiskMetrics {
            volatility: Some(15.0),
            ..RiskMetrics::default()
        };
        let inputs = RuleInputs {
            profile: RiskProfile::Moderate,
            allocation: &allocation,
            metrics: &metrics,
            diversification: &diversification(80.0),
            concentration: &[],
        };
        assert!(recommend(&inputs, &RiskConfig::default()).is_empty());
    }

    #[test]
    fn test_priority_sort_is_stable() {
        let allocation = AssetAllocation::from_pairs([("equity", 1.0)]);
        let metrics = RiskMetrics {
            volatility: Some(5.0),
            ..RiskMetrics::default()
        };
        let flag = ConcentrationFlag {
            scope: ConcentrationScope::Holding,
            name: "AAPL".into(),
            value: dec!(1000),
            fraction: 1.0,
            trim_amount: dec!(750),
        };
        let inputs = RuleInputs {
            profile: RiskProfile::Moderate,
            allocation: &allocation,
            metrics: &metrics,
            diversification: &diversification(0.0),
            concentration: std::slice::from_ref(&flag),
        };

        let recs = recommend(&inputs, &RiskConfig::default());
        let kinds: Vec<RecommendationKind> = recs.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RecommendationKind::Rebalance,
                RecommendationKind::Diversification,
                RecommendationKind::Concentration,
                RecommendationKind::RiskIncrease,
            ]
        );
        assert_eq!(recs[2].trim_amount, Some(dec!(750)));
        assert_eq!(recs[3].priority, Priority::Low);
    }

    #[test]
    fn test_high_volatility_triggers_reduction() {
        let allocation = RiskProfile::Conservative.holding_targets();
        let metrics = RiskMetrics {
            volatility: Some(30.0),
            ..RiskMetrics::default()
        };
        let inputs = RuleInputs {
            profile: RiskProfile::Conservative,
            allocation: &allocation,
            metrics: &metrics,
            diversification: &diversification(90.0),
            concentration: &[],
        };
        let recs = recommend(&inputs, &RiskConfig::default());
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].kind, RecommendationKind::RiskReduction);
    }

    #[test]
    fn test_concentration_text_matches_trim_sizing() {
        let flag = ConcentrationFlag {
            scope: ConcentrationScope::Sector,
            name: "tech".into(),
            value: dec!(6000),
            fraction: 0.6,
            trim_amount: dec!(3500),
        };
        let rec = concentration_rule(&flag, &RiskConfig::default());

        assert_eq!(rec.kind, RecommendationKind::SectorConcentration);
        assert_eq!(rec.priority, Priority::High);
        assert_eq!(
            rec.description,
            "Trim tech sector exposure (60.0% of portfolio) by 3500 and reallocate the proceeds to bring it down to 25%"
        );
        assert!(!rec.description.contains("under"));
    }
}
