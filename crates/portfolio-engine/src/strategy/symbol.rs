//! Per-Symbol Strategy Recommendation

use serde::{Deserialize, Serialize};

use crate::model::{InvestmentHorizon, RiskProfile};
use crate::scanner::{Signal, SymbolSnapshot};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolStrategyKind {
    LongPosition,
    BuyDips,
    MomentumSwing,
    DollarCostAveraging,
    WaitAndWatch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstitutionalAlignment {
    Aligned,
    Contrary,
    Neutral,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolStrategy {
    pub kind: SymbolStrategyKind,
    pub description: String,

    /// Base risk (1-10) scaled by profile and horizon
    pub effective_risk: f64,
    pub institutional_alignment: InstitutionalAlignment,

    /// Ordered actions to put the strategy in place
    #[serde(default)]
    pub implementation_steps: Vec<String>,
}

/// Horizon a catalogue entry suits; `None` suits any
struct CatalogueEntry {
    kind: SymbolStrategyKind,
    base_risk: f64,
    horizon: Option<InvestmentHorizon>,
    momentum: (Option<f64>, Option<f64>),
    volatility: (Option<f64>, Option<f64>),
}

const CATALOGUE: [CatalogueEntry; 5] = [
    CatalogueEntry {
        kind: SymbolStrategyKind::LongPosition,
        base_risk: 4.0,
        horizon: None,
        momentum: (Some(0.0), None),
        volatility: (None, None),
    },
    CatalogueEntry {
        kind: SymbolStrategyKind::BuyDips,
        base_risk: 3.0,
        horizon: Some(InvestmentHorizon::Medium),
        momentum: (Some(-15.0), Some(0.0)),
        volatility: (Some(20.0), None),
    },
    CatalogueEntry {
        kind: SymbolStrategyKind::MomentumSwing,
        base_risk: 6.0,
        horizon: Some(InvestmentHorizon::Short),
        momentum: (Some(8.0), None),
        volatility: (Some(25.0), None),
    },
    CatalogueEntry {
        kind: SymbolStrategyKind::DollarCostAveraging,
        base_risk: 2.0,
        horizon: Some(InvestmentHorizon::Long),
        momentum: (None, None),
        volatility: (None, Some(40.0)),
    },
    CatalogueEntry {
        kind: SymbolStrategyKind::WaitAndWatch,
        base_risk: 1.0,
        horizon: None,
        momentum: (None, None),
        volatility: (None, None),
    },
];

fn within(value: f64, (min, max): (Option<f64>, Option<f64>)) -> bool {
    min.is_none_or(|m| value >= m) && max.is_none_or(|m| value <= m)
}

/// Medium-horizon entries also suit long investors; short ones suit
/// aggressive medium-horizon investors.
fn horizon_fits(entry: Option<InvestmentHorizon>, investor: InvestmentHorizon, risk: RiskProfile) -> bool {
    match entry {
        None => true,
        Some(h) if h == investor => true,
        Some(InvestmentHorizon::Medium) => investor == InvestmentHorizon::Long,
        Some(InvestmentHorizon::Short) => {
            investor == InvestmentHorizon::Medium && risk == RiskProfile::Aggressive
        }
        Some(InvestmentHorizon::Long) => false,
    }
}

const fn risk_multiplier(risk: RiskProfile) -> f64 {
    match risk {
        RiskProfile::Conservative => 0.5,
        RiskProfile::Moderate => 1.0,
        RiskProfile::Aggressive => 1.5,
    }
}

const fn horizon_factor(horizon: InvestmentHorizon) -> f64 {
    match horizon {
        InvestmentHorizon::Short => 0.7,
        InvestmentHorizon::Medium => 1.0,
        InvestmentHorizon::Long => 1.3,
    }
}

const fn risk_cap(risk: RiskProfile) -> Option<f64> {
    match risk {
        RiskProfile::Conservative => Some(5.0),
        RiskProfile::Moderate => Some(8.0),
        RiskProfile::Aggressive => None,
    }
}

fn describe(kind: SymbolStrategyKind, symbol: &str) -> String {
    match kind {
        SymbolStrategyKind::LongPosition => format!("Buy {symbol} shares and hold"),
        SymbolStrategyKind::BuyDips => format!("Gradually buy {symbol} on price dips"),
        SymbolStrategyKind::MomentumSwing => format!("Buy {symbol} on upward momentum with a trailing stop"),
        SymbolStrategyKind::DollarCostAveraging => {
            format!("Regularly buy {symbol} in fixed amounts regardless of price")
        }
        SymbolStrategyKind::WaitAndWatch => format!("Monitor {symbol} for a better entry point"),
    }
}

/// Steps for `kind` on `symbol`; limit entries sit 1% under `price`
pub fn implementation_steps(kind: SymbolStrategyKind, symbol: &str, price: f64) -> Vec<String> {
    match kind {
        SymbolStrategyKind::LongPosition => vec![
            format!("Research {symbol} fundamentals and recent news"),
            "Size the position according to your risk management rules".into(),
            format!("Place a limit order slightly below the current price (${:.2})", price * 0.99),
            "Consider a stop loss 5-10% below the purchase price".into(),
            "Monitor earnings announcements and major news".into(),
        ],
        SymbolStrategyKind::BuyDips => vec![
            format!("Set price alerts for {symbol} at support levels"),
            "Prepare 3-4 equal-sized buy orders".into(),
            "Execute the first order when the price dips 3-5%".into(),
            "Add with the next orders on further dips of 3-5%".into(),
            "Set a trailing stop once the full position is built".into(),
        ],
        SymbolStrategyKind::MomentumSwing => vec![
            format!("Confirm the {symbol} uptrend with moving averages (20-day above 50-day)"),
            "Enter on a pullback to support or the moving average".into(),
            "Set a tight stop at the recent swing low".into(),
            "Take partial profits at a 1:1 risk-reward ratio".into(),
            "Trail the stop on the remaining position".into(),
        ],
        SymbolStrategyKind::DollarCostAveraging => vec![
            format!("Decide the total position size for {symbol}"),
            "Split it into equal portions (e.g. 12 monthly or 52 weekly buys)".into(),
            "Automate purchases at a fixed interval".into(),
            "Keep buying regardless of price moves".into(),
            "Review yearly or after a significant market change".into(),
        ],
        SymbolStrategyKind::WaitAndWatch => vec![
            format!("Set price alerts for {symbol} at key technical levels"),
            "Watch for changes in institutional sentiment".into(),
            "Look for volatility compression ahead of a breakout".into(),
            "Re-evaluate in 2-4 weeks".into(),
        ],
    }
}

/// Long-biased entries agree with bullish flows and disagree with bearish ones
fn alignment(kind: SymbolStrategyKind, sentiment: Signal) -> InstitutionalAlignment {
    let long_biased = matches!(kind, SymbolStrategyKind::LongPosition | SymbolStrategyKind::MomentumSwing);
    match (long_biased, sentiment) {
        (true, Signal::Bullish) => InstitutionalAlignment::Aligned,
        (true, Signal::Bearish) => InstitutionalAlignment::Contrary,
        _ => InstitutionalAlignment::Neutral,
    }
}

/// Strategies for one scanned symbol, fitted to an investor's profile.
///
/// Sorted by effective risk, highest first for aggressive investors and
/// lowest first otherwise, ties by kind. Never empty.
pub fn recommend_for_symbol(
    snapshot: &SymbolSnapshot,
    risk: RiskProfile,
    horizon: InvestmentHorizon,
) -> Vec<SymbolStrategy> {
    let scale = risk_multiplier(risk) * horizon_factor(horizon);
    let cap = risk_cap(risk);
    let sentiment = snapshot.institutional_indicator.sentiment;

    let mut strategies: Vec<SymbolStrategy> = CATALOGUE
        .iter()
        .filter(|e| within(snapshot.momentum, e.momentum) && within(snapshot.volatility, e.volatility))
        .filter(|e| horizon_fits(e.horizon, horizon, risk))
        .map(|e| (e, e.base_risk * scale))
        .filter(|(_, effective)| cap.is_none_or(|c| *effective <= c))
        .map(|(e, effective)| SymbolStrategy {
            kind: e.kind,
            description: describe(e.kind, &snapshot.symbol),
            effective_risk: (effective * 10.0).round() / 10.0,
            institutional_alignment: alignment(e.kind, sentiment),
            implementation_steps: implementation_steps(e.kind, &snapshot.symbol, snapshot.current_price),
        })
        .collect();

    if strategies.is_empty() {
        strategies.push(SymbolStrategy {
            kind: SymbolStrategyKind::WaitAndWatch,
            description: describe(SymbolStrategyKind::WaitAndWatch, &snapshot.symbol),
            effective_risk: 1.0,
            institutional_alignment: InstitutionalAlignment::Neutral,
            implementation_steps: implementation_steps(
                SymbolStrategyKind::WaitAndWatch,
                &snapshot.symbol,
                snapshot.current_price,
            ),
        });
    }

    strategies.sort_by(|a, b| {
        let by_risk = if risk == RiskProfile::Aggressive {
            b.effective_risk.total_cmp(&a.effective_risk)
        } else {
            a.effective_risk.total_cmp(&b.effective_risk)
        };
        by_risk.then_with(|| a.kind.cmp(&b.kind))
    });
    strategies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScannerConfig;
    use crate::scanner::InstitutionalIndicator;

    fn snapshot(volatility: f64, momentum: f64) -> SymbolSnapshot {
        let config = ScannerConfig::default();
        SymbolSnapshot {
            symbol: "TSLA".into(),
            sector: "auto".into(),
            current_price: 250.0,
            volatility,
            momentum,
            volume_ratio: 1.0,
            signal: Signal::for_symbol(momentum, 1.0, &config),
            volatile: volatility > config.high_volatility,
            institutional_indicator: InstitutionalIndicator::simulate(momentum, 1.0, &config),
        }
    }

    #[test]
    fn test_aggressive_short_gets_momentum_swing_first() {
        let strategies = recommend_for_symbol(&snapshot(45.0, 12.0), RiskProfile::Aggressive, InvestmentHorizon::Short);
        assert_eq!(strategies[0].kind, SymbolStrategyKind::MomentumSwing);
        assert_eq!(strategies[0].institutional_alignment, InstitutionalAlignment::Aligned);
        // 6 × 1.5 × 0.7
        assert!((strategies[0].effective_risk - 6.3).abs() < 1e-9);
    }

    #[test]
    fn test_conservative_sorted_ascending_and_capped() {
        let strategies =
            recommend_for_symbol(&snapshot(30.0, 3.0), RiskProfile::Conservative, InvestmentHorizon::Long);
        let kinds: Vec<SymbolStrategyKind> = strategies.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SymbolStrategyKind::WaitAndWatch,
                SymbolStrategyKind::DollarCostAveraging,
                SymbolStrategyKind::LongPosition,
            ]
        );
        assert!(strategies.iter().all(|s| s.effective_risk <= 5.0));
    }

    #[test]
    fn test_every_strategy_carries_steps() {
        let strategies = recommend_for_symbol(&snapshot(30.0, 3.0), RiskProfile::Conservative, InvestmentHorizon::Long);
        assert!(strategies.iter().all(|s| !s.implementation_steps.is_empty()));

        let long = strategies
            .iter()
            .find(|s| s.kind == SymbolStrategyKind::LongPosition)
            .unwrap();
        assert_eq!(long.implementation_steps[0], "Research TSLA fundamentals and recent news");
        // 1% under 250
        assert!(long.implementation_steps[2].contains("$247.50"));
    }

    #[test]
    fn test_downtrend_medium_horizon() {
        let strategies = recommend_for_symbol(&snapshot(28.0, -6.0), RiskProfile::Moderate, InvestmentHorizon::Medium);
        let kinds: Vec<SymbolStrategyKind> = strategies.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SymbolStrategyKind::WaitAndWatch, SymbolStrategyKind::BuyDips]);
    }
}
