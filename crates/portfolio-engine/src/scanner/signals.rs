//! Signal and Strategy Tables
//!
//! Fixed lookups from a symbol's volatility/momentum bucket to a qualitative
//! signal, a simulated institutional indicator and a set of strategy
//! suggestions. These are data, not control flow.

use serde::{Deserialize, Serialize};

use crate::config::ScannerConfig;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl Signal {
    /// Directional signal confirmed by volume
    pub fn for_symbol(momentum: f64, volume_ratio: f64, config: &ScannerConfig) -> Self {
        let confirmed = volume_ratio > config.volume_confirmation;
        if momentum > config.momentum_signal && confirmed {
            Self::Bullish
        } else if momentum < -config.momentum_signal && confirmed {
            Self::Bearish
        } else {
            Self::Neutral
        }
    }

    /// Sector signal from mean momentum alone
    pub fn for_sector(mean_momentum: f64, config: &ScannerConfig) -> Self {
        if mean_momentum > config.momentum_signal {
            Self::Bullish
        } else if mean_momentum < -config.momentum_signal {
            Self::Bearish
        } else {
            Self::Neutral
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
        }
    }
}

/// Simulated read of institutional positioning
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionalIndicator {
    pub sentiment: Signal,

    /// 1 (faint) to 10 (strong)
    pub strength: u8,

    pub description: String,
}

impl InstitutionalIndicator {
    pub fn simulate(momentum: f64, volume_ratio: f64, config: &ScannerConfig) -> Self {
        let mut sentiment = Signal::Neutral;
        let mut strength: u8 = 5;

        if momentum > config.strong_momentum {
            sentiment = Signal::Bullish;
            strength += 2;
        } else if momentum < -config.strong_momentum {
            sentiment = Signal::Bearish;
            strength += 2;
        }

        if volume_ratio > config.volume_surge {
            strength += 1;
        }

        let strength = strength.min(10);
        Self {
            sentiment,
            strength,
            description: format!(
                "Simulated institutional activity shows {} sentiment with strength {strength}/10",
                sentiment.as_str()
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityBucket {
    Low,
    Elevated,
    High,
}

impl VolatilityBucket {
    pub fn classify(volatility: f64, config: &ScannerConfig) -> Self {
        if volatility >= config.high_volatility {
            Self::High
        } else if volatility >= config.low_volatility {
            Self::Elevated
        } else {
            Self::Low
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumBucket {
    StrongDown,
    Down,
    Flat,
    Up,
    StrongUp,
}

impl MomentumBucket {
    pub fn classify(momentum: f64, config: &ScannerConfig) -> Self {
        if momentum > config.strong_momentum {
            Self::StrongUp
        } else if momentum > config.momentum_signal {
            Self::Up
        } else if momentum < -config.strong_momentum {
            Self::StrongDown
        } else if momentum < -config.momentum_signal {
            Self::Down
        } else {
            Self::Flat
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    MomentumLong,
    TrailingStopLong,
    BullCallSpread,
    BearPutSpread,
    ProtectiveHedge,
    MeanReversion,
    Straddle,
    IronCondor,
    CoveredCall,
    BuyDips,
    DollarCostAveraging,
    WaitAndWatch,
}

impl StrategyKind {
    pub const fn risk_level(self) -> RiskLevel {
        match self {
            Self::MomentumLong | Self::Straddle | Self::MeanReversion => RiskLevel::High,
            Self::TrailingStopLong
            | Self::BullCallSpread
            | Self::BearPutSpread
            | Self::IronCondor
            | Self::BuyDips => RiskLevel::Moderate,
            Self::ProtectiveHedge
            | Self::CoveredCall
            | Self::DollarCostAveraging
            | Self::WaitAndWatch => RiskLevel::Low,
        }
    }

    pub fn describe(self, symbol: &str) -> String {
        match self {
            Self::MomentumLong => format!("Ride the trend in {symbol} with a long position"),
            Self::TrailingStopLong => format!("Hold {symbol} long with a trailing stop loss"),
            Self::BullCallSpread => format!("Bull call spread on {symbol} for capped upside"),
            Self::BearPutSpread => format!("Bear put spread on {symbol} for capped downside"),
            Self::ProtectiveHedge => format!("Hedge existing {symbol} exposure with protective puts"),
            Self::MeanReversion => format!("Scale into {symbol} expecting reversion toward its mean"),
            Self::Straddle => format!("Long straddle on {symbol} to capture a breakout either way"),
            Self::IronCondor => format!("Iron condor on {symbol} to collect premium in a range"),
            Self::CoveredCall => format!("Hold {symbol} and sell covered calls for income"),
            Self::BuyDips => format!("Accumulate {symbol} gradually on price dips"),
            Self::DollarCostAveraging => format!("Buy {symbol} in fixed amounts on a schedule"),
            Self::WaitAndWatch => format!("Monitor {symbol} for a clearer signal"),
        }
    }
}

/// One suggested approach for a scanned symbol
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySuggestion {
    pub kind: StrategyKind,
    pub description: String,
    pub risk_level: RiskLevel,
}

use MomentumBucket as M;
use StrategyKind as S;
use VolatilityBucket as V;

/// Bucket → strategy set. Every bucket pair appears exactly once.
const STRATEGY_TABLE: [(V, M, &[StrategyKind]); 15] = [
    (V::High, M::StrongUp, &[S::MomentumLong, S::BullCallSpread, S::TrailingStopLong]),
    (V::High, M::Up, &[S::MomentumLong, S::TrailingStopLong]),
    (V::High, M::Flat, &[S::Straddle, S::IronCondor]),
    (V::High, M::Down, &[S::MeanReversion, S::ProtectiveHedge]),
    (V::High, M::StrongDown, &[S::BearPutSpread, S::ProtectiveHedge, S::MeanReversion]),
    (V::Elevated, M::StrongUp, &[S::MomentumLong, S::CoveredCall]),
    (V::Elevated, M::Up, &[S::TrailingStopLong, S::CoveredCall]),
    (V::Elevated, M::Flat, &[S::IronCondor, S::WaitAndWatch]),
    (V::Elevated, M::Down, &[S::BuyDips, S::MeanReversion]),
    (V::Elevated, M::StrongDown, &[S::BearPutSpread, S::BuyDips]),
    (V::Low, M::StrongUp, &[S::MomentumLong]),
    (V::Low, M::Up, &[S::DollarCostAveraging, S::CoveredCall]),
    (V::Low, M::Flat, &[S::DollarCostAveraging, S::WaitAndWatch]),
    (V::Low, M::Down, &[S::BuyDips, S::DollarCostAveraging]),
    (V::Low, M::StrongDown, &[S::WaitAndWatch]),
];

const FALLBACK: &[StrategyKind] = &[S::WaitAndWatch];

pub fn strategies_for(volatility: VolatilityBucket, momentum: MomentumBucket) -> &'static [StrategyKind] {
    STRATEGY_TABLE
        .iter()
        .find(|(v, m, _)| *v == volatility && *m == momentum)
        .map_or(FALLBACK, |(_, _, kinds)| *kinds)
}

/// Strategy suggestions for a symbol's metrics
pub fn suggest(symbol: &str, volatility: f64, momentum: f64, config: &ScannerConfig) -> Vec<StrategySuggestion> {
    let kinds = strategies_for(
        VolatilityBucket::classify(volatility, config),
        MomentumBucket::classify(momentum, config),
    );

    kinds
        .iter()
        .map(|&kind| StrategySuggestion {
            kind,
            description: kind.describe(symbol),
            risk_level: kind.risk_level(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_covers_every_bucket() {
        for v in [V::Low, V::Elevated, V::High] {
            for m in [M::StrongDown, M::Down, M::Flat, M::Up, M::StrongUp] {
                let matches = STRATEGY_TABLE.iter().filter(|(tv, tm, _)| *tv == v && *tm == m).count();
                assert_eq!(matches, 1, "{v:?}/{m:?}");
                assert!(!strategies_for(v, m).is_empty());
            }
        }
    }

    #[test]
    fn test_high_vol_direction_picks_follow_or_hedge() {
        let config = ScannerConfig::default();

        let up = suggest("NVDA", 45.0, 12.0, &config);
        assert_eq!(up[0].kind, StrategyKind::MomentumLong);

        let down = suggest("NVDA", 45.0, -12.0, &config);
        assert!(down.iter().any(|s| s.kind == StrategyKind::ProtectiveHedge));
        assert!(down.iter().any(|s| s.kind == StrategyKind::MeanReversion));
    }

    #[test]
    fn test_signal_needs_volume_confirmation() {
        let config = ScannerConfig::default();
        assert_eq!(Signal::for_symbol(8.0, 1.5, &config), Signal::Bullish);
        assert_eq!(Signal::for_symbol(8.0, 1.0, &config), Signal::Neutral);
        assert_eq!(Signal::for_symbol(-8.0, 1.3, &config), Signal::Bearish);
        assert_eq!(Signal::for_sector(-6.0, &config), Signal::Bearish);
    }

    #[test]
    fn test_institutional_strength_capped() {
        let config = ScannerConfig::default();
        let indicator = InstitutionalIndicator::simulate(15.0, 3.0, &config);
        assert_eq!(indicator.sentiment, Signal::Bullish);
        assert_eq!(indicator.strength, 8);

        let quiet = InstitutionalIndicator::simulate(1.0, 1.0, &config);
        assert_eq!(quiet.sentiment, Signal::Neutral);
        assert_eq!(quiet.strength, 5);
    }
}
