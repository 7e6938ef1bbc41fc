//! Engine Configuration
//!
//! Every threshold the analytics use lives here with a documented default.
//! `EngineConfig::from_env` overrides a subset from environment variables.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Volatility scanner settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Lookback window (in daily returns) when a request does not give one
    pub default_lookback: usize,

    /// Per-symbol market data fetch timeout (milliseconds)
    pub fetch_timeout_ms: u64,

    /// Maximum market data fetches in flight
    pub max_concurrent_fetches: usize,

    /// Trading days per year used to annualize
    pub trading_days: f64,

    /// Volatility (%) above which a symbol counts as highly volatile
    pub high_volatility: f64,

    /// Volatility (%) below which a symbol counts as calm
    pub low_volatility: f64,

    /// |momentum| (%) beyond which a move is a signal
    pub momentum_signal: f64,

    /// |momentum| (%) beyond which a move is strong
    pub strong_momentum: f64,

    /// Volume ratio confirming a directional signal
    pub volume_confirmation: f64,

    /// Volume ratio flagged as unusual in sector insights
    pub unusual_volume: f64,

    /// Volume ratio adding to institutional strength
    pub volume_surge: f64,

    /// Mean sector volatility (%) flagged in sector insights
    pub sector_high_volatility: f64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            default_lookback: 10,
            fetch_timeout_ms: 5_000,
            max_concurrent_fetches: 8,
            trading_days: 252.0,
            high_volatility: 35.0,
            low_volatility: 20.0,
            momentum_signal: 5.0,
            strong_momentum: 10.0,
            volume_confirmation: 1.2,
            unusual_volume: 1.5,
            volume_surge: 2.0,
            sector_high_volatility: 20.0,
        }
    }
}

impl ScannerConfig {
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// Risk analyzer settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Annual risk-free rate as a fraction (0.02 = 2%)
    pub risk_free_rate: f64,

    /// Fraction of total value above which a holding or sector is flagged
    pub concentration_threshold: f64,

    /// Diversification score (0-100) below which more segments are recommended
    pub low_diversification_score: f64,

    /// Score below which that recommendation is high priority
    pub critical_diversification_score: f64,

    /// Effective segment count that maps to a score of 100
    pub full_diversification_segments: f64,

    /// Allowed drift from the profile's asset-class targets
    pub rebalance_tolerance: f64,

    /// Drift beyond which a rebalance is high priority
    pub rebalance_urgent: f64,

    /// Trading days per year used to annualize
    pub trading_days: f64,

    /// Per-symbol history fetch timeout (milliseconds)
    pub fetch_timeout_ms: u64,

    pub max_concurrent_fetches: usize,

    /// Trading days of history requested per holding
    pub history_days: usize,

    /// Weight change below which an optimized target leaves a holding alone
    pub optimization_min_shift: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            concentration_threshold: 0.25,
            low_diversification_score: 40.0,
            critical_diversification_score: 25.0,
            full_diversification_segments: 10.0,
            rebalance_tolerance: 0.10,
            rebalance_urgent: 0.20,
            trading_days: 252.0,
            fetch_timeout_ms: 5_000,
            max_concurrent_fetches: 8,
            history_days: 252,
            optimization_min_shift: 0.01,
        }
    }
}

impl RiskConfig {
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// Strategy generator settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Largest weight a single goal can add before re-normalization
    pub max_goal_tilt: f64,

    /// Yearly goal amount at which a goal exerts half of `max_goal_tilt`
    pub goal_pull_scale: f64,

    /// Transition deltas at or above this are marked significant
    pub significant_shift: f64,

    /// Total goal amount above which tax efficiency becomes a high focus
    pub tax_focus_threshold: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            max_goal_tilt: 0.30,
            goal_pull_scale: 50_000.0,
            significant_shift: 0.05,
            tax_focus_threshold: 500_000.0,
        }
    }
}

/// Trade execution settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// When set, only these symbols may be traded
    pub tradable_universe: Option<BTreeSet<String>>,

    /// How long a batch may wait for approval (hours)
    pub pending_ttl_hours: i64,

    /// Decimal places kept when sizing rebalance orders
    pub quantity_scale: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            tradable_universe: None,
            pending_ttl_hours: 72,
            quantity_scale: 4,
        }
    }
}

impl ExecutionConfig {
    pub fn with_universe<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tradable_universe = Some(
            symbols
                .into_iter()
                .map(|s| s.as_ref().trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
        );
        self
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scanner: ScannerConfig,
    pub risk: RiskConfig,
    pub strategy: StrategyConfig,
    pub execution: ExecutionConfig,
}

impl EngineConfig {
    /// Defaults, overridden by any parseable `ENGINE_*` variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_parse::<u64>("ENGINE_FETCH_TIMEOUT_MS") {
            config.scanner.fetch_timeout_ms = ms;
            config.risk.fetch_timeout_ms = ms;
        }
        if let Some(n) = env_parse::<usize>("ENGINE_MAX_CONCURRENT_FETCHES") {
            config.scanner.max_concurrent_fetches = n;
            config.risk.max_concurrent_fetches = n;
        }
        if let Some(rate) = env_parse("ENGINE_RISK_FREE_RATE") {
            config.risk.risk_free_rate = rate;
        }
        if let Some(threshold) = env_parse("ENGINE_CONCENTRATION_THRESHOLD") {
            config.risk.concentration_threshold = threshold;
        }
        if let Some(score) = env_parse("ENGINE_LOW_DIVERSIFICATION_SCORE") {
            config.risk.low_diversification_score = score;
        }
        if let Some(hours) = env_parse("ENGINE_PENDING_TTL_HOURS") {
            config.execution.pending_ttl_hours = hours;
        }
        if let Ok(universe) = std::env::var("ENGINE_TRADABLE_UNIVERSE") {
            if !universe.trim().is_empty() {
                config.execution = config.execution.with_universe(universe.split(','));
            }
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.risk.concentration_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(EngineError::Config(format!(
                "concentration threshold must be in (0, 1], got {threshold}"
            )));
        }
        if self.scanner.max_concurrent_fetches == 0 || self.risk.max_concurrent_fetches == 0 {
            return Err(EngineError::Config("concurrent fetch limit must be positive".into()));
        }
        if self.scanner.trading_days <= 0.0 || self.risk.trading_days <= 0.0 {
            return Err(EngineError::Config("trading days must be positive".into()));
        }
        if self.scanner.default_lookback < 2 {
            return Err(EngineError::Config("default lookback must be at least 2".into()));
        }
        if self.strategy.goal_pull_scale <= 0.0 || !(0.0..=1.0).contains(&self.strategy.max_goal_tilt) {
            return Err(EngineError::Config("goal tilt settings out of range".into()));
        }
        if !(0.0..1.0).contains(&self.risk.optimization_min_shift) {
            return Err(EngineError::Config("optimization minimum shift must be in [0, 1)".into()));
        }
        if self.execution.pending_ttl_hours <= 0 {
            return Err(EngineError::Config("pending TTL must be positive".into()));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.risk.concentration_threshold - 0.25).abs() < f64::EPSILON);
        assert!(config.risk.risk_free_rate.abs() < f64::EPSILON);
        assert_eq!(config.scanner.fetch_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = EngineConfig::default();
        config.risk.concentration_threshold = 1.5;
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));

        config.risk.concentration_threshold = 0.25;
        config.scanner.max_concurrent_fetches = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_universe_normalized() {
        let config = ExecutionConfig::default().with_universe([" aapl", "MSFT", ""]);
        let universe = config.tradable_universe.unwrap();
        assert!(universe.contains("AAPL"));
        assert!(universe.contains("MSFT"));
        assert_eq!(universe.len(), 2);
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: EngineConfig = serde_json::from_value(serde_json::json!({
            "risk": { "concentration_threshold": 0.3 }
        }))
        .unwrap();
        assert!((config.risk.concentration_threshold - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.scanner.default_lookback, 10);
    }
}
