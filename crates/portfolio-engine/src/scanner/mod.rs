//! Volatility Scanner
//!
//! Computes per-symbol volatility, momentum and volume ratio over a trailing
//! window, filters and ranks the results deterministically and attaches
//! strategy suggestions from a fixed lookup table.

mod sector;
pub mod signals;

pub use sector::{InsightKind, SectorAnalysis, SectorInsight, SectorSummary, analyze_sectors};
pub use signals::{InstitutionalIndicator, Signal, StrategyKind, StrategySuggestion};

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ScannerConfig;
use crate::error::{EngineError, Result};
use crate::market::{self, MarketDataSource, SkippedSymbol, SymbolHistory};

/// Required sign of a symbol's momentum
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumDirection {
    Positive,
    Negative,
}

impl MomentumDirection {
    /// Zero momentum agrees with neither direction
    pub fn admits(self, momentum: f64) -> bool {
        match self {
            Self::Positive => momentum > 0.0,
            Self::Negative => momentum < 0.0,
        }
    }
}

/// Scan request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Symbols to scan; duplicates are scanned once
    pub universe: Vec<String>,

    /// Number of daily returns in the window (defaults to the configured lookback)
    #[serde(default)]
    pub lookback_window: Option<usize>,

    /// Minimum annualized volatility, in percent
    #[serde(default)]
    pub min_volatility: Option<f64>,

    #[serde(default)]
    pub momentum_direction: Option<MomentumDirection>,

    /// Maximum opportunities returned; unbounded when absent
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ScanRequest {
    pub fn new<I, S>(universe: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            universe: universe.into_iter().map(Into::into).collect(),
            lookback_window: None,
            min_volatility: None,
            momentum_direction: None,
            limit: None,
        }
    }

    pub const fn with_lookback(mut self, lookback_window: usize) -> Self {
        self.lookback_window = Some(lookback_window);
        self
    }

    pub const fn with_min_volatility(mut self, min_volatility: f64) -> Self {
        self.min_volatility = Some(min_volatility);
        self
    }

    pub const fn with_direction(mut self, direction: MomentumDirection) -> Self {
        self.momentum_direction = Some(direction);
        self
    }

    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn lookback(&self, config: &ScannerConfig) -> usize {
        self.lookback_window.unwrap_or(config.default_lookback)
    }

    pub fn validate(&self, config: &ScannerConfig) -> Result<()> {
        if self.universe.iter().all(|s| s.trim().is_empty()) {
            return Err(EngineError::invalid("scan universe must contain at least one symbol"));
        }
        if self.lookback(config) < 2 {
            return Err(EngineError::invalid("lookback window must be at least 2 days"));
        }
        if let Some(min) = self.min_volatility {
            if !min.is_finite() || min < 0.0 {
                return Err(EngineError::invalid(format!(
                    "min_volatility must be a non-negative number, got {min}"
                )));
            }
        }
        Ok(())
    }
}

/// Metrics for one symbol over the scan window
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    pub symbol: String,
    pub sector: String,
    pub current_price: f64,

    /// Annualized standard deviation of daily log returns, in percent
    pub volatility: f64,

    /// Price change across the window, in percent
    pub momentum: f64,

    /// Latest volume over the window's mean volume
    pub volume_ratio: f64,

    pub signal: Signal,

    /// Volatility above the high-volatility cutoff
    pub volatile: bool,

    pub institutional_indicator: InstitutionalIndicator,
}

/// A ranked symbol with its suggested strategies
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    #[serde(flatten)]
    pub snapshot: SymbolSnapshot,
    pub strategies: Vec<StrategySuggestion>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub analysis_date: DateTime<Utc>,
    pub lookback_window: usize,

    /// Ranked by volatility desc, |momentum| desc, symbol asc
    pub opportunities: Vec<Opportunity>,

    /// Symbols excluded for missing or unusable data, sorted by symbol
    pub skipped: Vec<SkippedSymbol>,

    /// Aggregated over every symbol with usable data, before filtering
    pub sectors: SectorAnalysis,
}

/// Compute a snapshot from the trailing `lookback + 1` bars of a history
pub fn compute_snapshot(history: &SymbolHistory, lookback: usize, config: &ScannerConfig) -> Result<SymbolSnapshot> {
    let symbol = history.symbol.as_str();
    let bars = history.series.tail(lookback + 1);
    if bars.len() < 2 {
        return Err(EngineError::unavailable(
            symbol,
            format!("insufficient price history: {} bar(s)", bars.len()),
        ));
    }
    if bars.iter().any(|b| !b.close.is_finite() || b.close <= 0.0) {
        return Err(EngineError::unavailable(symbol, "non-positive close in window"));
    }

    let returns: Vec<f64> = bars.windows(2).map(|w| (w[1].close / w[0].close).ln()).collect();
    let volatility = sample_std_dev(&returns) * config.trading_days.sqrt() * 100.0;

    let first = bars[0].close;
    let last = bars[bars.len() - 1].close;
    let momentum = (last / first - 1.0) * 100.0;

    #[allow(clippy::cast_precision_loss)]
    let mean_volume = bars.iter().map(|b| b.volume).sum::<f64>() / bars.len() as f64;
    let volume_ratio = if mean_volume > 0.0 {
        bars[bars.len() - 1].volume / mean_volume
    } else {
        1.0
    };

    tracing::debug!(symbol = %symbol, volatility, momentum, volume_ratio, "symbol metrics");

    Ok(SymbolSnapshot {
        symbol: symbol.to_string(),
        sector: history.sector.clone(),
        current_price: last,
        volatility,
        momentum,
        volume_ratio,
        signal: Signal::for_symbol(momentum, volume_ratio, config),
        volatile: volatility > config.high_volatility,
        institutional_indicator: InstitutionalIndicator::simulate(momentum, volume_ratio, config),
    })
}

/// Sample (n - 1) standard deviation; zero for fewer than two values
pub(crate) fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

/// Ranking order: volatility desc, |momentum| desc, symbol asc
pub fn rank_order(a: &SymbolSnapshot, b: &SymbolSnapshot) -> Ordering {
    b.volatility
        .total_cmp(&a.volatility)
        .then_with(|| b.momentum.abs().total_cmp(&a.momentum.abs()))
        .then_with(|| a.symbol.cmp(&b.symbol))
}

/// Apply the request's filters in order, rank, then truncate to the limit
pub fn select(mut snapshots: Vec<SymbolSnapshot>, request: &ScanRequest) -> Vec<SymbolSnapshot> {
    if let Some(min) = request.min_volatility {
        snapshots.retain(|s| s.volatility >= min);
    }
    if let Some(direction) = request.momentum_direction {
        snapshots.retain(|s| direction.admits(s.momentum));
    }

    snapshots.sort_by(rank_order);

    if let Some(limit) = request.limit {
        snapshots.truncate(limit);
    }
    snapshots
}

/// Build a report from already fetched histories.
///
/// Output depends only on the histories and request, never on fetch order.
pub fn build_report<'a>(
    histories: impl IntoIterator<Item = &'a SymbolHistory>,
    mut skipped: Vec<SkippedSymbol>,
    request: &ScanRequest,
    config: &ScannerConfig,
) -> ScanReport {
    let lookback = request.lookback(config);

    let mut snapshots = Vec::new();
    for history in histories {
        match compute_snapshot(history, lookback, config) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(e) => {
                tracing::warn!(symbol = %history.symbol, error = %e, "symbol skipped");
                skipped.push(SkippedSymbol::from(e));
            }
        }
    }
    skipped.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    let sectors = analyze_sectors(&snapshots, config);

    let opportunities = select(snapshots, request)
        .into_iter()
        .map(|snapshot| Opportunity {
            strategies: signals::suggest(&snapshot.symbol, snapshot.volatility, snapshot.momentum, config),
            snapshot,
        })
        .collect();

    ScanReport {
        analysis_date: Utc::now(),
        lookback_window: lookback,
        opportunities,
        skipped,
        sectors,
    }
}

/// Volatility scanner over a market data source
pub struct VolatilityScanner {
    source: Arc<dyn MarketDataSource>,
    config: ScannerConfig,
}

impl VolatilityScanner {
    pub fn new(source: Arc<dyn MarketDataSource>, config: ScannerConfig) -> Self {
        Self { source, config }
    }

    pub const fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Fetch, compute and rank. Only an invalid request fails; symbols
    /// without usable data are reported in `skipped`.
    pub async fn scan(&self, request: &ScanRequest) -> Result<ScanReport> {
        request.validate(&self.config)?;
        let lookback = request.lookback(&self.config);

        let batch = market::fetch_histories(
            Arc::clone(&self.source),
            &request.universe,
            lookback + 1,
            self.config.fetch_timeout(),
            self.config.max_concurrent_fetches,
        )
        .await;

        let report = build_report(batch.histories.values(), batch.skipped, request, &self.config);

        tracing::info!(
            source = self.source.name(),
            requested = request.universe.len(),
            returned = report.opportunities.len(),
            skipped = report.skipped.len(),
            "market scan complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::InMemoryMarketData;

    fn snap(symbol: &str, volatility: f64, momentum: f64) -> SymbolSnapshot {
        let config = ScannerConfig::default();
        SymbolSnapshot {
            symbol: symbol.into(),
            sector: "tech".into(),
            current_price: 10.0,
            volatility,
            momentum,
            volume_ratio: 1.0,
            signal: Signal::Neutral,
            volatile: volatility > config.high_volatility,
            institutional_indicator: InstitutionalIndicator::simulate(momentum, 1.0, &config),
        }
    }

    #[test]
    fn test_select_direction_and_limit() {
        let request = ScanRequest::new(["A", "B"])
            .with_direction(MomentumDirection::Positive)
            .with_limit(1);
        let picked = select(vec![snap("B", 25.0, -3.0), snap("A", 40.0, 5.0)], &request);

        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].symbol, "A");
    }

    #[test]
    fn test_ranking_tie_breaks_are_deterministic() {
        let input = vec![
            snap("ZZZ", 30.0, 2.0),
            snap("AAA", 30.0, 2.0),
            snap("MMM", 30.0, -8.0),
            snap("TOP", 50.0, 0.0),
        ];
        let mut reversed = input.clone();
        reversed.reverse();

        let request = ScanRequest::new(["x"]);
        let order = |v| select(v, &request).into_iter().map(|s| s.symbol).collect::<Vec<_>>();

        assert_eq!(order(input), vec!["TOP", "MMM", "AAA", "ZZZ"]);
        assert_eq!(order(reversed), vec!["TOP", "MMM", "AAA", "ZZZ"]);
    }

    #[test]
    fn test_zero_momentum_matches_no_direction() {
        let request = ScanRequest::new(["x"]).with_direction(MomentumDirection::Negative);
        assert!(select(vec![snap("FLAT", 30.0, 0.0)], &request).is_empty());

        let min_vol = ScanRequest::new(["x"]).with_min_volatility(30.0);
        assert_eq!(select(vec![snap("A", 30.0, 1.0), snap("B", 29.9, 1.0)], &min_vol).len(), 1);
    }

    #[test]
    fn test_compute_snapshot_metrics() {
        let config = ScannerConfig::default();
        let source = InMemoryMarketData::new().with_bars(
            "ABC",
            "tech",
            &[100.0, 102.0, 101.0, 105.0],
            &[1_000.0, 1_000.0, 1_000.0, 3_000.0],
        );
        let history = source.get("ABC").unwrap();

        let snapshot = compute_snapshot(history, 10, &config).unwrap();
        assert!((snapshot.momentum - 5.0).abs() < 1e-9);
        assert!((snapshot.volume_ratio - 2.0).abs() < 1e-9);
        assert!((snapshot.current_price - 105.0).abs() < 1e-9);

        let returns = [(102.0_f64 / 100.0).ln(), (101.0_f64 / 102.0).ln(), (105.0_f64 / 101.0).ln()];
        let expected = sample_std_dev(&returns) * 252.0_f64.sqrt() * 100.0;
        assert!((snapshot.volatility - expected).abs() < 1e-9);
    }

    #[test]
    fn test_window_uses_trailing_bars_only() {
        let config = ScannerConfig::default();
        let source = InMemoryMarketData::new().with_closes("ABC", "tech", &[50.0, 100.0, 100.0, 110.0]);
        let history = source.get("ABC").unwrap();

        let snapshot = compute_snapshot(history, 2, &config).unwrap();
        assert!((snapshot.momentum - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_bar_is_unavailable() {
        let config = ScannerConfig::default();
        let source = InMemoryMarketData::new().with_closes("ONE", "tech", &[10.0]);
        let err = compute_snapshot(source.get("ONE").unwrap(), 10, &config).unwrap_err();
        assert!(matches!(err, EngineError::DataUnavailable { .. }));
    }

    #[test]
    fn test_request_validation() {
        let config = ScannerConfig::default();
        assert!(ScanRequest::new(Vec::<String>::new()).validate(&config).is_err());
        assert!(ScanRequest::new(["A"]).with_lookback(1).validate(&config).is_err());
        assert!(ScanRequest::new(["A"]).with_min_volatility(-1.0).validate(&config).is_err());
        assert!(ScanRequest::new(["A"]).validate(&config).is_ok());
    }

    #[tokio::test]
    async fn test_scan_reports_skips_and_sectors() {
        let source = InMemoryMarketData::new()
            .with_synthetic("NVDA", "tech", 400.0, 0.01, 0.04, 30)
            .with_synthetic("XOM", "energy", 100.0, -0.002, 0.005, 30)
            .with_closes("THIN", "energy", &[10.0]);
        let scanner = VolatilityScanner::new(Arc::new(source), ScannerConfig::default());

        let report = scanner
            .scan(&ScanRequest::new(["NVDA", "XOM", "THIN", "MISSING"]))
            .await
            .unwrap();

        let symbols: Vec<&str> = report.opportunities.iter().map(|o| o.snapshot.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["NVDA", "XOM"]);
        assert!(report.opportunities.iter().all(|o| !o.strategies.is_empty()));

        let skipped: Vec<&str> = report.skipped.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(skipped, vec!["MISSING", "THIN"]);

        assert_eq!(report.sectors.sectors.len(), 2);
        assert_eq!(report.lookback_window, 10);
    }
}
