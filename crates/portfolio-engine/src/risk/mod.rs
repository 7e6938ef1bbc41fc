//! Risk Analyzer
//!
//! Allocation breakdown, covariance-based risk metrics, diversification and
//! concentration analysis plus rule-based recommendations for a portfolio.
//!
//! A portfolio with no value yields an empty report rather than an error.

pub mod metrics;
pub mod optimize;
mod recommend;

pub use metrics::RiskMetrics;
pub use optimize::{Objective, OptimizationReport, OptimizationRequest, RebalanceAction, RebalanceActionKind};
pub use recommend::{Priority, Recommendation, RecommendationKind};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;
use crate::error::Result;
use crate::market::{self, MarketDataSource, SkippedSymbol};
use crate::model::{Portfolio, PriceSeries, RiskProfile, canonical_asset_class, ratio};

/// Value and share of total for one allocation bucket
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub value: Decimal,
    pub fraction: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Diversification {
    /// 0 (single segment) to 100 (evenly spread over the full segment count)
    pub score: f64,
    pub asset_class_count: usize,
    pub sector_count: usize,
    pub security_count: usize,

    /// Largest single holding's share of value
    pub top_holding_concentration: f64,

    /// Share of the five largest holdings; only with at least five securities
    pub top5_concentration: Option<f64>,

    /// Holding-level Herfindahl index on a 0-10 000 scale
    pub herfindahl_index: f64,

    /// 1 / sector Herfindahl
    pub effective_sectors: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationScope {
    Holding,
    Sector,
}

/// A holding or sector above the concentration threshold
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationFlag {
    pub scope: ConcentrationScope,
    pub name: String,
    pub value: Decimal,
    pub fraction: f64,

    /// `value − threshold × total`; lands on the threshold once the proceeds are reinvested
    pub trim_amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub analysis_date: DateTime<Utc>,
    pub risk_profile: RiskProfile,
    pub total_value: Decimal,

    /// True when the portfolio has no value; every metric is then zero or null
    pub empty: bool,

    /// Keyed by the caller's asset-class labels
    pub asset_allocation: BTreeMap<String, AllocationEntry>,
    pub sector_allocation: BTreeMap<String, AllocationEntry>,
    pub risk_metrics: RiskMetrics,
    pub diversification: Diversification,
    pub concentration: Vec<ConcentrationFlag>,
    pub recommendations: Vec<Recommendation>,
}

impl RiskReport {
    fn empty(portfolio: &Portfolio) -> Self {
        Self {
            analysis_date: Utc::now(),
            risk_profile: portfolio.risk_profile,
            total_value: Decimal::ZERO,
            empty: true,
            asset_allocation: BTreeMap::new(),
            sector_allocation: BTreeMap::new(),
            risk_metrics: RiskMetrics::default(),
            diversification: Diversification::default(),
            concentration: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    pub fn has_recommendation(&self, kind: RecommendationKind) -> bool {
        self.recommendations.iter().any(|r| r.kind == kind)
    }
}

fn breakdown(values: BTreeMap<String, Decimal>, total: Decimal) -> BTreeMap<String, AllocationEntry> {
    values
        .into_iter()
        .map(|(key, value)| {
            let fraction = ratio(value, total);
            (key, AllocationEntry { value, fraction })
        })
        .collect()
}

/// Diversification detail from holding and sector weights
pub fn diversification(portfolio: &Portfolio, config: &RiskConfig) -> Diversification {
    let total = portfolio.total_value();
    if total <= Decimal::ZERO {
        return Diversification::default();
    }

    let mut holding_weights: Vec<f64> = portfolio
        .value_by_symbol()
        .values()
        .map(|v| ratio(*v, total))
        .collect();
    holding_weights.sort_by(|a, b| b.total_cmp(a));

    let sector_hhi: f64 = portfolio
        .value_by_sector()
        .values()
        .map(|v| ratio(*v, total).powi(2))
        .sum();
    let effective_sectors = if sector_hhi > 0.0 { 1.0 / sector_hhi } else { 0.0 };

    let span = (config.full_diversification_segments - 1.0).max(1.0);
    let score = ((effective_sectors - 1.0) / span * 100.0).clamp(0.0, 100.0);

    let asset_classes: BTreeSet<String> = portfolio
        .holdings
        .iter()
        .map(|h| canonical_asset_class(&h.asset_class))
        .collect();
    let sectors: BTreeSet<&str> = portfolio.holdings.iter().map(|h| h.sector.as_str()).collect();

    Diversification {
        score,
        asset_class_count: asset_classes.len(),
        sector_count: sectors.len(),
        security_count: holding_weights.len(),
        top_holding_concentration: holding_weights.first().copied().unwrap_or(0.0),
        top5_concentration: (holding_weights.len() >= 5).then(|| holding_weights.iter().take(5).sum()),
        herfindahl_index: holding_weights.iter().map(|w| (w * 100.0).powi(2)).sum(),
        effective_sectors,
    }
}

/// Holdings (aggregated by symbol) and sectors above the threshold
pub fn concentration_flags(portfolio: &Portfolio, threshold: f64) -> Vec<ConcentrationFlag> {
    let total = portfolio.total_value();
    if total <= Decimal::ZERO {
        return Vec::new();
    }
    let allowed = Decimal::from_f64(threshold).unwrap_or(Decimal::ONE) * total;

    let scoped = [
        (ConcentrationScope::Holding, portfolio.value_by_symbol()),
        (ConcentrationScope::Sector, portfolio.value_by_sector()),
    ];

    scoped
        .into_iter()
        .flat_map(|(scope, values)| {
            values.into_iter().filter_map(move |(name, value)| {
                let fraction = ratio(value, total);
                (fraction > threshold).then(|| ConcentrationFlag {
                    scope,
                    name,
                    value,
                    fraction,
                    trim_amount: (value - allowed).max(Decimal::ZERO).round_dp(2),
                })
            })
        })
        .collect()
}

/// Risk analyzer
pub struct RiskAnalyzer {
    source: Arc<dyn MarketDataSource>,
    config: RiskConfig,
}

impl RiskAnalyzer {
    pub fn new(source: Arc<dyn MarketDataSource>, config: RiskConfig) -> Self {
        Self { source, config }
    }

    pub const fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Analyze against already fetched history (`symbol → series`)
    pub fn analyze(&self, portfolio: &Portfolio, history: &BTreeMap<String, PriceSeries>) -> Result<RiskReport> {
        self.analyze_with_skips(portfolio, history, Vec::new())
    }

    /// Fetch history for every valued holding, then analyze
    pub async fn analyze_portfolio(&self, portfolio: &Portfolio) -> Result<RiskReport> {
        portfolio.validate()?;

        let symbols: Vec<String> = portfolio
            .holdings
            .iter()
            .filter(|h| h.value > Decimal::ZERO)
            .map(|h| h.symbol.clone())
            .collect();

        let batch = market::fetch_histories(
            Arc::clone(&self.source),
            &symbols,
            self.config.history_days,
            self.config.fetch_timeout(),
            self.config.max_concurrent_fetches,
        )
        .await;

        let history = batch
            .histories
            .into_iter()
            .map(|(symbol, h)| (symbol, h.series))
            .collect();

        self.analyze_with_skips(portfolio, &history, batch.skipped)
    }

    /// Fetch history for the holdings and candidates, then optimize weights
    pub async fn optimize_portfolio(
        &self,
        portfolio: &Portfolio,
        request: &OptimizationRequest,
    ) -> Result<OptimizationReport> {
        portfolio.validate()?;

        let mut symbols: BTreeSet<String> = portfolio
            .holdings
            .iter()
            .filter(|h| h.value > Decimal::ZERO)
            .map(|h| h.symbol.clone())
            .collect();
        symbols.extend(request.candidate_symbols());
        let symbols: Vec<String> = symbols.into_iter().collect();

        let batch = market::fetch_histories(
            Arc::clone(&self.source),
            &symbols,
            self.config.history_days,
            self.config.fetch_timeout(),
            self.config.max_concurrent_fetches,
        )
        .await;

        let history = batch
            .histories
            .into_iter()
            .map(|(symbol, h)| (symbol, h.series))
            .collect();

        optimize::optimize(portfolio, request, &history, batch.skipped, &self.config)
    }

    fn analyze_with_skips(
        &self,
        portfolio: &Portfolio,
        history: &BTreeMap<String, PriceSeries>,
        skipped: Vec<SkippedSymbol>,
    ) -> Result<RiskReport> {
        portfolio.validate()?;

        let total = portfolio.total_value();
        if total <= Decimal::ZERO {
            tracing::info!(holdings = portfolio.holdings.len(), "empty portfolio analyzed");
            return Ok(RiskReport::empty(portfolio));
        }

        let weights: BTreeMap<String, f64> = portfolio
            .value_by_symbol()
            .into_iter()
            .map(|(symbol, value)| (symbol, ratio(value, total)))
            .collect();

        let risk_metrics = metrics::compute(
            &weights,
            history,
            skipped,
            self.config.trading_days,
            self.config.risk_free_rate,
        );
        let diversification = diversification(portfolio, &self.config);
        let concentration = concentration_flags(portfolio, self.config.concentration_threshold);
        let allocation = portfolio.allocation();

        let recommendations = recommend::recommend(
            &recommend::RuleInputs {
                profile: portfolio.risk_profile,
                allocation: &allocation,
                metrics: &risk_metrics,
                diversification: &diversification,
                concentration: &concentration,
            },
            &self.config,
        );

        tracing::info!(
            total_value = %total,
            holdings = portfolio.holdings.len(),
            coverage = risk_metrics.coverage,
            recommendations = recommendations.len(),
            "portfolio analysis complete"
        );

        Ok(RiskReport {
            analysis_date: Utc::now(),
            risk_profile: portfolio.risk_profile,
            total_value: total,
            empty: false,
            asset_allocation: breakdown(portfolio.value_by_asset_class(), total),
            sector_allocation: breakdown(portfolio.value_by_sector(), total),
            risk_metrics,
            diversification,
            concentration,
            recommendations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::InMemoryMarketData;
    use crate::model::Holding;
    use rust_decimal_macros::dec;

    fn analyzer(source: InMemoryMarketData) -> RiskAnalyzer {
        RiskAnalyzer::new(Arc::new(source), RiskConfig::default())
    }

    fn sample_source() -> InMemoryMarketData {
        InMemoryMarketData::new()
            .with_synthetic("AAPL", "tech", 180.0, 0.001, 0.015, 60)
            .with_synthetic("BND", "fixed_income", 72.0, 0.0002, 0.002, 60)
    }

    #[tokio::test]
    async fn test_two_holding_scenario() {
        let portfolio = Portfolio::new(
            vec![
                Holding::new("AAPL", dec!(6000), "equity", "tech"),
                Holding::new("BND", dec!(4000), "bond", "fixed_income"),
            ],
            RiskProfile::Moderate,
        );

        let report = analyzer(sample_source()).analyze_portfolio(&portfolio).await.unwrap();

        assert!(!report.empty);
        assert!((report.asset_allocation["equity"].fraction - 0.6).abs() < 1e-9);
        assert!((report.asset_allocation["bond"].fraction - 0.4).abs() < 1e-9);
        let sum: f64 = report.asset_allocation.values().map(|e| e.fraction).sum();
        assert!((sum - 1.0).abs() < 1e-6);

        let tech = report
            .recommendations
            .iter()
            .find(|r| r.kind == RecommendationKind::SectorConcentration && r.subject.as_deref() == Some("tech"))
            .expect("tech concentration recommendation");
        assert_eq!(tech.trim_amount, Some(dec!(3500)));

        assert!(report.has_recommendation(RecommendationKind::Diversification));
        assert!((report.diversification.score - (1.0 / 0.52 - 1.0) / 9.0 * 100.0).abs() < 1e-6);
        assert!(report.risk_metrics.volatility.is_some());
        assert!((report.risk_metrics.coverage - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_optimize_fetches_candidates() {
        let source = sample_source().with_synthetic("MSFT", "tech", 400.0, 0.002, 0.012, 60);
        let portfolio = Portfolio::new(
            vec![
                Holding::new("AAPL", dec!(6000), "equity", "tech"),
                Holding::new("BND", dec!(4000), "bond", "fixed_income"),
                Holding::new("GONE", dec!(0), "equity", "tech"),
            ],
            RiskProfile::Conservative,
        );
        let request = OptimizationRequest {
            objective: Objective::Income,
            candidates: vec!["msft".into(), "NOPE".into()],
        };

        let report = analyzer(source).optimize_portfolio(&portfolio, &request).await.unwrap();

        assert!(report.target_weights.contains_key("MSFT"));
        let skipped: Vec<&str> = report.skipped.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(skipped, vec!["GONE", "NOPE"]);
        let total: f64 = report.target_weights.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(report.expected.is_some());
    }

    #[test]
    fn test_single_holding_always_concentrated() {
        let portfolio = Portfolio::new(
            vec![Holding::new("SOLO", dec!(500), "equity", "tech")],
            RiskProfile::Aggressive,
        );
        for threshold in [0.05, 0.25, 0.5, 0.99] {
            let flags = concentration_flags(&portfolio, threshold);
            assert!(flags.iter().any(|f| f.scope == ConcentrationScope::Holding && f.name == "SOLO"));
        }

        let source = InMemoryMarketData::new();
        let report = analyzer(source).analyze(&portfolio, &BTreeMap::new()).unwrap();
        assert!(report.has_recommendation(RecommendationKind::Concentration));
        assert!(report.diversification.score.abs() < 1e-9);
        assert_eq!(report.risk_metrics.skipped[0].symbol, "SOLO");
    }

    #[test]
    fn test_zero_value_portfolio_is_empty_report() {
        let portfolio = Portfolio::new(
            vec![Holding::new("X", dec!(0), "equity", "tech")],
            RiskProfile::Moderate,
        );
        let report = analyzer(InMemoryMarketData::new())
            .analyze(&portfolio, &BTreeMap::new())
            .unwrap();

        assert!(report.empty);
        assert!(report.asset_allocation.is_empty());
        assert!(report.risk_metrics.volatility.is_none());
        assert!(report.recommendations.is_empty());
        assert!(report.diversification.score.abs() < f64::EPSILON);
    }

    #[test]
    fn test_negative_value_is_invalid() {
        let portfolio = Portfolio::new(
            vec![Holding::new("X", dec!(-5), "equity", "tech")],
            RiskProfile::Moderate,
        );
        let result = analyzer(InMemoryMarketData::new()).analyze(&portfolio, &BTreeMap::new());
        assert!(matches!(result, Err(crate::error::EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_even_ten_sector_portfolio_scores_full() {
        let holdings = (0..10)
            .map(|i| Holding::new(format!("S{i}"), dec!(100), "equity", format!("sector{i}")))
            .collect();
        let portfolio = Portfolio::new(holdings, RiskProfile::Moderate);

        let d = diversification(&portfolio, &RiskConfig::default());
        assert!((d.score - 100.0).abs() < 1e-9);
        assert_eq!(d.sector_count, 10);
        assert!((d.top5_concentration.unwrap() - 0.5).abs() < 1e-9);
        assert!((d.herfindahl_index - 1000.0).abs() < 1e-6);
        assert!(concentration_flags(&portfolio, 0.25).is_empty());
    }

    #[test]
    fn test_duplicate_symbols_aggregate() {
        let portfolio = Portfolio::new(
            vec![
                Holding::new("AAA", dec!(200), "equity", "tech"),
                Holding::new("aaa", dec!(200), "equity", "tech"),
                Holding::new("BBB", dec!(600), "bond", "govt"),
            ],
            RiskProfile::Moderate,
        );
        let flags = concentration_flags(&portfolio, 0.35);
        let names: Vec<&str> = flags.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["AAA", "BBB", "govt", "tech"]);
        assert_eq!(flags[0].trim_amount, dec!(50));
    }
}
