//! Portfolio Return Statistics
//!
//! Value-weighted covariance volatility, drawdown and Sharpe ratio over the
//! common trailing window of the covered holdings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::market::SkippedSymbol;
use crate::model::PriceSeries;

/// Return-based metrics. Percent values; `None` when no history was usable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Annualized portfolio volatility
    pub volatility: Option<f64>,

    /// Annualized mean daily portfolio return
    pub annualized_return: Option<f64>,

    /// Largest peak-to-trough decline, as a positive magnitude
    pub max_drawdown: Option<f64>,

    pub sharpe_ratio: Option<f64>,

    /// Daily returns in the common window
    pub observations: usize,

    /// Fraction of portfolio value with usable history
    pub coverage: f64,

    pub skipped: Vec<SkippedSymbol>,
}

/// Per-symbol simple daily returns, aligned on a common trailing window
pub(crate) struct ReturnPanel {
    symbols: Vec<String>,
    weights: Vec<f64>,
    returns: Vec<Vec<f64>>,
}

impl ReturnPanel {
    /// `None` when there are no entries or the shortest series has under two bars
    pub(crate) fn aligned<'a>(entries: impl IntoIterator<Item = (String, f64, &'a PriceSeries)>) -> Option<Self> {
        let entries: Vec<(String, f64, &PriceSeries)> = entries.into_iter().collect();
        let window = entries.iter().map(|(_, _, series)| series.len()).min()?;
        if window < 2 {
            return None;
        }

        Some(Self {
            symbols: entries.iter().map(|(symbol, _, _)| symbol.clone()).collect(),
            weights: entries.iter().map(|(_, weight, _)| *weight).collect(),
            returns: entries
                .iter()
                .map(|(_, _, series)| {
                    series
                        .tail(window)
                        .windows(2)
                        .map(|w| w[1].close / w[0].close - 1.0)
                        .collect()
                })
                .collect(),
        })
    }

    pub(crate) fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub(crate) fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub(crate) fn reweighted(mut self, weights: Vec<f64>) -> Self {
        self.weights = weights;
        self
    }

    pub(crate) fn observations(&self) -> usize {
        self.returns.first().map_or(0, Vec::len)
    }

    /// Mean daily return per symbol
    pub(crate) fn mean_returns(&self) -> Vec<f64> {
        self.returns.iter().map(|r| mean(r)).collect()
    }

    /// Weighted portfolio return per day
    fn portfolio_returns(&self) -> Vec<f64> {
        (0..self.observations())
            .map(|t| {
                self.weights
                    .iter()
                    .zip(&self.returns)
                    .map(|(w, r)| w * r[t])
                    .sum()
            })
            .collect()
    }

    /// Sample covariance matrix of the symbols' returns
    pub(crate) fn covariance(&self) -> Vec<Vec<f64>> {
        let n = self.observations();
        let k = self.symbols.len();
        if n < 2 {
            return vec![vec![0.0; k]; k];
        }

        #[allow(clippy::cast_precision_loss)]
        let denom = (n - 1) as f64;
        let means = self.mean_returns();

        let mut matrix = vec![vec![0.0; k]; k];
        for i in 0..k {
            for j in i..k {
                let cov = (0..n)
                    .map(|t| (self.returns[i][t] - means[i]) * (self.returns[j][t] - means[j]))
                    .sum::<f64>()
                    / denom;
                matrix[i][j] = cov;
                matrix[j][i] = cov;
            }
        }
        matrix
    }

    /// wᵀ Σ w
    pub(crate) fn weighted_variance(&self) -> f64 {
        let cov = self.covariance();
        let mut variance = 0.0;
        for (i, wi) in self.weights.iter().enumerate() {
            for (j, wj) in self.weights.iter().enumerate() {
                variance += wi * wj * cov[i][j];
            }
        }
        variance.max(0.0)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    values.iter().sum::<f64>() / n
}

pub(crate) fn usable(series: &PriceSeries) -> Result<(), String> {
    if series.len() < 2 {
        return Err(format!("insufficient price history: {} bar(s)", series.len()));
    }
    if series.bars().iter().any(|b| !b.close.is_finite() || b.close <= 0.0) {
        return Err("non-positive close in history".into());
    }
    Ok(())
}

/// Compute metrics for holdings given as `symbol → value fraction`.
///
/// Symbols in `already_skipped` are treated as uncovered without adding a
/// second skip entry.
pub fn compute(
    weights: &BTreeMap<String, f64>,
    history: &BTreeMap<String, PriceSeries>,
    already_skipped: Vec<SkippedSymbol>,
    trading_days: f64,
    risk_free_rate: f64,
) -> RiskMetrics {
    let mut skipped = already_skipped;
    let mut covered: Vec<(&String, f64, &PriceSeries)> = Vec::new();

    for (symbol, &weight) in weights {
        if weight <= 0.0 || skipped.iter().any(|s| &s.symbol == symbol) {
            continue;
        }
        match history.get(symbol) {
            None => skipped.push(SkippedSymbol::new(symbol, "no price history")),
            Some(series) => match usable(series) {
                Ok(()) => covered.push((symbol, weight, series)),
                Err(reason) => skipped.push(SkippedSymbol::new(symbol, reason)),
            },
        }
    }
    skipped.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    for entry in &skipped {
        tracing::warn!(symbol = %entry.symbol, reason = %entry.reason, "holding excluded from risk metrics");
    }

    let coverage: f64 = covered.iter().map(|(_, w, _)| w).sum();
    let panel = ReturnPanel::aligned(
        covered
            .iter()
            .map(|(symbol, weight, series)| ((*symbol).clone(), weight / coverage, *series)),
    );

    let Some(panel) = panel else {
        return RiskMetrics {
            coverage,
            skipped,
            ..RiskMetrics::default()
        };
    };

    let portfolio_returns = panel.portfolio_returns();
    let volatility = panel.weighted_variance().sqrt() * trading_days.sqrt() * 100.0;
    let annualized_return = mean(&portfolio_returns) * trading_days * 100.0;
    let sharpe_ratio = sharpe(annualized_return, volatility, risk_free_rate);

    RiskMetrics {
        volatility: Some(volatility),
        annualized_return: Some(annualized_return),
        max_drawdown: Some(max_drawdown(&portfolio_returns)),
        sharpe_ratio,
        observations: panel.observations(),
        coverage,
        skipped,
    }
}

/// (return − rf) / volatility on fractional values; undefined at zero volatility
pub fn sharpe(annualized_return_pct: f64, volatility_pct: f64, risk_free_rate: f64) -> Option<f64> {
    if volatility_pct <= f64::EPSILON {
        return None;
    }
    Some((annualized_return_pct / 100.0 - risk_free_rate) / (volatility_pct / 100.0))
}

/// Largest peak-to-trough decline of the compounded value path, in percent
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut value = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut worst = 0.0_f64;

    for r in returns {
        value *= 1.0 + r;
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.max((peak - value) / peak);
        }
    }
    worst * 100.0
}
