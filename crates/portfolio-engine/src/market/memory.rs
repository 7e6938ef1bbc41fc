//! In-Memory Market Data
//!
//! Deterministic source for tests and demos: preloaded series plus a
//! synthetic generator. No randomness, so repeated runs agree.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use super::{MarketDataSource, SymbolHistory};
use crate::error::{EngineError, Result};
use crate::model::{PriceBar, PriceSeries};

/// Market data source backed by a map
#[derive(Default)]
pub struct InMemoryMarketData {
    histories: HashMap<String, SymbolHistory>,
    
    /// Artificial delay per call (for exercising timeouts)
    latency: Option<Duration>,
}

impl InMemoryMarketData {
    pub fn new() -> Self {
        Self::default()
    }
    
    pub fn with_history(mut self, sector: impl Into<String>, series: PriceSeries) -> Self {
        self.insert(sector, series);
        self
    }
    
    pub fn insert(&mut self, sector: impl Into<String>, series: PriceSeries) {
        let history = SymbolHistory {
            symbol: series.symbol.clone(),
            sector: sector.into(),
            series,
        };
        self.histories.insert(history.symbol.clone(), history);
    }
    
    /// Series from closes with constant volume, one bar per day
    pub fn with_closes(self, symbol: &str, sector: &str, closes: &[f64]) -> Self {
        let volumes = vec![1_000_000.0; closes.len()];
        self.with_bars(symbol, sector, closes, &volumes)
    }
    
    pub fn with_bars(self, symbol: &str, sector: &str, closes: &[f64], volumes: &[f64]) -> Self {
        let bars = closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(day, (&close, &volume))| PriceBar::flat(day_timestamp(day), close, volume))
            .collect();
        self.with_history(sector, PriceSeries::new(symbol, bars))
    }
    
    /// Deterministic zig-zag around a drifting trend.
    ///
    /// `drift` is the per-day growth rate, `swing` the alternating
    /// day-to-day deviation as a fraction of price.
    pub fn with_synthetic(
        self,
        symbol: &str,
        sector: &str,
        start_price: f64,
        drift: f64,
        swing: f64,
        days: usize,
    ) -> Self {
        let closes: Vec<f64> = (0..days)
            .map(|day| {
                let trend = start_price * (1.0 + drift).powi(i32::try_from(day).unwrap_or(i32::MAX));
                let sign: f64 = if day % 2 == 0 { 1.0 } else { -1.0 };
                trend * sign.mul_add(swing, 1.0)
            })
            .collect();
        self.with_closes(symbol, sector, &closes)
    }
    
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
    
    pub fn get(&self, symbol: &str) -> Option<&SymbolHistory> {
        self.histories.get(&symbol.trim().to_uppercase())
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.histories.keys().cloned().collect();
        symbols.sort();
        symbols
    }
}

fn day_timestamp(day: usize) -> chrono::DateTime<Utc> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 21, 0, 0).single().unwrap_or_default();
    base + chrono::Duration::days(i64::try_from(day).unwrap_or(i64::MAX))
}

#[async_trait]
impl MarketDataSource for InMemoryMarketData {
    async fn history(&self, symbol: &str, days: usize) -> Result<SymbolHistory> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        
        let key = symbol.trim().to_uppercase();
        let stored = self.histories
            .get(&key)
            .ok_or_else(|| EngineError::unavailable(&key, "no price history"))?;
        
        Ok(SymbolHistory {
            symbol: stored.symbol.clone(),
            sector: stored.sector.clone(),
            series: PriceSeries::new(&stored.symbol, stored.series.tail(days).to_vec()),
        })
    }
    
    fn name(&self) -> &str {
        "InMemoryMarketData"
    }
}
