//! Market Data
//!
//! The `MarketDataSource` seam plus the bounded, concurrent fetch used by
//! both the scanner and the risk analyzer.

mod memory;

pub use memory::InMemoryMarketData;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::model::PriceSeries;

/// Price history plus sector membership for one symbol
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolHistory {
    pub symbol: String,
    pub sector: String,
    pub series: PriceSeries,
}

/// Market data source trait
///
/// Implement this for each data vendor. Implementations must be safe to
/// call concurrently; callers bound every call with a timeout.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Most recent `days` daily bars for a symbol, oldest first
    async fn history(&self, symbol: &str, days: usize) -> Result<SymbolHistory>;
    
    /// Check if the source is reachable
    async fn health_check(&self) -> bool {
        true
    }
    
    /// Source name
    fn name(&self) -> &str;
}

/// A symbol left out of a result, with the reason
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: String,
}

impl SkippedSymbol {
    pub fn new(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }
}

impl From<EngineError> for SkippedSymbol {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::DataUnavailable { symbol, reason } => Self { symbol, reason },
            other => Self::new("", other.to_string()),
        }
    }
}

/// Outcome of a bulk fetch; both halves are keyed/sorted by symbol
#[derive(Debug, Default)]
pub struct HistoryBatch {
    pub histories: BTreeMap<String, SymbolHistory>,
    pub skipped: Vec<SkippedSymbol>,
}

/// Fetch histories for `symbols` with at most `concurrency` requests in
/// flight, each bounded by `timeout`.
///
/// Duplicates are fetched once. Failures and timeouts become skip entries;
/// this never fails as a whole.
pub async fn fetch_histories(
    source: Arc<dyn MarketDataSource>,
    symbols: &[String],
    days: usize,
    timeout: Duration,
    concurrency: usize,
) -> HistoryBatch {
    let unique: BTreeSet<String> = symbols
        .iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    
    let outcomes: Vec<(String, std::result::Result<SymbolHistory, String>)> = stream::iter(unique)
        .map(|symbol| {
            let source = Arc::clone(&source);
            async move {
                let outcome = match tokio::time::timeout(timeout, source.history(&symbol, days)).await {
                    Ok(Ok(history)) => Ok(history),
                    Ok(Err(EngineError::DataUnavailable { reason, .. })) => Err(reason),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!("fetch timed out after {}ms", timeout.as_millis())),
                };
                (symbol, outcome)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
    
    let mut batch = HistoryBatch::default();
    for (symbol, outcome) in outcomes {
        match outcome {
            Ok(history) => {
                batch.histories.insert(symbol, history);
            }
            Err(reason) => {
                tracing::warn!(symbol = %symbol, source = source.name(), %reason, "market data unavailable");
                batch.skipped.push(SkippedSymbol::new(symbol, reason));
            }
        }
    }
    batch.skipped.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_histories_skips_missing_and_dedupes() {
        let source = InMemoryMarketData::new()
            .with_synthetic("AAA", "tech", 100.0, 0.01, 0.02, 30);
        let source: Arc<dyn MarketDataSource> = Arc::new(source);
        
        let symbols = vec!["aaa".to_string(), "AAA".to_string(), "ZZZ".to_string()];
        let batch = fetch_histories(source, &symbols, 10, Duration::from_secs(1), 4).await;
        
        assert_eq!(batch.histories.len(), 1);
        assert_eq!(batch.histories["AAA"].series.len(), 10);
        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(batch.skipped[0].symbol, "ZZZ");
    }
    
    #[tokio::test]
    async fn test_fetch_histories_times_out_slow_source() {
        let source = InMemoryMarketData::new()
            .with_synthetic("SLOW", "tech", 50.0, 0.0, 0.01, 20)
            .with_latency(Duration::from_millis(200));
        let source: Arc<dyn MarketDataSource> = Arc::new(source);
        
        let batch = fetch_histories(
            source,
            &["SLOW".to_string()],
            10,
            Duration::from_millis(10),
            1,
        )
        .await;
        
        assert!(batch.histories.is_empty());
        assert!(batch.skipped[0].reason.contains("timed out"));
    }
}
