//! Scan Market Tool
//!
//! Ranks a universe of symbols by volatility and momentum.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tool_core::{ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema};

use crate::config::ScannerConfig;
use crate::market::MarketDataSource;
use crate::model::InvestorProfile;
use crate::scanner::{ScanReport, ScanRequest, VolatilityScanner};
use crate::strategy::{SymbolStrategy, recommend_for_symbol};

#[derive(Debug, Deserialize)]
struct ScanArgs {
    #[serde(flatten)]
    request: ScanRequest,

    /// When present, each opportunity also gets profile-fitted strategies
    #[serde(default)]
    investor_profile: Option<InvestorProfile>,
}

#[derive(Debug, Serialize)]
struct ScanData<'a> {
    #[serde(flatten)]
    report: &'a ScanReport,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    profile_strategies: BTreeMap<String, Vec<SymbolStrategy>>,
}

/// Tool for scanning the market for volatility opportunities
pub struct ScanMarketTool {
    scanner: VolatilityScanner,
}

impl ScanMarketTool {
    pub fn new(source: Arc<dyn MarketDataSource>, config: ScannerConfig) -> Self {
        Self {
            scanner: VolatilityScanner::new(source, config),
        }
    }
}

#[async_trait]
impl Tool for ScanMarketTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "scan_market".into(),
            description: "Scan symbols for volatility and momentum. Returns ranked opportunities with suggested strategies, skipped symbols and a sector summary.".into(),
            parameters: vec![
                ParameterSchema::required("universe", "array", "Symbols to scan (e.g. [\"AAPL\", \"MSFT\"])"),
                ParameterSchema::optional("lookback_window", "number", "Number of daily returns to measure over")
                    .with_default(serde_json::json!(self.scanner.config().default_lookback)),
                ParameterSchema::optional("min_volatility", "number", "Minimum annualized volatility, in percent"),
                ParameterSchema::optional("momentum_direction", "string", "Keep only symbols moving this way")
                    .with_enum(&["positive", "negative"]),
                ParameterSchema::optional("limit", "number", "Maximum number of opportunities"),
                ParameterSchema::optional("investor_profile", "object", "Risk tolerance and horizon used to fit per-symbol strategies"),
            ],
            category: Some("market_data".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let args: ScanArgs = call.parse_arguments()?;
        let report = self.scanner.scan(&args.request).await?;

        let profile_strategies: BTreeMap<String, Vec<SymbolStrategy>> = args
            .investor_profile
            .as_ref()
            .map(|profile| {
                report
                    .opportunities
                    .iter()
                    .map(|o| {
                        let strategies = recommend_for_symbol(
                            &o.snapshot,
                            profile.risk_tolerance,
                            profile.investment_horizon,
                        );
                        (o.snapshot.symbol.clone(), strategies)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut output = format!(
            "Market Scan ({}-day window)\n",
            report.lookback_window
        );
        output.push_str(&"═".repeat(50));
        output.push('\n');

        if report.opportunities.is_empty() {
            output.push_str("No symbols matched the filters.\n");
        }
        for (rank, o) in report.opportunities.iter().enumerate() {
            let s = &o.snapshot;
            output.push_str(&format!(
                "{:>2}. {:<6} vol {:>6.1}%  mom {:+6.1}%  vol ratio {:.2}  {} ({})\n",
                rank + 1,
                s.symbol,
                s.volatility,
                s.momentum,
                s.volume_ratio,
                s.signal.as_str(),
                s.sector
            ));
        }

        if !report.skipped.is_empty() {
            output.push_str("\nSkipped:\n");
            for skipped in &report.skipped {
                output.push_str(&format!("  {}: {}\n", skipped.symbol, skipped.reason));
            }
        }

        for insight in &report.sectors.insights {
            output.push_str(&format!("\n• {}", insight.description));
        }

        let data = serde_json::to_value(ScanData {
            report: &report,
            profile_strategies,
        })?;

        Ok(ToolResult::success("scan_market", output.trim_end()).with_data(data))
    }
}
