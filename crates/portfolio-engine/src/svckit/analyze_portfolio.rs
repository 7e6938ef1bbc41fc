//! Analyze Portfolio Tool
//!
//! Allocation, risk metrics, diversification and recommendations for a set
//! of holdings.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tool_core::{ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema};

use crate::config::RiskConfig;
use crate::market::MarketDataSource;
use crate::model::{Holding, Portfolio, RiskProfile};
use crate::risk::{OptimizationReport, OptimizationRequest, RiskAnalyzer, RiskReport};

#[derive(Debug, Deserialize)]
struct AnalyzeArgs {
    holdings: Vec<Holding>,

    #[serde(default)]
    risk_profile: Option<RiskProfile>,

    /// When present, target weights and per-symbol trades are added
    #[serde(default)]
    optimize: Option<OptimizationRequest>,
}

#[derive(Debug, Serialize)]
struct AnalyzeData<'a> {
    #[serde(flatten)]
    report: &'a RiskReport,

    #[serde(skip_serializing_if = "Option::is_none")]
    optimization: Option<OptimizationReport>,
}

/// Tool for analyzing portfolio risk
pub struct AnalyzePortfolioTool {
    analyzer: RiskAnalyzer,
}

impl AnalyzePortfolioTool {
    pub fn new(source: Arc<dyn MarketDataSource>, config: RiskConfig) -> Self {
        Self {
            analyzer: RiskAnalyzer::new(source, config),
        }
    }
}

#[async_trait]
impl Tool for AnalyzePortfolioTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "analyze_portfolio".into(),
            description: "Analyze a portfolio: allocation by asset class and sector, volatility, drawdown, Sharpe ratio, diversification, concentration and prioritized recommendations.".into(),
            parameters: vec![
                ParameterSchema::required("holdings", "array", "Holdings as {symbol, value, asset_class, sector, quantity?}"),
                ParameterSchema::optional("risk_profile", "string", "Risk profile to measure against")
                    .with_default(serde_json::json!("moderate"))
                    .with_enum(&["conservative", "moderate", "aggressive"]),
                ParameterSchema::optional(
                    "optimize",
                    "object",
                    "Re-weight the holdings as {objective: income|balanced|growth, candidates?: [symbols]}",
                ),
            ],
            category: Some("analysis".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let args: AnalyzeArgs = call.parse_arguments()?;
        let portfolio = Portfolio::new(args.holdings, args.risk_profile.unwrap_or_default());
        let report = self.analyzer.analyze_portfolio(&portfolio).await?;

        let mut output = String::from("Portfolio Risk Report\n");
        output.push_str(&"═".repeat(50));
        output.push('\n');

        if report.empty {
            output.push_str("Portfolio has no value; nothing to analyze.\n");
            return Ok(ToolResult::success("analyze_portfolio", output.trim_end())
                .with_data(serde_json::to_value(&report)?));
        }

        let optimization = match &args.optimize {
            Some(request) => Some(self.analyzer.optimize_portfolio(&portfolio, request).await?),
            None => None,
        };

        output.push_str(&format!(
            "Total value: ${:.2} ({} profile)\n\nAsset classes:\n",
            report.total_value, report.risk_profile
        ));
        for (class, entry) in &report.asset_allocation {
            output.push_str(&format!("  {:<14} {:>6.1}%\n", class, entry.fraction * 100.0));
        }

        let metrics = &report.risk_metrics;
        output.push_str("\nRisk:\n");
        match metrics.volatility {
            Some(vol) => output.push_str(&format!("  Volatility:   {vol:.1}%\n")),
            None => output.push_str("  Volatility:   n/a (no usable history)\n"),
        }
        if let Some(dd) = metrics.max_drawdown {
            output.push_str(&format!("  Max drawdown: -{dd:.1}%\n"));
        }
        if let Some(sharpe) = metrics.sharpe_ratio {
            output.push_str(&format!("  Sharpe:       {sharpe:.2}\n"));
        }
        output.push_str(&format!(
            "  Diversification score: {:.0}/100\n",
            report.diversification.score
        ));

        if !report.recommendations.is_empty() {
            output.push_str("\nRecommendations:\n");
            for rec in &report.recommendations {
                output.push_str(&format!("  [{:?}] {}\n", rec.priority, rec.description));
            }
        }

        if let Some(optimization) = &optimization {
            output.push_str(&format!(
                "\nOptimized weights ({:?} objective, {:?} weighting):\n",
                optimization.objective, optimization.method
            ));
            for (symbol, weight) in &optimization.target_weights {
                output.push_str(&format!("  {:<6} {:>6.1}%\n", symbol, weight * 100.0));
            }
            for action in &optimization.rebalancing_plan {
                output.push_str(&format!(
                    "  {:?} {} ({:+.1} pts, ${})\n",
                    action.action,
                    action.symbol,
                    action.weight_difference * 100.0,
                    action.value_difference
                ));
            }
            if let Some(expected) = &optimization.expected {
                output.push_str(&format!(
                    "  Expected return {:.1}%, volatility {:.1}%\n",
                    expected.expected_return, expected.expected_volatility
                ));
            }
        }

        let data = serde_json::to_value(AnalyzeData {
            report: &report,
            optimization,
        })?;
        Ok(ToolResult::success("analyze_portfolio", output.trim_end()).with_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::InMemoryMarketData;
    use crate::risk::RebalanceActionKind;

    fn tool() -> AnalyzePortfolioTool {
        AnalyzePortfolioTool::new(Arc::new(InMemoryMarketData::new()), RiskConfig::default())
    }

    #[tokio::test]
    async fn test_defaults_to_moderate() {
        let call = ToolCall::from_json(
            "analyze_portfolio",
            serde_json::json!({
                "holdings": [{ "symbol": "aapl", "value": "1000", "asset_class": "equity", "sector": "technology" }]
            }),
        );
        let result = tool().execute(&call).await.unwrap();
        let report: RiskReport = result.data_as().unwrap();
        assert_eq!(report.risk_profile, RiskProfile::Moderate);
        assert_eq!(report.risk_metrics.skipped.len(), 1);
    }

    #[tokio::test]
    async fn test_optimize_adds_target_weights() {
        let source = InMemoryMarketData::new()
            .with_synthetic("GROW", "tech", 100.0, 0.004, 0.01, 40)
            .with_synthetic("SINK", "energy", 100.0, -0.004, 0.01, 40);
        let tool = AnalyzePortfolioTool::new(Arc::new(source), RiskConfig::default());
        let call = ToolCall::from_json(
            "analyze_portfolio",
            serde_json::json!({
                "holdings": [
                    { "symbol": "GROW", "value": "5000", "asset_class": "equity", "sector": "tech" },
                    { "symbol": "SINK", "value": "5000", "asset_class": "equity", "sector": "energy" }
                ],
                "risk_profile": "aggressive",
                "optimize": { "objective": "growth" }
            }),
        );
        let result = tool.execute(&call).await.unwrap();
        assert!(result.output.contains("Optimized weights"));

        let data = result.data.unwrap();
        let report: RiskReport = serde_json::from_value(data.clone()).unwrap();
        assert_eq!(report.risk_profile, RiskProfile::Aggressive);

        let optimization: OptimizationReport = serde_json::from_value(data["optimization"].clone()).unwrap();
        assert_eq!(optimization.rebalancing_plan[1].action, RebalanceActionKind::SellAll);
    }

    #[tokio::test]
    async fn test_negative_value_is_validation_error() {
        let call = ToolCall::from_json(
            "analyze_portfolio",
            serde_json::json!({
                "holdings": [{ "symbol": "X", "value": "-5", "asset_class": "equity" }]
            }),
        );
        let err = tool().execute(&call).await.unwrap_err();
        assert!(matches!(err, tool_core::ToolError::ToolValidation(_)));
    }
}
