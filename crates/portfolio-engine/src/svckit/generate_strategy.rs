//! Generate Strategy Tool
//!
//! Target allocation for an investor profile, with an optional transition
//! plan from what they hold today.

use async_trait::async_trait;
use serde::Deserialize;

use tool_core::{ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema};

use crate::model::InvestorProfile;
use crate::strategy::{CurrentPortfolio, StrategyGenerator};

#[derive(Debug, Deserialize)]
struct GenerateArgs {
    investor_profile: InvestorProfile,

    #[serde(default)]
    current_portfolio: Option<CurrentPortfolio>,
}

/// Tool for generating allocation strategies
pub struct GenerateStrategyTool {
    generator: StrategyGenerator,
}

impl GenerateStrategyTool {
    pub const fn new(generator: StrategyGenerator) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Tool for GenerateStrategyTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "generate_strategy".into(),
            description: "Generate a target allocation from risk tolerance, horizon and goals, with goal approaches, volatility stance, rebalancing cadence and an optional transition plan.".into(),
            parameters: vec![
                ParameterSchema::required("investor_profile", "object", "{risk_tolerance, investment_horizon, goals: [{goal_type, target_amount, time_horizon_years}]}"),
                ParameterSchema::optional("current_portfolio", "object", "Current allocation as {asset_class: fraction}, or {holdings: [...]}"),
            ],
            category: Some("planning".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let args: GenerateArgs = call.parse_arguments()?;
        let current = args
            .current_portfolio
            .as_ref()
            .map(CurrentPortfolio::allocation)
            .transpose()?;

        let report = self.generator.generate(&args.investor_profile, current.as_ref())?;

        let mut output = format!(
            "Strategy: {} / {} horizon\n",
            report.profile.risk_tolerance,
            report.profile.investment_horizon.as_str()
        );
        output.push_str(&"═".repeat(50));
        output.push_str("\nTarget allocation:\n");
        for (class, fraction) in report.target_allocation.iter() {
            output.push_str(&format!("  {:<14} {:>6.1}%\n", class, fraction * 100.0));
        }

        for tilt in &report.goal_adjustments {
            output.push_str(&format!("  goal {:?}: +{:.1}% tilt\n", tilt.goal_type, tilt.tilt * 100.0));
        }

        output.push_str(&format!(
            "\nVolatility: {}\nRebalance: {:?}\n",
            report.volatility_approach.description, report.rebalancing_frequency
        ));

        if let Some(plan) = &report.transition_plan {
            output.push_str(&format!("\nTransition ({}):\n", plan.timeline));
            for step in plan.significant_steps() {
                output.push_str(&format!(
                    "  {:?} {:<14} {:+.1}%\n",
                    step.action,
                    step.asset_class,
                    step.delta * 100.0
                ));
            }
        }

        Ok(ToolResult::success("generate_strategy", output.trim_end())
            .with_data(serde_json::to_value(&report)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InvestmentHorizon, RiskProfile};
    use crate::strategy::StrategyReport;
    use crate::strategy::tables::base_allocation;

    #[tokio::test]
    async fn test_no_goals_returns_base_table() {
        let tool = GenerateStrategyTool::new(StrategyGenerator::default());
        let call = ToolCall::from_json(
            "generate_strategy",
            serde_json::json!({
                "investor_profile": { "risk_tolerance": "conservative", "investment_horizon": "short", "goals": [] }
            }),
        );
        let report: StrategyReport = tool.execute(&call).await.unwrap().data_as().unwrap();
        assert_eq!(
            report.target_allocation,
            base_allocation(RiskProfile::Conservative, InvestmentHorizon::Short)
        );
        assert!(report.transition_plan.is_none());
    }

    #[tokio::test]
    async fn test_current_holdings_produce_transition() {
        let tool = GenerateStrategyTool::new(StrategyGenerator::default());
        let call = ToolCall::from_json(
            "generate_strategy",
            serde_json::json!({
                "investor_profile": { "risk_tolerance": "moderate", "investment_horizon": "medium" },
                "current_portfolio": { "holdings": [
                    { "symbol": "VTI", "value": "9000", "asset_class": "stocks" },
                    { "symbol": "BND", "value": "1000", "asset_class": "bonds" }
                ]}
            }),
        );
        let report: StrategyReport = tool.execute(&call).await.unwrap().data_as().unwrap();
        let plan = report.transition_plan.unwrap();
        assert_eq!(plan.steps[0].asset_class, "equity");
        assert!(plan.steps[0].delta < 0.0);
    }
}
