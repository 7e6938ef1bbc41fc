//! portfolio-demo
//!
//! Registers the engine tools against a deterministic in-memory market and
//! drives one full cycle through the registry with JSON arguments:
//! scan → analyze → generate → execute → approve.

use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portfolio_engine::execution::ActionOutcome;
use portfolio_engine::tools::{AnalyzePortfolioTool, ExecuteActionTool, GenerateStrategyTool, ScanMarketTool};
use portfolio_engine::{EngineConfig, ExecutionEngine, InMemoryMarketData, MarketDataSource, MemoryPendingStore, StrategyGenerator};
use tool_core::{ToolCall, ToolRegistry, ToolResult};

fn demo_market() -> InMemoryMarketData {
    InMemoryMarketData::new()
        .with_synthetic("NVDA", "technology", 480.0, 0.006, 0.03, 60)
        .with_synthetic("AAPL", "technology", 190.0, 0.002, 0.012, 60)
        .with_synthetic("XOM", "energy", 105.0, -0.004, 0.018, 60)
        .with_synthetic("JNJ", "healthcare", 155.0, 0.0005, 0.006, 60)
        .with_synthetic("BND", "fixed_income", 72.0, 0.0001, 0.002, 60)
}

async fn run(tools: &ToolRegistry, name: &str, args: serde_json::Value) -> anyhow::Result<ToolResult> {
    let result = tools
        .execute(&ToolCall::from_json(name, args).with_id(format!("demo-{name}")))
        .await
        .with_context(|| format!("{name} failed"))?;

    tracing::info!(tool = name, success = result.success, "\n{}", result.output);
    Ok(result)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,portfolio_engine=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env();
    config.validate().context("invalid engine configuration")?;

    let source: Arc<dyn MarketDataSource> = Arc::new(demo_market());
    if !source.health_check().await {
        tracing::warn!(source = source.name(), "market data source unhealthy");
    }

    let mut tools = ToolRegistry::new();
    tools.register(ScanMarketTool::new(Arc::clone(&source), config.scanner.clone()));
    tools.register(AnalyzePortfolioTool::new(Arc::clone(&source), config.risk.clone()));
    tools.register(GenerateStrategyTool::new(StrategyGenerator::new(config.strategy.clone())));
    tools.register(ExecuteActionTool::new(
        ExecutionEngine::new(Arc::new(MemoryPendingStore::new()), config.execution.clone())
            .with_generator(StrategyGenerator::new(config.strategy.clone())),
    ));

    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let profile = json!({
        "risk_tolerance": "moderate",
        "investment_horizon": "long",
        "goals": [{ "goal_type": "retirement", "target_amount": "600000", "time_horizon_years": 25 }]
    });

    run(
        &tools,
        "scan_market",
        json!({
            "universe": ["NVDA", "AAPL", "XOM", "JNJ", "BND", "MISSING"],
            "investor_profile": profile,
        }),
    )
    .await?;

    run(
        &tools,
        "analyze_portfolio",
        json!({
            "holdings": [
                { "symbol": "NVDA", "value": "42000", "asset_class": "equity", "sector": "technology" },
                { "symbol": "AAPL", "value": "28000", "asset_class": "equity", "sector": "technology" },
                { "symbol": "XOM", "value": "10000", "asset_class": "equity", "sector": "energy" },
                { "symbol": "BND", "value": "20000", "asset_class": "bond", "sector": "fixed_income" }
            ],
            "risk_profile": "moderate"
        }),
    )
    .await?;

    run(
        &tools,
        "generate_strategy",
        json!({
            "investor_profile": profile,
            "current_portfolio": { "equity": 0.8, "fixed_income": 0.2 }
        }),
    )
    .await?;

    let submitted = run(
        &tools,
        "execute_action",
        json!({
            "action_type": "rebalance_portfolio",
            "investor_id": "demo-investor",
            "execution_mode": "approval_required",
            "rebalance_request": {
                "profile": profile,
                "current_allocation": { "equity": 0.8, "fixed_income": 0.2 },
                "portfolio_value": "100000",
                "instruments": {
                    "equity": { "symbol": "VTI", "price": "265.40" },
                    "fixed_income": { "symbol": "BND", "price": "72.10" },
                    "alternatives": { "symbol": "VNQ", "price": "88.25" }
                }
            }
        }),
    )
    .await?;

    let outcome: ActionOutcome = submitted.data_as()?;
    let pending_id = outcome
        .report()
        .map(|r| r.pending.pending_id.to_string())
        .context("rebalance did not create a pending execution")?;

    run(
        &tools,
        "execute_action",
        json!({ "action_type": "approve_trades", "investor_id": "demo-investor", "pending_id": pending_id }),
    )
    .await?;

    run(&tools, "execute_action", json!({ "action_type": "list_pending", "include_closed": true })).await?;

    Ok(())
}
