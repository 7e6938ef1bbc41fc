//! # portfolio-engine
//!
//! Portfolio analytics and strategy engine: scan a market for volatility
//! opportunities, measure a portfolio's risk, derive a target allocation
//! and gate the resulting trades behind an approval state machine.
//!
//! ## Components
//!
//! ```text
//! ┌───────────────────┐  PriceSeries  ┌───────────────────┐
//! │ MarketDataSource  │──────────────▶│ VolatilityScanner │──▶ ScanReport
//! │ (async, Arc<dyn>) │──────────────▶│   RiskAnalyzer    │──▶ RiskReport
//! └───────────────────┘               └───────────────────┘
//!
//!   InvestorProfile ──▶ StrategyGenerator ──▶ StrategyReport + TransitionPlan
//!                                                   │
//!   TradeProposal[] ──▶ ExecutionEngine ◀───────────┘ (rebalance)
//!                            │
//!                            ▼
//!   drafted ─▶ pending_approval ─▶ approved ─▶ executed | failed
//!                            └──▶ rejected
//! ```
//!
//! Each component is exposed as a `tool_core::Tool` (see [`tools`]) so a
//! router can drive it with a tool name and a JSON object.
//!
//! ## Numbers
//!
//! Money and quantities are `rust_decimal::Decimal`; returns, volatility
//! and allocation fractions are `f64`. Percent-valued statistics are on a
//! 0-100 scale, fractions on 0-1.

pub mod config;
pub mod error;
pub mod execution;
pub mod market;
pub mod model;
pub mod risk;
pub mod scanner;
pub mod strategy;
pub mod svckit;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use execution::{ActionOutcome, ActionRequest, ExecutionEngine, ExecutionMode, ExecutionState, MemoryPendingStore};
pub use market::{InMemoryMarketData, MarketDataSource};
pub use model::{AssetAllocation, Holding, InvestorProfile, Portfolio, PriceSeries, RiskProfile, TradeProposal};
pub use risk::{RiskAnalyzer, RiskReport};
pub use scanner::{ScanReport, ScanRequest, VolatilityScanner};
pub use strategy::{StrategyGenerator, StrategyReport, TransitionPlan};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{
        AnalyzePortfolioTool,
        ExecuteActionTool,
        GenerateStrategyTool,
        ScanMarketTool,
    };
}
