//! Service Kit - Engine Tools
//!
//! The four engine operations as `tool_core::Tool` implementations: JSON
//! arguments in, a text summary plus the structured report out.

mod scan_market;
mod analyze_portfolio;
mod generate_strategy;
mod execute_action;

pub use scan_market::ScanMarketTool;
pub use analyze_portfolio::AnalyzePortfolioTool;
pub use generate_strategy::GenerateStrategyTool;
pub use execute_action::ExecuteActionTool;
