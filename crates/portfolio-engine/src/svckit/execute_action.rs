//! Execute Action Tool
//!
//! Submits, approves, rejects and lists trade batches.

use async_trait::async_trait;

use tool_core::{ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema};

use crate::execution::{ActionOutcome, ActionRequest, ExecutionEngine, TradeOutcome};

/// Tool for gated trade execution
pub struct ExecuteActionTool {
    engine: ExecutionEngine,
}

impl ExecuteActionTool {
    pub const fn new(engine: ExecutionEngine) -> Self {
        Self { engine }
    }

    pub const fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }
}

fn summarize(outcome: &ActionOutcome) -> String {
    match outcome {
        ActionOutcome::Completed(report) => {
            let pending = &report.pending;
            let mut output = format!(
                "Pending {} ({}): {}\n",
                pending.pending_id,
                pending.execution_mode.as_str(),
                pending.state
            );
            for status in &report.trades {
                let detail = status
                    .rejection
                    .as_ref()
                    .map(|r| format!(" - {r}"))
                    .unwrap_or_default();
                output.push_str(&format!(
                    "  {} {} {} [{:?}]{}\n",
                    status.side.as_str(),
                    status.quantity,
                    status.symbol,
                    status.outcome,
                    detail
                ));
            }
            for skipped in &report.skipped_classes {
                output.push_str(&format!("  skipped {}: {}\n", skipped.asset_class, skipped.reason));
            }
            if let Some(reason) = &pending.reason {
                output.push_str(&format!("Reason: {reason}\n"));
            }
            if !report.stored {
                output.push_str("Advisory only: nothing was stored or executed.\n");
            } else if report.count(TradeOutcome::Rejected) > 0 && report.pending.trades.is_empty() {
                output.push_str("No trade passed validation.\n");
            }
            output
        }
        ActionOutcome::StateConflict { pending_id, current_state, reason } => {
            format!("Pending {pending_id} unchanged: {reason} (state is {current_state})")
        }
        ActionOutcome::Pending { executions } => {
            let mut output = format!("{} pending execution(s)\n", executions.len());
            for p in executions {
                output.push_str(&format!(
                    "  {} {} {} trade(s), expires {}\n",
                    p.pending_id,
                    p.state,
                    p.trades.len(),
                    p.expires_at.format("%Y-%m-%d %H:%M UTC")
                ));
            }
            output
        }
    }
}

#[async_trait]
impl Tool for ExecuteActionTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "execute_action".into(),
            description: "Submit trades or a rebalance under an execution mode, approve or reject a pending batch, or list pending batches.".into(),
            parameters: vec![
                ParameterSchema::required("action_type", "string", "What to do")
                    .with_enum(&["execute_trades", "approve_trades", "reject_trades", "rebalance_portfolio", "list_pending"]),
                ParameterSchema::optional("investor_id", "string", "Owner of the trades; required for every action except list_pending"),
                ParameterSchema::optional("execution_mode", "string", "Automation level for submitted trades")
                    .with_default(serde_json::json!("approval_required"))
                    .with_enum(&["advisory_only", "approval_required", "fully_automated"]),
                ParameterSchema::optional("trades", "array", "Trades as {symbol, side, quantity, order_type?, limit_price?, reference_price?}"),
                ParameterSchema::optional("pending_id", "string", "Pending batch to approve or reject"),
                ParameterSchema::optional("reason", "string", "Why a batch is rejected"),
                ParameterSchema::optional("rebalance_request", "object", "{transition_plan | profile + current_allocation, portfolio_value, instruments}"),
            ],
            category: Some("execution".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let request: ActionRequest = call.parse_arguments()?;
        let outcome = self.engine.execute_action(request)?;

        let output = summarize(&outcome);
        let data = serde_json::to_value(&outcome)?;

        // A state conflict is a reported no-op, not a failed call
        let result = match outcome {
            ActionOutcome::StateConflict { .. } => ToolResult::failure("execute_action", output),
            _ => ToolResult::success("execute_action", output.trim_end()),
        };
        Ok(result.with_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionConfig;
    use crate::execution::{ExecutionState, MemoryPendingStore};
    use std::sync::Arc;

    fn tool() -> ExecuteActionTool {
        let engine = ExecutionEngine::new(Arc::new(MemoryPendingStore::new()), ExecutionConfig::default());
        ExecuteActionTool::new(engine)
    }

    #[tokio::test]
    async fn test_unknown_action_type_fails_validation() {
        let call = ToolCall::from_json("execute_action", serde_json::json!({ "action_type": "cancel_everything" }));
        assert!(tool().validate(&call).is_err());
    }

    #[tokio::test]
    async fn test_submit_then_list() {
        let tool = tool();
        let submit = ToolCall::from_json(
            "execute_action",
            serde_json::json!({
                "action_type": "execute_trades",
                "investor_id": "inv-7",
                "trades": [{ "symbol": "msft", "side": "buy", "quantity": "3", "order_type": "limit", "limit_price": "410.5" }]
            }),
        );
        let result = tool.execute(&submit).await.unwrap();
        assert!(result.success);
        let outcome: ActionOutcome = result.data_as().unwrap();
        assert_eq!(outcome.report().unwrap().pending.state, ExecutionState::PendingApproval);

        let list = ToolCall::from_json(
            "execute_action",
            serde_json::json!({ "action_type": "list_pending", "investor_id": "inv-7" }),
        );
        let listed: ActionOutcome = tool.execute(&list).await.unwrap().data_as().unwrap();
        assert!(matches!(listed, ActionOutcome::Pending { ref executions } if executions.len() == 1));
    }
}
