//! Execution Engine
//!
//! Validates trade batches and moves them through the approval state
//! machine according to the execution mode. Fills are simulated.
//!
//! Per-trade validation failures and state conflicts are values in the
//! outcome, not errors: only malformed requests, unknown pending ids and
//! storage faults fail an action.

mod rebalance;
mod state;
mod store;
mod validation;

pub use rebalance::{Instrument, RebalanceOrders, RebalanceRequest, SkippedClass, expand};
pub use state::{ExecutionMode, ExecutionState};
pub use store::{
    MemoryPendingStore, PendingExecution, PendingId, PendingSlot, PendingStore, TradeOutcome, TradeStatus, lock,
};
pub use validation::{RejectionCode, TradeRejection, validate_trade};

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ExecutionConfig;
use crate::error::{EngineError, Result};
use crate::model::TradeProposal;
use crate::strategy::StrategyGenerator;

/// One execution action
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum ActionRequest {
    ExecuteTrades {
        investor_id: String,
        #[serde(default)]
        execution_mode: ExecutionMode,
        trades: Vec<TradeProposal>,
    },
    ApproveTrades {
        investor_id: String,
        pending_id: PendingId,
    },
    RejectTrades {
        investor_id: String,
        pending_id: PendingId,
        #[serde(default)]
        reason: Option<String>,
    },
    RebalancePortfolio {
        investor_id: String,
        #[serde(default)]
        execution_mode: ExecutionMode,
        rebalance_request: RebalanceRequest,
    },
    ListPending {
        #[serde(default)]
        investor_id: Option<String>,
        #[serde(default)]
        include_closed: bool,
    },
}

/// Result of a submit, approve or reject
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub pending: PendingExecution,

    /// One line per submitted trade (submit) or stored trade (approve/reject)
    pub trades: Vec<TradeStatus>,

    /// Asset classes a rebalance could not trade
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_classes: Vec<SkippedClass>,

    /// False in advisory mode: the record was drafted but not stored
    pub stored: bool,
}

impl ExecutionReport {
    pub fn count(&self, outcome: TradeOutcome) -> usize {
        self.trades.iter().filter(|t| t.outcome == outcome).count()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Completed(ExecutionReport),

    /// The pending id was not eligible; nothing changed
    StateConflict {
        pending_id: PendingId,
        current_state: ExecutionState,
        reason: String,
    },

    Pending { executions: Vec<PendingExecution> },
}

impl ActionOutcome {
    pub const fn report(&self) -> Option<&ExecutionReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Execution engine over a pending store
pub struct ExecutionEngine {
    store: Arc<dyn PendingStore>,
    config: ExecutionConfig,
    generator: StrategyGenerator,
}

impl ExecutionEngine {
    pub fn new(store: Arc<dyn PendingStore>, config: ExecutionConfig) -> Self {
        Self {
            store,
            config,
            generator: StrategyGenerator::default(),
        }
    }

    /// Generator used to plan rebalances given as profile + allocation
    pub fn with_generator(mut self, generator: StrategyGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn store(&self) -> &Arc<dyn PendingStore> {
        &self.store
    }

    pub const fn generator(&self) -> &StrategyGenerator {
        &self.generator
    }

    pub fn execute_action(&self, request: ActionRequest) -> Result<ActionOutcome> {
        match request {
            ActionRequest::ExecuteTrades { investor_id, execution_mode, trades } => {
                self.submit(&investor_id, execution_mode, trades, Vec::new())
            }
            ActionRequest::ApproveTrades { investor_id, pending_id } => self.approve(&investor_id, &pending_id),
            ActionRequest::RejectTrades { investor_id, pending_id, reason } => {
                self.reject(&investor_id, &pending_id, reason)
            }
            ActionRequest::RebalancePortfolio { investor_id, execution_mode, rebalance_request } => {
                self.rebalance(&investor_id, execution_mode, &rebalance_request)
            }
            ActionRequest::ListPending { investor_id, include_closed } => {
                let mut executions = self.store.list(investor_id.as_deref())?;
                if !include_closed {
                    executions.retain(|p| !p.state.is_terminal());
                }
                Ok(ActionOutcome::Pending { executions })
            }
        }
    }

    /// Validate a batch and create its pending execution.
    ///
    /// Invalid trades are reported and dropped; the batch is recorded even
    /// when nothing in it was valid.
    pub fn submit(
        &self,
        investor_id: &str,
        mode: ExecutionMode,
        trades: Vec<TradeProposal>,
        skipped_classes: Vec<SkippedClass>,
    ) -> Result<ActionOutcome> {
        if investor_id.trim().is_empty() {
            return Err(EngineError::invalid("investor_id must not be empty"));
        }

        let mut statuses = Vec::with_capacity(trades.len());
        let mut accepted = Vec::new();
        for mut trade in trades {
            trade.symbol = trade.symbol.trim().to_uppercase();
            match validate_trade(&trade, self.config.tradable_universe.as_ref()) {
                Ok(()) => {
                    statuses.push(TradeStatus::new(&trade, TradeOutcome::Accepted));
                    accepted.push(trade);
                }
                Err(rejection) => {
                    tracing::warn!(investor_id, symbol = %trade.symbol, reason = %rejection, "trade rejected");
                    statuses.push(TradeStatus::rejected(&trade, rejection));
                }
            }
        }

        let ttl = Duration::hours(self.config.pending_ttl_hours);
        let mut pending = PendingExecution::new(investor_id, mode, accepted, ttl);

        let (pending, trades, stored) = match mode {
            ExecutionMode::AdvisoryOnly => (pending, statuses, false),
            ExecutionMode::ApprovalRequired => {
                move_to(&mut pending, ExecutionState::PendingApproval)?;
                self.store.insert(pending.clone())?;
                (pending, statuses, true)
            }
            ExecutionMode::FullyAutomated => {
                move_to(&mut pending, ExecutionState::Approved)?;
                let fills = run_fills(&mut pending, self.config.tradable_universe.as_ref())?;
                self.store.insert(pending.clone())?;
                (pending, merge_fills(statuses, &fills), true)
            }
        };

        tracing::info!(
            pending_id = %pending.pending_id,
            investor_id,
            mode = mode.as_str(),
            state = %pending.state,
            trades = pending.trades.len(),
            "pending execution created"
        );

        Ok(ActionOutcome::Completed(ExecutionReport {
            pending,
            trades,
            skipped_classes,
            stored,
        }))
    }

    /// Approve and run a pending batch.
    ///
    /// The record's lock is held from the eligibility check through the
    /// fills, so a racing reject sees the final state.
    pub fn approve(&self, investor_id: &str, pending_id: &PendingId) -> Result<ActionOutcome> {
        let slot = self.slot_for(investor_id, pending_id)?;
        let mut pending = lock(&slot)?;
        check_owner(&pending, investor_id)?;

        if pending.state != ExecutionState::PendingApproval {
            return Ok(conflict(&pending, "not awaiting approval"));
        }
        if pending.is_expired(Utc::now()) {
            return Ok(conflict(&pending, "expired"));
        }

        move_to(&mut pending, ExecutionState::Approved)?;
        let fills = run_fills(&mut pending, self.config.tradable_universe.as_ref())?;

        Ok(ActionOutcome::Completed(ExecutionReport {
            pending: pending.clone(),
            trades: fills,
            skipped_classes: Vec::new(),
            stored: true,
        }))
    }

    pub fn reject(&self, investor_id: &str, pending_id: &PendingId, reason: Option<String>) -> Result<ActionOutcome> {
        let slot = self.slot_for(investor_id, pending_id)?;
        let mut pending = lock(&slot)?;
        check_owner(&pending, investor_id)?;

        if pending.state != ExecutionState::PendingApproval {
            return Ok(conflict(&pending, "not awaiting approval"));
        }

        move_to(&mut pending, ExecutionState::Rejected)?;
        pending.reason = Some(reason.unwrap_or_else(|| "rejected by investor".into()));

        let trades = pending
            .trades
            .iter()
            .map(|t| TradeStatus::new(t, TradeOutcome::Rejected))
            .collect();

        Ok(ActionOutcome::Completed(ExecutionReport {
            pending: pending.clone(),
            trades,
            skipped_classes: Vec::new(),
            stored: true,
        }))
    }

    /// Expand a rebalance into orders and submit them like any other batch
    pub fn rebalance(
        &self,
        investor_id: &str,
        mode: ExecutionMode,
        request: &RebalanceRequest,
    ) -> Result<ActionOutcome> {
        let plan = request.resolve_plan(&self.generator)?;
        let orders = expand(request, &plan, self.config.quantity_scale)?;

        tracing::info!(
            investor_id,
            orders = orders.trades.len(),
            skipped = orders.skipped.len(),
            "rebalance expanded"
        );
        self.submit(investor_id, mode, orders.trades, orders.skipped)
    }

    fn slot_for(&self, investor_id: &str, pending_id: &PendingId) -> Result<PendingSlot> {
        if investor_id.trim().is_empty() {
            return Err(EngineError::invalid("investor_id must not be empty"));
        }
        self.store
            .slot(pending_id)?
            .ok_or_else(|| EngineError::PendingNotFound(pending_id.to_string()))
    }
}

fn check_owner(pending: &PendingExecution, investor_id: &str) -> Result<()> {
    if pending.investor_id != investor_id {
        return Err(EngineError::invalid(format!(
            "pending execution {} does not belong to investor {investor_id}",
            pending.pending_id
        )));
    }
    Ok(())
}

fn conflict(pending: &PendingExecution, reason: &str) -> ActionOutcome {
    tracing::warn!(
        pending_id = %pending.pending_id,
        state = %pending.state,
        reason,
        "state conflict"
    );
    ActionOutcome::StateConflict {
        pending_id: pending.pending_id.clone(),
        current_state: pending.state,
        reason: reason.into(),
    }
}

fn move_to(pending: &mut PendingExecution, next: ExecutionState) -> Result<()> {
    pending.transition(next).map_err(|current| {
        EngineError::Storage(format!(
            "illegal transition {current} -> {next} for {}",
            pending.pending_id
        ))
    })
}

/// Revalidate and simulate a fill for every stored trade, then settle the
/// batch: all filled → executed, anything else → failed.
fn run_fills(
    pending: &mut PendingExecution,
    universe: Option<&std::collections::BTreeSet<String>>,
) -> Result<Vec<TradeStatus>> {
    let results: Vec<TradeStatus> = pending
        .trades
        .iter()
        .map(|trade| match validate_trade(trade, universe) {
            Ok(()) => simulate_fill(trade),
            Err(rejection) => TradeStatus {
                outcome: TradeOutcome::Failed,
                ..TradeStatus::rejected(trade, rejection)
            },
        })
        .collect();

    let (next, reason) = if results.is_empty() {
        (ExecutionState::Failed, Some("no valid trades".to_string()))
    } else if results.iter().all(|r| r.outcome == TradeOutcome::Filled) {
        (ExecutionState::Executed, None)
    } else {
        (ExecutionState::Failed, Some("one or more trades failed".to_string()))
    };

    pending.results.clone_from(&results);
    pending.reason = reason;
    move_to(pending, next)?;
    Ok(results)
}

/// Fill at the order's price, else the reference price
fn simulate_fill(trade: &TradeProposal) -> TradeStatus {
    let order_id = uuid::Uuid::new_v4();
    let fill_price = trade.limit_price.or(trade.reference_price);

    tracing::debug!(symbol = %trade.symbol, side = trade.side.as_str(), %order_id, "simulated fill");

    TradeStatus {
        order_id: Some(order_id),
        fill_price,
        ..TradeStatus::new(trade, TradeOutcome::Filled)
    }
}

/// Replace accepted submit lines with their fill results, in order
fn merge_fills(statuses: Vec<TradeStatus>, fills: &[TradeStatus]) -> Vec<TradeStatus> {
    let mut fills = fills.iter();
    statuses
        .into_iter()
        .map(|status| match status.outcome {
            TradeOutcome::Accepted => fills.next().cloned().unwrap_or(status),
            _ => status,
        })
        .collect()
}
