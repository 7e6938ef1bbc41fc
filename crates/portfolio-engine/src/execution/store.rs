//! Pending Execution Store
//!
//! Keyed storage for trade batches. Each record sits behind its own mutex so
//! transitions on one pending id are serialized without blocking others.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use super::state::{ExecutionMode, ExecutionState};
use super::validation::TradeRejection;
use crate::error::{EngineError, Result};
use crate::model::{Side, TradeProposal};

/// Pending execution identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingId(String);

impl PendingId {
    pub fn generate() -> Self {
        Self(format!("pend-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PendingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeOutcome {
    /// Passed validation, waiting on approval
    Accepted,
    Rejected,
    Filled,
    Failed,
}

/// Per-trade status line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeStatus {
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub outcome: TradeOutcome,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<uuid::Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_price: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<TradeRejection>,
}

impl TradeStatus {
    pub fn new(trade: &TradeProposal, outcome: TradeOutcome) -> Self {
        Self {
            symbol: trade.symbol.clone(),
            side: trade.side,
            quantity: trade.quantity,
            outcome,
            order_id: None,
            fill_price: None,
            rejection: None,
        }
    }

    pub fn rejected(trade: &TradeProposal, rejection: TradeRejection) -> Self {
        Self {
            rejection: Some(rejection),
            ..Self::new(trade, TradeOutcome::Rejected)
        }
    }
}

/// A batch of trades moving through the approval state machine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingExecution {
    pub pending_id: PendingId,
    pub investor_id: String,
    pub execution_mode: ExecutionMode,
    pub state: ExecutionState,

    /// Only trades that passed validation when submitted
    pub trades: Vec<TradeProposal>,

    /// Fill results, populated once the batch is run
    #[serde(default)]
    pub results: Vec<TradeStatus>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,

    /// Why the batch ended where it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PendingExecution {
    pub fn new(
        investor_id: impl Into<String>,
        execution_mode: ExecutionMode,
        trades: Vec<TradeProposal>,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            pending_id: PendingId::generate(),
            investor_id: investor_id.into(),
            execution_mode,
            state: ExecutionState::Drafted,
            trades,
            results: Vec::new(),
            created_at: now,
            updated_at: now,
            expires_at: now + ttl,
            reason: None,
        }
    }

    /// Move to `next` if the state machine allows it; otherwise leave the
    /// record untouched and return the current state.
    pub fn transition(&mut self, next: ExecutionState) -> std::result::Result<(), ExecutionState> {
        if !self.state.can_transition_to(next) {
            return Err(self.state);
        }
        tracing::info!(
            pending_id = %self.pending_id,
            from = %self.state,
            to = %next,
            "pending execution transition"
        );
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Shared handle to one record; locking it serializes its transitions
pub type PendingSlot = Arc<Mutex<PendingExecution>>;

/// Pending execution storage trait
pub trait PendingStore: Send + Sync {
    /// Store a new record; ids must not collide
    fn insert(&self, pending: PendingExecution) -> Result<PendingSlot>;

    /// Lockable slot for a record
    fn slot(&self, id: &PendingId) -> Result<Option<PendingSlot>>;

    /// Snapshot of a record
    fn get(&self, id: &PendingId) -> Result<Option<PendingExecution>> {
        match self.slot(id)? {
            Some(slot) => Ok(Some(lock(&slot)?.clone())),
            None => Ok(None),
        }
    }

    /// Snapshots, optionally for one investor, oldest first
    fn list(&self, investor_id: Option<&str>) -> Result<Vec<PendingExecution>>;
}

/// Lock a slot, surfacing poisoning as a storage error
pub fn lock(slot: &PendingSlot) -> Result<MutexGuard<'_, PendingExecution>> {
    slot.lock()
        .map_err(|_| EngineError::Storage("pending execution lock poisoned".into()))
}

/// In-memory pending store (for development and tests).
///
/// Terminal records stay in the map as the archive.
pub struct MemoryPendingStore {
    records: RwLock<HashMap<PendingId, PendingSlot>>,
}

impl Default for MemoryPendingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPendingStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl PendingStore for MemoryPendingStore {
    fn insert(&self, pending: PendingExecution) -> Result<PendingSlot> {
        let mut records = self.records
            .write()
            .map_err(|_| EngineError::Storage("pending store lock poisoned".into()))?;

        if records.contains_key(&pending.pending_id) {
            return Err(EngineError::Storage(format!(
                "pending id {} already exists",
                pending.pending_id
            )));
        }

        let id = pending.pending_id.clone();
        let slot = Arc::new(Mutex::new(pending));
        records.insert(id, Arc::clone(&slot));
        Ok(slot)
    }

    fn slot(&self, id: &PendingId) -> Result<Option<PendingSlot>> {
        let records = self.records
            .read()
            .map_err(|_| EngineError::Storage("pending store lock poisoned".into()))?;
        Ok(records.get(id).cloned())
    }

    fn list(&self, investor_id: Option<&str>) -> Result<Vec<PendingExecution>> {
        let slots: Vec<PendingSlot> = {
            let records = self.records
                .read()
                .map_err(|_| EngineError::Storage("pending store lock poisoned".into()))?;
            records.values().cloned().collect()
        };

        let mut out = Vec::with_capacity(slots.len());
        for slot in &slots {
            let record = lock(slot)?;
            if investor_id.is_none_or(|id| record.investor_id == id) {
                out.push(record.clone());
            }
        }
        out.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.pending_id.cmp(&b.pending_id))
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(investor: &str) -> PendingExecution {
        PendingExecution::new(
            investor,
            ExecutionMode::ApprovalRequired,
            vec![TradeProposal::market("AAPL", Side::Buy, dec!(1))],
            Duration::hours(72),
        )
    }

    #[test]
    fn test_pending_ids_are_unique() {
        assert_ne!(PendingId::generate(), PendingId::generate());
        assert!(PendingId::generate().as_str().starts_with("pend-"));
    }

    #[test]
    fn test_insert_get_list() {
        let store = MemoryPendingStore::new();
        let a = record("alice");
        let id = a.pending_id.clone();
        store.insert(a).unwrap();
        store.insert(record("bob")).unwrap();

        assert_eq!(store.get(&id).unwrap().unwrap().investor_id, "alice");
        assert!(store.get(&PendingId::from_string("nope")).unwrap().is_none());
        assert_eq!(store.list(None).unwrap().len(), 2);
        assert_eq!(store.list(Some("bob")).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let store = MemoryPendingStore::new();
        let a = record("alice");
        store.insert(a.clone()).unwrap();
        assert!(matches!(store.insert(a), Err(EngineError::Storage(_))));
    }

    #[test]
    fn test_transition_guard() {
        let mut pending = record("alice");
        pending.transition(ExecutionState::PendingApproval).unwrap();
        pending.transition(ExecutionState::Rejected).unwrap();
        assert_eq!(pending.transition(ExecutionState::Approved), Err(ExecutionState::Rejected));
        assert_eq!(pending.state, ExecutionState::Rejected);
    }
}
