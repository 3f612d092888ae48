//! Staged transactions awaiting human confirmation
//!
//! When the engine finds sensitive data, the orchestrator stages the
//! request here and pauses. A staged transaction is immutable: the only
//! operations are an initial `stage` and a single atomic `take`. The
//! original, unredacted payload lives nowhere else — once the TTL elapses
//! or the transaction is taken, it is gone.

mod memory;

pub use memory::MemoryPendingStore;

use crate::error::Result;
use crate::scrub::{Hit, ScrubMode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// A request paused for a human decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedTransaction {
    /// Opaque identifier handed back to the caller
    pub id: String,
    /// The original, unredacted payload
    pub original: Value,
    /// The redacted payload
    pub redacted: Value,
    /// Everything the scan found
    pub hits: Vec<Hit>,
    /// Policy-derived instruction for the compliance judge
    pub audit_instruction: Option<String>,
    /// Originating request id
    pub request_id: String,
    /// Optional conversation correlation id
    pub conversation_id: Option<String>,
    /// Origin label of the request
    pub source: String,
    /// Rewrite mode the scan ran with
    pub mode: ScrubMode,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl StagedTransaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        original: Value,
        redacted: Value,
        hits: Vec<Hit>,
        audit_instruction: Option<String>,
        request_id: String,
        conversation_id: Option<String>,
        source: String,
        mode: ScrubMode,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            original,
            redacted,
            hits,
            audit_instruction,
            request_id,
            conversation_id,
            source,
            mode,
            created_at: Utc::now(),
        }
    }
}

/// Ephemeral store holding staged transactions for their confirmation
/// window. There is deliberately no update or extend operation.
#[async_trait]
pub trait PendingStore: Send + Sync {
    /// Stage a transaction under its id with the given time-to-live.
    async fn stage(&self, txn: StagedTransaction, ttl: Duration) -> Result<()>;

    /// Atomic fetch-and-delete. Returns `None` when the id is unknown,
    /// already resolved, or expired — two concurrent callers can never both
    /// observe the same transaction.
    async fn take(&self, id: &str) -> Result<Option<StagedTransaction>>;
}
