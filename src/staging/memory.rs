//! In-process pending store
//!
//! DashMap-backed implementation of `PendingStore` with per-key TTL.
//! `take` relies on the map's atomic `remove`, so concurrent resolutions of
//! one id race safely — exactly one caller wins. Every staged entry gets a
//! reaper task that deletes it at its deadline; `take` additionally checks
//! the deadline so an entry is unobservable past its TTL even before the
//! reaper fires.

use crate::error::Result;
use crate::staging::{PendingStore, StagedTransaction};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

struct Entry {
    txn: StagedTransaction,
    expires_at: Instant,
}

/// Ephemeral in-memory store for staged transactions.
#[derive(Clone, Default)]
pub struct MemoryPendingStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently staged (possibly expired, not yet reaped) entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl PendingStore for MemoryPendingStore {
    async fn stage(&self, txn: StagedTransaction, ttl: Duration) -> Result<()> {
        let id = txn.id.clone();
        let expires_at = Instant::now() + ttl;
        self.entries.insert(
            id.clone(),
            Entry {
                txn,
                expires_at,
            },
        );

        let entries = self.entries.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(expires_at).await;
            let removed = entries.remove_if(&id, |_, entry| Instant::now() >= entry.expires_at);
            if removed.is_some() {
                tracing::debug!(pending_id = %id, "staged transaction expired unresolved");
            }
        });

        Ok(())
    }

    async fn take(&self, id: &str) -> Result<Option<StagedTransaction>> {
        match self.entries.remove(id) {
            Some((_, entry)) if Instant::now() < entry.expires_at => Ok(Some(entry.txn)),
            _ => Ok(None),
        }
    }
}
