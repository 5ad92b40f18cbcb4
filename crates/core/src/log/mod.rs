//! Durable, FIFO-ordered log of pending mutating operations.
//!
//! `ActionLog` is the single owner of the durable queue: it generates action
//! ids, appends entries through the [`ActionStore`] port, and exposes the
//! status transitions the sync coordinator drives. Presentation code never
//! mutates the store directly.

use std::sync::Arc;

use chrono::Utc;
use courier_domain::constants::MAX_ERROR_REASON_LEN;
use courier_domain::{ActionStatus, CourierError, PendingAction, Result};
use tracing::{debug, info};
use uuid::Uuid;

use crate::sync::ports::ActionStore;

/// Durable FIFO queue of pending actions.
///
/// Ids are UUIDv7, generated at enqueue time from a monotonically-unique
/// source, stable for the action's lifetime and reused as the idempotency
/// key during backend replay.
pub struct ActionLog {
    store: Arc<dyn ActionStore>,
}

impl ActionLog {
    /// Create a log over the given durable store.
    pub fn new(store: Arc<dyn ActionStore>) -> Self {
        Self { store }
    }

    /// Append a new pending action and return its id.
    ///
    /// The entry is durable once this call returns without error.
    pub async fn enqueue(&self, operation: &str, payload: &serde_json::Value) -> Result<String> {
        if operation.trim().is_empty() {
            return Err(CourierError::InvalidInput("operation tag must not be empty".into()));
        }

        let action = PendingAction {
            id: Uuid::now_v7().to_string(),
            operation: operation.to_string(),
            payload_json: payload.to_string(),
            status: ActionStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: Utc::now().timestamp(),
            next_attempt_at: None,
        };

        self.store.append(&action).await?;
        info!(action_id = %action.id, operation = %action.operation, "action enqueued");
        Ok(action.id)
    }

    /// Fetch an entry by id.
    pub async fn get(&self, id: &str) -> Result<Option<PendingAction>> {
        self.store.get(id).await
    }

    /// Oldest pending entry, or `None` when the queue holds no pending work.
    pub async fn peek_next(&self) -> Result<Option<PendingAction>> {
        self.store.peek_next().await
    }

    /// Mark an entry as picked up for replay.
    pub async fn mark_in_flight(&self, id: &str) -> Result<()> {
        self.store.mark_in_flight(id).await
    }

    /// Mark an entry as successfully applied to the backend.
    pub async fn mark_resolved(&self, id: &str) -> Result<()> {
        self.store.mark_resolved(id).await
    }

    /// Mark an entry as permanently failed, recording a truncated reason.
    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<()> {
        self.store.mark_failed(id, &truncate_reason(error)).await
    }

    /// Return an in-flight entry to pending at its original position and
    /// schedule its next attempt.
    pub async fn release_for_retry(
        &self,
        id: &str,
        error: &str,
        next_attempt_at: i64,
    ) -> Result<()> {
        self.store.release_for_retry(id, &truncate_reason(error), next_attempt_at).await
    }

    /// Every entry in original insertion order, for diagnostics.
    pub async fn list_ordered(&self) -> Result<Vec<PendingAction>> {
        self.store.list_ordered().await
    }

    /// Number of entries not yet resolved.
    pub async fn count(&self) -> Result<u64> {
        self.store.count_unresolved().await
    }

    /// Number of entries in failed state.
    pub async fn failed_count(&self) -> Result<u64> {
        self.store.count_failed().await
    }

    /// Failed entries in original insertion order, for inspection or manual
    /// discard.
    pub async fn list_failed(&self) -> Result<Vec<PendingAction>> {
        self.store.list_failed().await
    }

    /// Clear every entry that is not currently in flight.
    ///
    /// In-flight entries are swept separately once their network call
    /// settles, to avoid racing an active replay.
    pub async fn discard_all(&self) -> Result<u64> {
        let removed = self.store.discard_all().await?;
        info!(removed, "discarded queued actions");
        Ok(removed)
    }

    /// Purge resolved entries from persistent storage.
    pub async fn purge_resolved(&self) -> Result<u64> {
        let purged = self.store.remove_resolved().await?;
        if purged > 0 {
            debug!(purged, "purged resolved actions");
        }
        Ok(purged)
    }

    /// Re-queue entries left in flight by an interrupted process.
    ///
    /// Replay of a recovered entry may duplicate a call whose acknowledgement
    /// was lost; the backend adapter contract requires idempotency keyed by
    /// action id, which makes that safe.
    pub async fn recover_interrupted(&self) -> Result<u64> {
        let recovered = self.store.recover_in_flight().await?;
        if recovered > 0 {
            info!(recovered, "recovered interrupted in-flight actions");
        }
        Ok(recovered)
    }
}

fn truncate_reason(reason: &str) -> String {
    if reason.len() <= MAX_ERROR_REASON_LEN {
        return reason.to_string();
    }

    let mut truncated =
        reason.chars().take(MAX_ERROR_REASON_LEN.saturating_sub(3)).collect::<String>();
    truncated.push_str("...");
    truncated
}
