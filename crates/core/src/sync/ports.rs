//! Port interfaces for the durable action queue

use async_trait::async_trait;
use courier_domain::{PendingAction, Result};

/// Trait for the durable, FIFO-ordered action store.
///
/// Implementations must make every mutation durable before returning so that
/// a crash between operations never loses or duplicates more than the single
/// in-flight entry. Transition methods validate the current status in the
/// same statement and return `CourierError::UnknownAction` when the entry is
/// missing, already resolved, or not in the expected state.
#[async_trait]
pub trait ActionStore: Send + Sync {
    /// Append a new entry at the tail of the queue.
    async fn append(&self, action: &PendingAction) -> Result<()>;

    /// Fetch an entry by id regardless of status.
    async fn get(&self, id: &str) -> Result<Option<PendingAction>>;

    /// Oldest `pending` entry without mutating it, or `None` when no pending
    /// work remains.
    async fn peek_next(&self) -> Result<Option<PendingAction>>;

    /// Transition `pending` → `in_flight`, incrementing the attempt counter
    /// (an attempt is counted when the entry is picked up, so a successful
    /// replay counts too).
    async fn mark_in_flight(&self, id: &str) -> Result<()>;

    /// Transition `in_flight` → `resolved`.
    async fn mark_resolved(&self, id: &str) -> Result<()>;

    /// Transition `pending`/`in_flight` → `failed`, recording the reason.
    async fn mark_failed(&self, id: &str, error: &str) -> Result<()>;

    /// Transition `in_flight` → `pending` at the original queue position,
    /// recording the failure and scheduling the next attempt.
    async fn release_for_retry(&self, id: &str, error: &str, next_attempt_at: i64) -> Result<()>;

    /// Every entry in original insertion order, regardless of status.
    async fn list_ordered(&self) -> Result<Vec<PendingAction>>;

    /// Number of entries not in `resolved` state.
    async fn count_unresolved(&self) -> Result<u64>;

    /// Number of entries in `failed` state.
    async fn count_failed(&self) -> Result<u64>;

    /// Entries in `failed` state, in original insertion order.
    async fn list_failed(&self) -> Result<Vec<PendingAction>>;

    /// Delete every entry not currently `in_flight`. Returns the number of
    /// deleted rows.
    async fn discard_all(&self) -> Result<u64>;

    /// Delete entries in `resolved` state. Returns the number of deleted
    /// rows.
    async fn remove_resolved(&self) -> Result<u64>;

    /// Re-queue entries left `in_flight` by an interrupted process. Returns
    /// the number of recovered rows.
    async fn recover_in_flight(&self) -> Result<u64>;
}
