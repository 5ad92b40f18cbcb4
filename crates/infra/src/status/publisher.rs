//! Single observable read-model for connectivity and pending state.
//!
//! The publisher owns only the derived [`SyncSnapshot`], never the source
//! data: counts come from the action log and quality from the shared control
//! cell. Listeners receive the current snapshot immediately on subscription
//! (no missed-initial-state gap) and afterwards only when the snapshot
//! actually changes. Delivery is serialized so listeners observe snapshots
//! in the order they were produced.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use courier_core::ActionLog;
use courier_domain::{Result, SyncSnapshot};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::sync::{DrainState, SyncControl};

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Listener for snapshot changes.
#[async_trait]
pub trait SnapshotListener: Send + Sync {
    /// Called with the latest snapshot whenever it changes, and once
    /// immediately upon subscription.
    async fn on_snapshot(&self, snapshot: SyncSnapshot);
}

/// Aggregates connectivity state and queue counts into an observable
/// snapshot, and exposes the user-triggerable commands.
pub struct StatusPublisher {
    log: Arc<ActionLog>,
    control: SyncControl,
    snapshot: RwLock<SyncSnapshot>,
    subscribers: Mutex<HashMap<u64, Arc<dyn SnapshotListener>>>,
    next_subscription: AtomicU64,
    delivery: tokio::sync::Mutex<()>,
}

impl StatusPublisher {
    /// Create a publisher over the given log and control cell.
    pub fn new(log: Arc<ActionLog>, control: SyncControl) -> Self {
        Self {
            log,
            control,
            snapshot: RwLock::new(SyncSnapshot::offline()),
            subscribers: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
            delivery: tokio::sync::Mutex::new(()),
        }
    }

    /// Current snapshot. Never blocks on storage or network.
    pub fn snapshot(&self) -> SyncSnapshot {
        *self.snapshot.read()
    }

    /// Register a listener and deliver the current snapshot to it
    /// immediately.
    pub async fn subscribe(&self, listener: Arc<dyn SnapshotListener>) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);

        // Hold the delivery lock across the initial notification so a
        // concurrent refresh cannot deliver a newer snapshot first.
        let _delivery = self.delivery.lock().await;
        self.subscribers.lock().insert(id, Arc::clone(&listener));
        listener.on_snapshot(self.snapshot()).await;

        debug!(subscription_id = id, "snapshot listener subscribed");
        SubscriptionId(id)
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscribers.lock().remove(&id.0).is_some();
        if removed {
            debug!(subscription_id = id.0, "snapshot listener unsubscribed");
        }
        removed
    }

    /// Recompute the snapshot from the log and control cell, notifying
    /// listeners when it changed.
    pub async fn refresh(&self) -> Result<()> {
        let _delivery = self.delivery.lock().await;

        let quality = self.control.quality();
        let unresolved = self.log.count().await?;
        let failed_count = self.log.failed_count().await?;
        // Entries still awaiting replay; permanently failed entries are
        // surfaced through failed_count instead.
        let pending_count = unresolved.saturating_sub(failed_count);
        let next = SyncSnapshot {
            is_online: quality.is_online(),
            pending_count,
            failed_count,
            quality,
        };

        let changed = {
            let mut guard = self.snapshot.write();
            if *guard == next {
                false
            } else {
                *guard = next;
                true
            }
        };

        if changed {
            let listeners: Vec<_> = self.subscribers.lock().values().cloned().collect();
            for listener in listeners {
                listener.on_snapshot(next).await;
            }
        }

        Ok(())
    }

    /// Request an immediate drain, ahead of the interval timer.
    ///
    /// A no-op while a drain is already running; fails silently (logged,
    /// not returned) while offline.
    pub fn trigger_sync(&self) {
        if !self.control.quality().is_online() {
            warn!("sync trigger ignored: currently offline");
            return;
        }
        if self.control.state() == DrainState::Draining {
            debug!("sync trigger ignored: drain already in progress");
            return;
        }
        info!("manual sync triggered");
        self.control.request_drain();
    }

    /// Discard every queued action that is not currently in flight.
    ///
    /// In-flight entries are swept by the coordinator once their network
    /// call settles.
    pub async fn discard_pending(&self) -> Result<u64> {
        let removed = self.log.discard_all().await?;
        if self.control.state() != DrainState::Idle {
            self.control.request_discard_sweep();
        }
        self.refresh().await?;
        Ok(removed)
    }
}
