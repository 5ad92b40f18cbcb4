//! Shared state cell linking probe, coordinator and publisher.
//!
//! The publisher issues commands (trigger, discard sweep) and the probe
//! reports quality through this cell, so neither needs a reference to the
//! coordinator itself and no `Arc` cycle forms.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use courier_domain::ConnectionQuality;
use parking_lot::RwLock;
use tokio::sync::Notify;

/// Drain progress of the coordinator (per coordinator instance, not per
/// action).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    /// No drain in progress.
    Idle,
    /// Actively replaying actions.
    Draining,
    /// Drain suspended because connectivity dropped mid-drain; the in-flight
    /// action settles before the coordinator returns to `Idle`.
    Paused,
}

courier_domain::impl_status_conversions!(DrainState {
    Idle => "idle",
    Draining => "draining",
    Paused => "paused"
});

struct ControlInner {
    quality: RwLock<ConnectionQuality>,
    state: RwLock<DrainState>,
    wake: Notify,
    discard_sweep: AtomicBool,
}

/// Cheaply clonable handle over the coordinator's shared state.
#[derive(Clone)]
pub struct SyncControl {
    inner: Arc<ControlInner>,
}

impl SyncControl {
    /// Create a control cell in the fail-safe initial state (offline, idle).
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ControlInner {
                quality: RwLock::new(ConnectionQuality::Offline),
                state: RwLock::new(DrainState::Idle),
                wake: Notify::new(),
                discard_sweep: AtomicBool::new(false),
            }),
        }
    }

    /// Last reported connection quality.
    pub fn quality(&self) -> ConnectionQuality {
        *self.inner.quality.read()
    }

    /// Record a quality transition.
    ///
    /// An offline transition while a drain is running moves the coordinator
    /// to `Paused`; the in-flight call still settles before `Idle`.
    pub fn set_quality(&self, quality: ConnectionQuality) {
        *self.inner.quality.write() = quality;
        if !quality.is_online() {
            let mut state = self.inner.state.write();
            if *state == DrainState::Draining {
                *state = DrainState::Paused;
            }
        }
    }

    /// Current drain state.
    pub fn state(&self) -> DrainState {
        *self.inner.state.read()
    }

    /// Record a drain-state transition. Driven by the coordinator.
    pub fn set_state(&self, state: DrainState) {
        *self.inner.state.write() = state;
    }

    /// Wake the coordinator for an immediate drain attempt.
    pub fn request_drain(&self) {
        self.inner.wake.notify_one();
    }

    /// Await the next drain request.
    pub async fn drain_requested(&self) {
        self.inner.wake.notified().await;
    }

    /// Ask the coordinator to re-run a discard after the in-flight entry
    /// settles.
    pub fn request_discard_sweep(&self) {
        self.inner.discard_sweep.store(true, Ordering::SeqCst);
    }

    /// Consume a pending discard-sweep request, if any.
    pub fn take_discard_sweep(&self) -> bool {
        self.inner.discard_sweep.swap(false, Ordering::SeqCst)
    }
}

impl Default for SyncControl {
    fn default() -> Self {
        Self::new()
    }
}
