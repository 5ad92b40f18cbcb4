//! Connection quality classification and the published status snapshot

use serde::{Deserialize, Serialize};

/// Coarse classification of network health.
///
/// Derived from measured reachability and round-trip latency; recomputed on
/// every probe cycle and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    Offline,
    Poor,
    Good,
    Excellent,
}

impl ConnectionQuality {
    /// Whether the backend is reachable at all.
    pub fn is_online(self) -> bool {
        self != Self::Offline
    }
}

crate::impl_status_conversions!(ConnectionQuality {
    Offline => "offline",
    Poor => "poor",
    Good => "good",
    Excellent => "excellent"
});

/// Read-only projection of connectivity and queue state.
///
/// Owned and republished by the status publisher on every state change;
/// consumers hold no write access to the underlying data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub is_online: bool,
    pub pending_count: u64,
    pub failed_count: u64,
    pub quality: ConnectionQuality,
}

impl SyncSnapshot {
    /// Fail-safe initial snapshot: assume disconnected until proven otherwise.
    pub fn offline() -> Self {
        Self {
            is_online: false,
            pending_count: 0,
            failed_count: 0,
            quality: ConnectionQuality::Offline,
        }
    }
}
