//! Pending action queue types

use serde::{Deserialize, Serialize};

/// PendingAction - a queued mutating operation awaiting backend confirmation.
///
/// Entries are appended by the action log and replayed in strict insertion
/// order. The `id` doubles as the idempotency key for backend replay, so a
/// lost acknowledgement never produces a duplicate write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingAction {
    pub id: String,
    /// Symbolic tag identifying which backend operation to replay.
    pub operation: String,
    /// Opaque serialized payload required to replay the operation.
    pub payload_json: String,
    pub status: ActionStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: i64,
    /// Earliest Unix timestamp at which the next replay attempt may run.
    pub next_attempt_at: Option<i64>,
}

impl PendingAction {
    /// Whether the entry still counts toward the pending total.
    pub fn is_unresolved(&self) -> bool {
        self.status != ActionStatus::Resolved
    }
}

/// Lifecycle status of a queued action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    InFlight,
    Failed,
    Resolved,
}

crate::impl_status_conversions!(ActionStatus {
    Pending => "pending",
    InFlight => "in_flight",
    Failed => "failed",
    Resolved => "resolved"
});

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn status_string_roundtrip() {
        for status in [
            ActionStatus::Pending,
            ActionStatus::InFlight,
            ActionStatus::Failed,
            ActionStatus::Resolved,
        ] {
            let parsed = ActionStatus::from_str(&status.to_string()).unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn resolved_is_not_unresolved() {
        let action = PendingAction {
            id: "a-1".into(),
            operation: "create".into(),
            payload_json: "{}".into(),
            status: ActionStatus::Resolved,
            attempts: 1,
            last_error: None,
            created_at: 1_735_000_000,
            next_attempt_at: None,
        };
        assert!(!action.is_unresolved());
    }

    #[test]
    fn serde_uses_snake_case_status() {
        let json = serde_json::to_string(&ActionStatus::InFlight).unwrap();
        assert_eq!(json, "\"in_flight\"");
    }
}
