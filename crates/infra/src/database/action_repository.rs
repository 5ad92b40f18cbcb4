//! SQLite-backed implementation of the action store port.
//!
//! Every status transition is a single guarded `UPDATE` whose `WHERE` clause
//! validates the expected current status, so a transition race loses cleanly
//! (zero affected rows) instead of clobbering state. Zero affected rows maps
//! to `CourierError::UnknownAction`.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use courier_core::ActionStore;
use courier_domain::{ActionStatus, CourierError, PendingAction, Result};
use rusqlite::{params, Row, ToSql};
use tokio::task;
use tracing::warn;

use super::manager::DbManager;
use crate::errors::InfraError;

/// SQLite-backed action repository.
pub struct SqliteActionStore {
    db: Arc<DbManager>,
}

impl SqliteActionStore {
    /// Construct a repository backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<T> {
            let conn = db.get_connection()?;
            op(&conn)
        })
        .await
        .map_err(map_join_error)?
    }

    fn guarded_update(
        conn: &rusqlite::Connection,
        sql: &str,
        params: &[&dyn ToSql],
        id: &str,
        expected: &str,
    ) -> Result<()> {
        let affected = conn.execute(sql, params).map_err(map_sql_error)?;
        if affected == 0 {
            return Err(CourierError::UnknownAction(format!(
                "{id}: entry missing or not {expected}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ActionStore for SqliteActionStore {
    async fn append(&self, action: &PendingAction) -> Result<()> {
        let entry = action.clone();
        self.with_conn(move |conn| {
            conn.execute(
                ACTION_INSERT_SQL,
                params![
                    entry.id,
                    entry.operation,
                    entry.payload_json,
                    entry.status.to_string(),
                    entry.attempts,
                    entry.last_error,
                    entry.created_at,
                    entry.next_attempt_at,
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<PendingAction>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(ACTION_GET_SQL).map_err(map_sql_error)?;
            let mut rows = stmt
                .query_map(params![id], map_action_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)?;
            Ok(rows.pop())
        })
        .await
    }

    async fn peek_next(&self) -> Result<Option<PendingAction>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(ACTION_PEEK_SQL).map_err(map_sql_error)?;
            let mut rows = stmt
                .query_map([], map_action_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)?;
            Ok(rows.pop())
        })
        .await
    }

    async fn mark_in_flight(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let params: [&dyn ToSql; 1] = [&id];
            Self::guarded_update(conn, ACTION_MARK_IN_FLIGHT_SQL, &params, &id, "pending")
        })
        .await
    }

    async fn mark_resolved(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let params: [&dyn ToSql; 1] = [&id];
            Self::guarded_update(conn, ACTION_MARK_RESOLVED_SQL, &params, &id, "in_flight")
        })
        .await
    }

    async fn mark_failed(&self, id: &str, error: &str) -> Result<()> {
        let id = id.to_string();
        let error = error.to_string();
        self.with_conn(move |conn| {
            let params: [&dyn ToSql; 2] = [&id, &error];
            Self::guarded_update(
                conn,
                ACTION_MARK_FAILED_SQL,
                &params,
                &id,
                "pending or in_flight",
            )
        })
        .await
    }

    async fn release_for_retry(&self, id: &str, error: &str, next_attempt_at: i64) -> Result<()> {
        let id = id.to_string();
        let error = error.to_string();
        self.with_conn(move |conn| {
            let params: [&dyn ToSql; 3] = [&id, &error, &next_attempt_at];
            Self::guarded_update(conn, ACTION_RELEASE_SQL, &params, &id, "in_flight")
        })
        .await
    }

    async fn list_ordered(&self) -> Result<Vec<PendingAction>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(ACTION_LIST_ORDERED_SQL).map_err(map_sql_error)?;
            let rows = stmt
                .query_map([], map_action_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error);
            rows
        })
        .await
    }

    async fn count_unresolved(&self) -> Result<u64> {
        self.with_conn(move |conn| {
            conn.query_row(ACTION_COUNT_UNRESOLVED_SQL, [], |row| row.get::<_, i64>(0))
                .map(|count| count.max(0) as u64)
                .map_err(map_sql_error)
        })
        .await
    }

    async fn count_failed(&self) -> Result<u64> {
        self.with_conn(move |conn| {
            conn.query_row(ACTION_COUNT_FAILED_SQL, [], |row| row.get::<_, i64>(0))
                .map(|count| count.max(0) as u64)
                .map_err(map_sql_error)
        })
        .await
    }

    async fn list_failed(&self) -> Result<Vec<PendingAction>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(ACTION_LIST_FAILED_SQL).map_err(map_sql_error)?;
            let rows = stmt
                .query_map([], map_action_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error);
            rows
        })
        .await
    }

    async fn discard_all(&self) -> Result<u64> {
        self.with_conn(move |conn| {
            conn.execute(ACTION_DISCARD_SQL, []).map(|n| n as u64).map_err(map_sql_error)
        })
        .await
    }

    async fn remove_resolved(&self) -> Result<u64> {
        self.with_conn(move |conn| {
            conn.execute(ACTION_REMOVE_RESOLVED_SQL, []).map(|n| n as u64).map_err(map_sql_error)
        })
        .await
    }

    async fn recover_in_flight(&self) -> Result<u64> {
        self.with_conn(move |conn| {
            conn.execute(ACTION_RECOVER_SQL, []).map(|n| n as u64).map_err(map_sql_error)
        })
        .await
    }
}

const ACTION_INSERT_SQL: &str = "INSERT INTO pending_actions (
        id, operation, payload_json, status, attempts, last_error, created_at, next_attempt_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

const ACTION_GET_SQL: &str = "SELECT id, operation, payload_json, status, attempts, last_error, \
     created_at, next_attempt_at FROM pending_actions WHERE id = ?1";

const ACTION_PEEK_SQL: &str = "SELECT id, operation, payload_json, status, attempts, last_error, \
     created_at, next_attempt_at FROM pending_actions WHERE status = 'pending' \
     ORDER BY seq ASC LIMIT 1";

const ACTION_MARK_IN_FLIGHT_SQL: &str = "UPDATE pending_actions SET status = 'in_flight', \
     attempts = attempts + 1 WHERE id = ?1 AND status = 'pending'";

const ACTION_MARK_RESOLVED_SQL: &str = "UPDATE pending_actions SET status = 'resolved', \
     last_error = NULL WHERE id = ?1 AND status = 'in_flight'";

const ACTION_MARK_FAILED_SQL: &str = "UPDATE pending_actions SET status = 'failed', \
     last_error = ?2 WHERE id = ?1 AND status IN ('pending', 'in_flight')";

const ACTION_RELEASE_SQL: &str = "UPDATE pending_actions SET status = 'pending', \
     last_error = ?2, next_attempt_at = ?3 WHERE id = ?1 AND status = 'in_flight'";

const ACTION_LIST_ORDERED_SQL: &str = "SELECT id, operation, payload_json, status, attempts, \
     last_error, created_at, next_attempt_at FROM pending_actions ORDER BY seq ASC";

const ACTION_COUNT_UNRESOLVED_SQL: &str =
    "SELECT COUNT(*) FROM pending_actions WHERE status != 'resolved'";

const ACTION_COUNT_FAILED_SQL: &str =
    "SELECT COUNT(*) FROM pending_actions WHERE status = 'failed'";

const ACTION_LIST_FAILED_SQL: &str = "SELECT id, operation, payload_json, status, attempts, \
     last_error, created_at, next_attempt_at FROM pending_actions WHERE status = 'failed' \
     ORDER BY seq ASC";

const ACTION_DISCARD_SQL: &str = "DELETE FROM pending_actions WHERE status != 'in_flight'";

const ACTION_REMOVE_RESOLVED_SQL: &str =
    "DELETE FROM pending_actions WHERE status = 'resolved'";

const ACTION_RECOVER_SQL: &str =
    "UPDATE pending_actions SET status = 'pending' WHERE status = 'in_flight'";

fn map_action_row(row: &Row<'_>) -> rusqlite::Result<PendingAction> {
    let id: String = row.get(0)?;
    let status_raw: String = row.get(3)?;
    let status = parse_status(&id, &status_raw);

    Ok(PendingAction {
        id,
        operation: row.get(1)?,
        payload_json: row.get(2)?,
        status,
        attempts: row.get(4)?,
        last_error: row.get(5)?,
        created_at: row.get(6)?,
        next_attempt_at: row.get(7)?,
    })
}

fn parse_status(id: &str, raw: &str) -> ActionStatus {
    match ActionStatus::from_str(raw) {
        Ok(status) => status,
        Err(err) => {
            warn!(
                action_id = %id,
                raw_status = %raw,
                error = %err,
                "invalid action status returned by sqlite – defaulting to pending"
            );
            ActionStatus::Pending
        }
    }
}

fn map_sql_error(err: rusqlite::Error) -> CourierError {
    CourierError::from(InfraError::from(err))
}

fn map_join_error(err: task::JoinError) -> CourierError {
    if err.is_cancelled() {
        CourierError::Internal("action store task cancelled".into())
    } else {
        CourierError::Internal(format!("action store task panic: {err}"))
    }
}
