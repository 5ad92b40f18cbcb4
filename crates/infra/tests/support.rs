use std::sync::Arc;
use std::time::Duration;

use courier_domain::{ActionStatus, PendingAction};
use courier_infra::database::{DbManager, SqliteActionStore};
use tempfile::TempDir;

/// Install a test subscriber honouring `RUST_LOG` (idempotent).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    pub temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new temporary database with the schema applied.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("migrations should apply");

        Self { manager: Arc::new(manager), temp_dir }
    }

    /// Build an action store over this database.
    pub fn store(&self) -> Arc<SqliteActionStore> {
        Arc::new(SqliteActionStore::new(Arc::clone(&self.manager)))
    }

    /// Reopen the same database file through a fresh manager, simulating a
    /// process restart.
    pub fn reopen(&self) -> Arc<DbManager> {
        let db_path = self.temp_dir.path().join("test.db");
        let manager = DbManager::new(&db_path, 4).expect("db manager should reopen");
        manager.run_migrations().expect("migrations should be idempotent");
        Arc::new(manager)
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Utility helper for constructing queue entries inside tests.
pub fn make_action(id: &str, status: ActionStatus, created_at: i64) -> PendingAction {
    PendingAction {
        id: id.to_string(),
        operation: "update".to_string(),
        payload_json: "{}".to_string(),
        status,
        attempts: 0,
        last_error: None,
        created_at,
        next_attempt_at: None,
    }
}

/// Poll `predicate` until it holds or `timeout` elapses.
pub async fn wait_until<F, Fut>(timeout: Duration, mut predicate: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
