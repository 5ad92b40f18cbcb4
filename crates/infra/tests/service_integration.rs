//! End-to-end tests for the composed subsystem
//!
//! **Purpose**: exercise the full wiring (facade, log, probe transitions,
//! coordinator drain, publisher snapshots) the way a host application
//! consumes it.

#![allow(dead_code)]

#[path = "support.rs"]
mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use courier_domain::{
    Config, ConnectionQuality, CourierError, PendingAction, Result, SyncSnapshot,
};
use courier_infra::probe::ReachabilityCheck;
use courier_infra::status::SnapshotListener;
use courier_infra::sync::{BackendAdapter, SyncError};
use courier_infra::Courier;
use tempfile::TempDir;

/// Reachability check whose outcome the test flips at will.
struct SwitchableCheck {
    online: AtomicBool,
}

impl SwitchableCheck {
    fn new(online: bool) -> Arc<Self> {
        Arc::new(Self { online: AtomicBool::new(online) })
    }

    fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReachabilityCheck for SwitchableCheck {
    async fn measure(&self) -> Result<Duration> {
        if self.online.load(Ordering::SeqCst) {
            Ok(Duration::from_millis(20))
        } else {
            Err(CourierError::Network("connection refused".into()))
        }
    }
}

/// Adapter that records apply order and always succeeds.
struct RecordingAdapter {
    applied: StdMutex<Vec<String>>,
}

impl RecordingAdapter {
    fn new() -> Arc<Self> {
        Arc::new(Self { applied: StdMutex::new(Vec::new()) })
    }

    fn applied(&self) -> Vec<String> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendAdapter for RecordingAdapter {
    async fn apply(&self, action: &PendingAction) -> std::result::Result<(), SyncError> {
        self.applied.lock().unwrap().push(action.id.clone());
        Ok(())
    }
}

struct CollectingListener {
    snapshots: Arc<StdMutex<Vec<SyncSnapshot>>>,
}

#[async_trait]
impl SnapshotListener for CollectingListener {
    async fn on_snapshot(&self, snapshot: SyncSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot);
    }
}

fn test_config(temp_dir: &TempDir) -> Config {
    support::init_tracing();
    let mut config = Config::default();
    config.database.path = temp_dir.path().join("courier.db");
    config.probe.interval_secs = 3_600; // tests drive checks via check_now
    config.probe.timeout_ms = 500;
    // Drains are driven by wake events; slow polls keep tests deterministic.
    config.sync.poll_interval_secs = 3_600;
    config.sync.apply_timeout_secs = 2;
    config
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_enqueues_drain_in_order_once_connectivity_returns() {
    let temp_dir = TempDir::new().unwrap();
    let checker = SwitchableCheck::new(false);
    let adapter = RecordingAdapter::new();

    let mut courier = Courier::with_reachability_check(
        test_config(&temp_dir),
        adapter.clone(),
        checker.clone(),
    )
    .await
    .unwrap();

    let snapshots = Arc::new(StdMutex::new(Vec::new()));
    courier
        .publisher()
        .subscribe(Arc::new(CollectingListener { snapshots: snapshots.clone() }))
        .await;

    courier.start().await.unwrap();
    assert_eq!(courier.current_quality(), ConnectionQuality::Offline);

    let mut ids = Vec::new();
    for i in 0..3 {
        ids.push(courier.enqueue("update", &serde_json::json!({ "n": i })).await.unwrap());
    }
    assert_eq!(courier.publisher().snapshot().pending_count, 3);
    assert!(adapter.applied().is_empty(), "nothing replays while offline");

    // Connectivity returns.
    checker.set_online(true);
    courier.check_connectivity_now();

    let drained = support::wait_until(Duration::from_secs(5), || async {
        courier.publisher().snapshot().pending_count == 0
    })
    .await;
    assert!(drained, "queue should drain after going online");

    courier.stop().await.unwrap();

    // Backend saw the exact enqueue order.
    assert_eq!(adapter.applied(), ids);

    // Listener observed: empty initial state, pending building up offline,
    // the online transition, then the drain walking the count down.
    let pending: Vec<u64> =
        snapshots.lock().unwrap().iter().map(|s| s.pending_count).collect();
    assert_eq!(pending, vec![0, 1, 2, 3, 3, 2, 1, 0]);

    let online_flags: Vec<bool> =
        snapshots.lock().unwrap().iter().map(|s| s.is_online).collect();
    assert_eq!(online_flags, vec![false, false, false, false, true, true, true, true]);
}

#[tokio::test(flavor = "multi_thread")]
async fn queued_actions_survive_a_subsystem_restart() {
    let temp_dir = TempDir::new().unwrap();
    let checker = SwitchableCheck::new(false);
    let adapter = RecordingAdapter::new();

    {
        let courier = Courier::with_reachability_check(
            test_config(&temp_dir),
            adapter.clone(),
            checker.clone(),
        )
        .await
        .unwrap();

        courier.enqueue("create", &serde_json::json!({ "n": 1 })).await.unwrap();
        courier.enqueue("create", &serde_json::json!({ "n": 2 })).await.unwrap();
        // Never started; dropped with work still queued.
    }

    let checker = SwitchableCheck::new(true);
    let mut courier = Courier::with_reachability_check(
        test_config(&temp_dir),
        adapter.clone(),
        checker.clone(),
    )
    .await
    .unwrap();

    // Recovered counts are visible before the workers start.
    assert_eq!(courier.publisher().snapshot().pending_count, 2);

    courier.start().await.unwrap();
    let drained = support::wait_until(Duration::from_secs(5), || async {
        courier.publisher().snapshot().pending_count == 0
    })
    .await;
    assert!(drained, "recovered queue should drain");

    courier.stop().await.unwrap();
    assert_eq!(adapter.applied().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn enqueue_while_online_drains_without_manual_trigger() {
    let temp_dir = TempDir::new().unwrap();
    let checker = SwitchableCheck::new(true);
    let adapter = RecordingAdapter::new();

    let mut courier = Courier::with_reachability_check(
        test_config(&temp_dir),
        adapter.clone(),
        checker.clone(),
    )
    .await
    .unwrap();

    courier.start().await.unwrap();
    let online = support::wait_until(Duration::from_secs(2), || async {
        courier.current_quality().is_online()
    })
    .await;
    assert!(online);

    courier.enqueue("update", &serde_json::json!({})).await.unwrap();

    let drained = support::wait_until(Duration::from_secs(5), || async {
        courier.publisher().snapshot().pending_count == 0
    })
    .await;
    assert!(drained, "online enqueue should replay promptly");

    courier.stop().await.unwrap();
    assert_eq!(adapter.applied().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn discard_pending_empties_the_queue_without_replaying() {
    let temp_dir = TempDir::new().unwrap();
    let checker = SwitchableCheck::new(false);
    let adapter = RecordingAdapter::new();

    let mut courier = Courier::with_reachability_check(
        test_config(&temp_dir),
        adapter.clone(),
        checker.clone(),
    )
    .await
    .unwrap();
    courier.start().await.unwrap();

    courier.enqueue("update", &serde_json::json!({ "n": 1 })).await.unwrap();
    courier.enqueue("update", &serde_json::json!({ "n": 2 })).await.unwrap();
    assert_eq!(courier.publisher().snapshot().pending_count, 2);

    let removed = courier.publisher().discard_pending().await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(courier.publisher().snapshot().pending_count, 0);

    // Even once connectivity returns there is nothing to replay.
    checker.set_online(true);
    courier.check_connectivity_now();
    tokio::time::sleep(Duration::from_millis(300)).await;

    courier.stop().await.unwrap();
    assert!(adapter.applied().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn corrupt_storage_fails_construction_loudly() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("courier.db");
    std::fs::write(&db_path, b"definitely not a sqlite file").unwrap();

    let checker = SwitchableCheck::new(false);
    let adapter = RecordingAdapter::new();
    let mut config = test_config(&temp_dir);
    config.database.path = db_path;

    let result = Courier::with_reachability_check(config, adapter, checker).await;
    assert!(matches!(result, Err(CourierError::Storage(_))));
}
