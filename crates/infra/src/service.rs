//! Composition facade for the offline-resilience subsystem.
//!
//! `Courier` is the explicitly owned, constructed-once instance the host
//! application holds: it wires the durable log, connectivity probe, sync
//! coordinator and status publisher together, and owns their lifecycle.
//! Presentation code talks to the subsystem exclusively through `enqueue`,
//! the publisher's subscription/commands, and `check_connectivity_now`.

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::ActionLog;
use courier_domain::{Config, ConnectionQuality, Result};
use tracing::{info, warn};

use crate::database::{DbManager, SqliteActionStore};
use crate::probe::{ConnectivityProbe, HttpReachabilityCheck, QualityListener, ReachabilityCheck};
use crate::status::StatusPublisher;
use crate::sync::{BackendAdapter, SyncControl, SyncCoordinator, SyncCoordinatorConfig};

/// Fans probe transitions out to the control cell and the publisher, and
/// wakes the drain when connectivity returns.
struct QualityFanout {
    control: SyncControl,
    publisher: Arc<StatusPublisher>,
}

#[async_trait]
impl QualityListener for QualityFanout {
    async fn on_quality_changed(&self, quality: ConnectionQuality) {
        self.control.set_quality(quality);
        // Publish the transition before waking the drain so consumers see
        // the connectivity change ahead of the counts moving.
        if let Err(e) = self.publisher.refresh().await {
            warn!(error = %e, "failed to publish snapshot after quality change");
        }
        if quality.is_online() {
            self.control.request_drain();
        }
    }
}

/// Offline-resilience subsystem instance.
pub struct Courier {
    db: Arc<DbManager>,
    log: Arc<ActionLog>,
    control: SyncControl,
    publisher: Arc<StatusPublisher>,
    probe: ConnectivityProbe,
    coordinator: SyncCoordinator,
}

impl Courier {
    /// Build the subsystem against the reference HTTP reachability check.
    ///
    /// Fails loudly when the durable log is unreadable: a corrupt store must
    /// halt construction rather than silently dropping queued actions.
    pub async fn new(config: Config, adapter: Arc<dyn BackendAdapter>) -> Result<Self> {
        let checker: Arc<dyn ReachabilityCheck> = Arc::new(HttpReachabilityCheck::new(
            config.probe.endpoint_url.as_str(),
            config.probe.timeout(),
        )?);
        Self::with_reachability_check(config, adapter, checker).await
    }

    /// Build the subsystem with a custom reachability check implementation.
    pub async fn with_reachability_check(
        config: Config,
        adapter: Arc<dyn BackendAdapter>,
        checker: Arc<dyn ReachabilityCheck>,
    ) -> Result<Self> {
        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;
        db.health_check()?;

        let store = Arc::new(SqliteActionStore::new(Arc::clone(&db)));
        let log = Arc::new(ActionLog::new(store));
        log.recover_interrupted().await?;

        let control = SyncControl::new();
        let publisher = Arc::new(StatusPublisher::new(Arc::clone(&log), control.clone()));

        let mut probe = ConnectivityProbe::new(checker, config.probe.clone());
        probe.add_listener(Arc::new(QualityFanout {
            control: control.clone(),
            publisher: Arc::clone(&publisher),
        }));

        let coordinator = SyncCoordinator::new(
            Arc::clone(&log),
            adapter,
            control.clone(),
            Arc::clone(&publisher),
            SyncCoordinatorConfig::from(&config.sync),
        );

        // Surface any recovered entries in the initial snapshot.
        publisher.refresh().await?;

        Ok(Self { db, log, control, publisher, probe, coordinator })
    }

    /// Start background workers and schedule an immediate reachability
    /// check.
    pub async fn start(&mut self) -> Result<()> {
        self.probe.start().await?;
        self.coordinator.start().await?;
        self.probe.check_now();
        info!("courier subsystem started");
        Ok(())
    }

    /// Stop background workers, letting any in-flight replay settle first.
    pub async fn stop(&mut self) -> Result<()> {
        self.coordinator.stop().await?;
        self.probe.stop().await?;
        info!("courier subsystem stopped");
        Ok(())
    }

    /// Queue a mutating operation for replay and return its id.
    ///
    /// The action is durable once this returns; when connectivity is
    /// available the drain is woken immediately.
    pub async fn enqueue(&self, operation: &str, payload: &serde_json::Value) -> Result<String> {
        let id = self.log.enqueue(operation, payload).await?;
        self.publisher.refresh().await?;
        if self.control.quality().is_online() {
            self.control.request_drain();
        }
        Ok(id)
    }

    /// Observable status read-model and command surface.
    pub fn publisher(&self) -> Arc<StatusPublisher> {
        Arc::clone(&self.publisher)
    }

    /// The durable action log (counts, failed-entry inspection).
    pub fn log(&self) -> Arc<ActionLog> {
        Arc::clone(&self.log)
    }

    /// Last computed connection quality. Never blocks.
    pub fn current_quality(&self) -> ConnectionQuality {
        self.probe.current_quality()
    }

    /// Hook for host-reported network-state-change events: measure now
    /// instead of waiting for the probe interval.
    pub fn check_connectivity_now(&self) {
        self.probe.check_now();
    }

    /// Path of the backing database file.
    pub fn db_path(&self) -> &std::path::Path {
        self.db.path()
    }
}
