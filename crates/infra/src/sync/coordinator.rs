//! Drain coordinator for the durable action queue.
//!
//! Replays queued actions against the backend whenever connectivity allows,
//! with strict FIFO ordering, per-entry exponential backoff, and a bounded
//! retry budget. Join handles are tracked, cancellation is explicit, and
//! every backend call is wrapped in a timeout.
//!
//! Ordering contract: actions reach the backend in exact enqueue order. An
//! entry that permanently fails is skipped (it never blocks later entries)
//! but is never reordered relative to the rest of the queue. An entry that
//! is backing off keeps its position and ends the pass: replay resumes on a
//! later connectivity-confirmed tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use courier_core::ActionLog;
use courier_domain::{ConnectionQuality, Result, SyncConfig};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::adapter::BackendAdapter;
use super::control::{DrainState, SyncControl};
use super::errors::SyncError;
use crate::status::StatusPublisher;

/// Configuration for the sync coordinator.
#[derive(Debug, Clone)]
pub struct SyncCoordinatorConfig {
    /// Interval between drain polls while connectivity holds.
    pub poll_interval: Duration,
    /// Timeout for a single backend apply call.
    pub apply_timeout: Duration,
    /// Replay attempts before an entry converts to failed.
    pub max_attempts: i32,
    /// Base delay for exponential retry backoff.
    pub backoff_base: Duration,
    /// Upper bound on a single backoff delay.
    pub backoff_cap: Duration,
    /// Minimum connection quality that permits draining.
    pub drain_min_quality: ConnectionQuality,
    /// Join timeout when stopping.
    pub join_timeout: Duration,
}

impl Default for SyncCoordinatorConfig {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncCoordinatorConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            apply_timeout: config.apply_timeout(),
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_cap: Duration::from_secs(config.backoff_cap_secs),
            drain_min_quality: config.drain_min_quality,
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Context threaded through the drain loop to avoid too many arguments
/// (clippy).
struct DrainContext {
    log: Arc<ActionLog>,
    adapter: Arc<dyn BackendAdapter>,
    control: SyncControl,
    publisher: Arc<StatusPublisher>,
}

/// Sync coordinator with explicit lifecycle management.
pub struct SyncCoordinator {
    log: Arc<ActionLog>,
    adapter: Arc<dyn BackendAdapter>,
    control: SyncControl,
    publisher: Arc<StatusPublisher>,
    config: SyncCoordinatorConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl SyncCoordinator {
    /// Create a new coordinator with the given configuration.
    pub fn new(
        log: Arc<ActionLog>,
        adapter: Arc<dyn BackendAdapter>,
        control: SyncControl,
        publisher: Arc<StatusPublisher>,
        config: SyncCoordinatorConfig,
    ) -> Self {
        Self {
            log,
            adapter,
            control,
            publisher,
            config,
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Shared control cell for wiring probe transitions and publisher
    /// commands.
    pub fn control(&self) -> SyncControl {
        self.control.clone()
    }

    /// Start the coordinator, spawning the background drain loop.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(courier_domain::CourierError::Internal(
                "sync coordinator already running".to_string(),
            ));
        }

        info!("starting sync coordinator");

        self.cancellation = CancellationToken::new();

        let context = DrainContext {
            log: Arc::clone(&self.log),
            adapter: Arc::clone(&self.adapter),
            control: self.control.clone(),
            publisher: Arc::clone(&self.publisher),
        };
        let config = self.config.clone();
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            Self::drain_loop(context, config, cancel).await;
        });

        self.task_handle = Some(handle);
        info!("sync coordinator started");

        Ok(())
    }

    /// Stop the coordinator and wait for the drain loop to finish.
    ///
    /// An in-flight backend call is allowed to settle or time out before the
    /// worker exits; entries are never deleted speculatively.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<()> {
        if !self.is_running() {
            return Err(courier_domain::CourierError::Internal(
                "sync coordinator not running".to_string(),
            ));
        }

        info!("stopping sync coordinator");

        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            let join_timeout = self.config.join_timeout.max(self.config.apply_timeout);
            match tokio::time::timeout(join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(error = %e, "coordinator task panicked");
                    return Err(courier_domain::CourierError::Internal(
                        "coordinator task panicked".to_string(),
                    ));
                }
                Err(_) => {
                    warn!("coordinator task did not complete within timeout");
                    return Err(courier_domain::CourierError::Internal(
                        "coordinator task timeout".to_string(),
                    ));
                }
            }
        }

        info!("sync coordinator stopped");
        self.cancellation = CancellationToken::new();

        Ok(())
    }

    /// Returns true when a coordinator instance is active.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    /// Background drain loop.
    async fn drain_loop(
        context: DrainContext,
        config: SyncCoordinatorConfig,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("coordinator drain loop cancelled");
                    break;
                }
                _ = context.control.drain_requested() => {}
                _ = tokio::time::sleep(config.poll_interval) => {}
            }

            if context.control.quality() < config.drain_min_quality {
                debug!(quality = %context.control.quality(), "skipping drain: below minimum quality");
                continue;
            }

            let result = Self::drain(&context, &config, &cancel).await;
            context.control.set_state(DrainState::Idle);

            if let Err(e) = result {
                // Only the storage layer produces errors here; a single
                // action's replay failure never aborts the pass.
                error!(error = %e, "drain pass aborted: action log unreadable");
            }
        }
    }

    /// Replay pending entries until the queue is empty, connectivity drops,
    /// or the head entry backs off.
    async fn drain(
        context: &DrainContext,
        config: &SyncCoordinatorConfig,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let DrainContext { log, adapter, control, publisher } = context;

        if log.peek_next().await?.is_none() {
            log.purge_resolved().await?;
            return Ok(());
        }

        control.set_state(DrainState::Draining);
        info!("drain started");

        loop {
            if cancel.is_cancelled() {
                debug!("drain interrupted by shutdown");
                break;
            }

            if control.quality() < config.drain_min_quality {
                info!(quality = %control.quality(), "drain suspended: connectivity dropped");
                break;
            }

            let Some(action) = log.peek_next().await? else {
                break;
            };

            let now = Utc::now().timestamp();
            if action.next_attempt_at.is_some_and(|at| at > now) {
                debug!(action_id = %action.id, "head entry backing off; yielding");
                break;
            }

            log.mark_in_flight(&action.id).await?;

            let outcome =
                match tokio::time::timeout(config.apply_timeout, adapter.apply(&action)).await {
                    Ok(result) => result,
                    Err(_) => Err(SyncError::Timeout(config.apply_timeout)),
                };

            match outcome {
                Ok(()) => {
                    debug!(action_id = %action.id, operation = %action.operation, "action applied");
                    log.mark_resolved(&action.id).await?;
                }
                Err(err) if err.should_retry() => {
                    let attempts = action.attempts.saturating_add(1);
                    if attempts >= config.max_attempts {
                        warn!(
                            action_id = %action.id,
                            attempts,
                            error = %err,
                            "retry budget exhausted; marking failed"
                        );
                        log.mark_failed(&action.id, &err.to_string()).await?;
                    } else {
                        let delay = backoff_delay(attempts, config.backoff_base, config.backoff_cap);
                        let next_attempt_at = now + delay_secs(delay);
                        warn!(
                            action_id = %action.id,
                            attempts,
                            retry_in_secs = delay_secs(delay),
                            error = %err,
                            "retryable failure; re-queued with backoff"
                        );
                        log.release_for_retry(&action.id, &err.to_string(), next_attempt_at)
                            .await?;

                        // The head entry is now backing off; yield rather
                        // than busy-loop on it.
                        Self::settle_bookkeeping(context).await?;
                        break;
                    }
                }
                Err(err) => {
                    warn!(
                        action_id = %action.id,
                        operation = %action.operation,
                        error = %err,
                        "permanent failure; entry marked failed, drain continues"
                    );
                    log.mark_failed(&action.id, &err.to_string()).await?;
                }
            }

            Self::settle_bookkeeping(context).await?;
        }

        log.purge_resolved().await?;
        publisher.refresh().await?;
        info!("drain finished");
        Ok(())
    }

    /// Post-settle bookkeeping: publish fresh counts and honour a discard
    /// requested while the entry was in flight.
    async fn settle_bookkeeping(context: &DrainContext) -> Result<()> {
        context.publisher.refresh().await?;

        if context.control.take_discard_sweep() {
            let removed = context.log.discard_all().await?;
            info!(removed, "swept entries discarded while a replay was in flight");
            context.publisher.refresh().await?;
        }

        Ok(())
    }
}

/// Exponential backoff for the given attempt number (1-based): the base
/// delay doubles per attempt, capped.
fn backoff_delay(attempt: i32, base: Duration, cap: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).clamp(0, 8) as u32;
    let multiplier = 1u32 << shift;
    base.saturating_mul(multiplier).min(cap)
}

/// Whole seconds for persistence, rounded up so a sub-second backoff still
/// defers to a later tick.
fn delay_secs(delay: Duration) -> i64 {
    (delay.as_millis() as i64 + 999) / 1000
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("SyncCoordinator dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
