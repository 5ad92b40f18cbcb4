//! Background connectivity monitoring with proper lifecycle management
//!
//! Periodically measures reachability and round-trip latency against the
//! backend and classifies connection quality. The monitor follows the worker
//! pattern with clean separation:
//! - `ConnectivityProbe`: lifecycle coordinator (owns the task handle)
//! - `probe_worker()`: pure async worker function (easier to test)
//! - `QualityListener`: trait for downstream event handling
//!
//! Listeners fire only on category transitions, never per measurement, so a
//! flapping link cannot produce a notification storm. A check that errors or
//! exceeds its deadline classifies as `offline`: quality degrades
//! conservatively on ambiguity.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use courier_domain::{ConnectionQuality, CourierError, ProbeConfig, Result};
use parking_lot::RwLock;
use reqwest::Method;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::http::HttpClient;

/// Interface for a single reachability measurement.
#[async_trait]
pub trait ReachabilityCheck: Send + Sync {
    /// Measure round-trip latency to the backend.
    async fn measure(&self) -> Result<Duration>;
}

/// Reachability check that issues a lightweight HTTP GET and times it.
pub struct HttpReachabilityCheck {
    client: HttpClient,
    url: String,
}

impl HttpReachabilityCheck {
    /// Build a check against the given endpoint with a bounded per-request
    /// timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl ReachabilityCheck for HttpReachabilityCheck {
    async fn measure(&self) -> Result<Duration> {
        let started = Instant::now();
        let response = self.client.send(self.client.request(Method::GET, &self.url)).await?;

        if !response.status().is_success() {
            return Err(CourierError::Network(format!(
                "reachability endpoint returned {}",
                response.status()
            )));
        }

        Ok(started.elapsed())
    }
}

/// Listener for connection quality changes
///
/// Called only when the classification actually changes category, not on
/// every measurement.
#[async_trait]
pub trait QualityListener: Send + Sync {
    /// Called with the new quality after a category transition.
    async fn on_quality_changed(&self, quality: ConnectionQuality);
}

/// Classify a measured round-trip latency into a quality bucket.
pub fn classify_latency(latency: Duration, config: &ProbeConfig) -> ConnectionQuality {
    let millis = latency.as_millis() as u64;
    if millis < config.excellent_below_ms {
        ConnectionQuality::Excellent
    } else if millis < config.good_below_ms {
        ConnectionQuality::Good
    } else {
        ConnectionQuality::Poor
    }
}

/// Connectivity monitor with explicit lifecycle.
///
/// `current_quality()` never blocks: it reads the last computed
/// classification, which starts at `offline` until a measurement proves
/// otherwise.
pub struct ConnectivityProbe {
    checker: Arc<dyn ReachabilityCheck>,
    listeners: Vec<Arc<dyn QualityListener>>,
    config: ProbeConfig,
    current: Arc<RwLock<ConnectionQuality>>,
    check_now: Arc<Notify>,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl ConnectivityProbe {
    /// Create a new probe over the given reachability check.
    pub fn new(checker: Arc<dyn ReachabilityCheck>, config: ProbeConfig) -> Self {
        Self {
            checker,
            listeners: Vec::new(),
            config,
            current: Arc::new(RwLock::new(ConnectionQuality::Offline)),
            check_now: Arc::new(Notify::new()),
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Register a transition listener. Must be called before `start()`.
    pub fn add_listener(&mut self, listener: Arc<dyn QualityListener>) {
        self.listeners.push(listener);
    }

    /// Last computed quality classification. Never blocks.
    pub fn current_quality(&self) -> ConnectionQuality {
        *self.current.read()
    }

    /// Request an immediate measurement, ahead of the interval timer.
    ///
    /// Hook for host-reported network-state-change events.
    pub fn check_now(&self) {
        self.check_now.notify_one();
    }

    /// Start background monitoring.
    pub async fn start(&mut self) -> Result<()> {
        if self.task_handle.is_some() {
            return Err(CourierError::Internal("connectivity probe already running".to_string()));
        }

        self.cancellation = CancellationToken::new();

        let checker = Arc::clone(&self.checker);
        let listeners = self.listeners.clone();
        let config = self.config.clone();
        let current = Arc::clone(&self.current);
        let check_now = Arc::clone(&self.check_now);
        let cancel = self.cancellation.clone();

        info!(
            interval_secs = config.interval_secs,
            timeout_ms = config.timeout_ms,
            "starting connectivity probe"
        );

        let handle = tokio::spawn(async move {
            probe_worker(checker, listeners, config, current, check_now, cancel).await;
        });

        self.task_handle = Some(handle);
        Ok(())
    }

    /// Stop background monitoring.
    ///
    /// Signals the worker task to stop and waits for it to complete, with a
    /// bounded join timeout.
    pub async fn stop(&mut self) -> Result<()> {
        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .map_err(|_| {
                    CourierError::Internal("connectivity probe shutdown timeout".to_string())
                })?
                .map_err(|e| CourierError::Internal(format!("task join failed: {e}")))?;
        }

        info!("connectivity probe stopped");
        Ok(())
    }

    /// Check if the probe is currently running.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some() && !self.cancellation.is_cancelled()
    }
}

impl Drop for ConnectivityProbe {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("ConnectivityProbe dropped while running; cancelling worker");
            self.cancellation.cancel();
        }
    }
}

/// Pure async worker function for connectivity monitoring.
///
/// Separated from `ConnectivityProbe` for testability.
async fn probe_worker(
    checker: Arc<dyn ReachabilityCheck>,
    listeners: Vec<Arc<dyn QualityListener>>,
    config: ProbeConfig,
    current: Arc<RwLock<ConnectionQuality>>,
    check_now: Arc<Notify>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("connectivity probe worker shutting down");
                break;
            }
            _ = check_now.notified() => {
                run_check(&checker, &listeners, &config, &current).await;
            }
            _ = tokio::time::sleep(config.interval()) => {
                run_check(&checker, &listeners, &config, &current).await;
            }
        }
    }
}

async fn run_check(
    checker: &Arc<dyn ReachabilityCheck>,
    listeners: &[Arc<dyn QualityListener>],
    config: &ProbeConfig,
    current: &Arc<RwLock<ConnectionQuality>>,
) {
    let measured = tokio::time::timeout(config.timeout(), checker.measure()).await;

    let new_quality = match measured {
        Ok(Ok(latency)) => {
            debug!(latency_ms = latency.as_millis() as u64, "reachability check succeeded");
            classify_latency(latency, config)
        }
        Ok(Err(e)) => {
            debug!(error = %e, "reachability check failed");
            ConnectionQuality::Offline
        }
        Err(_) => {
            debug!(timeout_ms = config.timeout_ms, "reachability check timed out");
            ConnectionQuality::Offline
        }
    };

    let previous = {
        let mut guard = current.write();
        let previous = *guard;
        *guard = new_quality;
        previous
    };

    // Only notify on category transitions.
    if new_quality != previous {
        info!(
            previous_quality = %previous,
            new_quality = %new_quality,
            "connection quality changed"
        );

        for listener in listeners {
            listener.on_quality_changed(new_quality).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct ScriptedCheck {
        results: Mutex<Vec<Result<Duration>>>,
    }

    impl ScriptedCheck {
        fn new(results: Vec<Result<Duration>>) -> Self {
            Self { results: Mutex::new(results) }
        }
    }

    #[async_trait]
    impl ReachabilityCheck for ScriptedCheck {
        async fn measure(&self) -> Result<Duration> {
            let mut results = self.results.lock().unwrap();
            if results.is_empty() {
                Ok(Duration::from_millis(10))
            } else {
                results.remove(0)
            }
        }
    }

    struct RecordingListener {
        transitions: Arc<Mutex<Vec<ConnectionQuality>>>,
    }

    impl RecordingListener {
        fn new() -> (Self, Arc<Mutex<Vec<ConnectionQuality>>>) {
            let transitions = Arc::new(Mutex::new(Vec::new()));
            (Self { transitions: transitions.clone() }, transitions)
        }
    }

    #[async_trait]
    impl QualityListener for RecordingListener {
        async fn on_quality_changed(&self, quality: ConnectionQuality) {
            self.transitions.lock().unwrap().push(quality);
        }
    }

    fn fast_config() -> ProbeConfig {
        ProbeConfig {
            endpoint_url: "http://unused.invalid".into(),
            interval_secs: 3_600, // only check_now drives tests
            timeout_ms: 200,
            excellent_below_ms: 150,
            good_below_ms: 500,
        }
    }

    #[test]
    fn latency_buckets_classify_as_configured() {
        let config = fast_config();
        assert_eq!(classify_latency(Duration::from_millis(10), &config), ConnectionQuality::Excellent);
        assert_eq!(classify_latency(Duration::from_millis(149), &config), ConnectionQuality::Excellent);
        assert_eq!(classify_latency(Duration::from_millis(150), &config), ConnectionQuality::Good);
        assert_eq!(classify_latency(Duration::from_millis(499), &config), ConnectionQuality::Good);
        assert_eq!(classify_latency(Duration::from_millis(2_000), &config), ConnectionQuality::Poor);
    }

    #[tokio::test]
    async fn initial_quality_is_offline() {
        let checker = Arc::new(ScriptedCheck::new(vec![]));
        let probe = ConnectivityProbe::new(checker, fast_config());
        assert_eq!(probe.current_quality(), ConnectionQuality::Offline);
    }

    #[tokio::test]
    async fn check_now_triggers_immediate_transition() {
        let checker = Arc::new(ScriptedCheck::new(vec![Ok(Duration::from_millis(10))]));
        let (listener, transitions) = RecordingListener::new();

        let mut probe = ConnectivityProbe::new(checker, fast_config());
        probe.add_listener(Arc::new(listener));
        probe.start().await.unwrap();

        probe.check_now();
        tokio::time::sleep(Duration::from_millis(100)).await;

        probe.stop().await.unwrap();

        assert_eq!(probe.current_quality(), ConnectionQuality::Excellent);
        assert_eq!(transitions.lock().unwrap().clone(), vec![ConnectionQuality::Excellent]);
    }

    #[tokio::test]
    async fn repeated_measurements_in_same_bucket_notify_once() {
        let checker = Arc::new(ScriptedCheck::new(vec![
            Ok(Duration::from_millis(200)),
            Ok(Duration::from_millis(300)),
            Ok(Duration::from_millis(250)),
        ]));
        let (listener, transitions) = RecordingListener::new();

        let mut probe = ConnectivityProbe::new(checker, fast_config());
        probe.add_listener(Arc::new(listener));
        probe.start().await.unwrap();

        for _ in 0..3 {
            probe.check_now();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        probe.stop().await.unwrap();

        // Three good-bucket measurements, a single transition event.
        assert_eq!(transitions.lock().unwrap().clone(), vec![ConnectionQuality::Good]);
    }

    #[tokio::test]
    async fn check_failure_degrades_to_offline() {
        let checker = Arc::new(ScriptedCheck::new(vec![
            Ok(Duration::from_millis(10)),
            Err(CourierError::Network("connection refused".into())),
        ]));
        let (listener, transitions) = RecordingListener::new();

        let mut probe = ConnectivityProbe::new(checker, fast_config());
        probe.add_listener(Arc::new(listener));
        probe.start().await.unwrap();

        probe.check_now();
        tokio::time::sleep(Duration::from_millis(50)).await;
        probe.check_now();
        tokio::time::sleep(Duration::from_millis(50)).await;

        probe.stop().await.unwrap();

        assert_eq!(
            transitions.lock().unwrap().clone(),
            vec![ConnectionQuality::Excellent, ConnectionQuality::Offline]
        );
        assert_eq!(probe.current_quality(), ConnectionQuality::Offline);
    }

    #[tokio::test]
    async fn start_and_stop_lifecycle() {
        let checker = Arc::new(ScriptedCheck::new(vec![]));
        let mut probe = ConnectivityProbe::new(checker, fast_config());

        assert!(!probe.is_running());

        probe.start().await.unwrap();
        assert!(probe.is_running());

        // Can't start twice
        assert!(probe.start().await.is_err());

        probe.stop().await.unwrap();
        assert!(!probe.is_running());
    }
}
