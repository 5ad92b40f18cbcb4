//! Configuration structures
//!
//! Plain serde structs; loading from environment or file lives in the infra
//! crate. Every field has a default so partial config files stay valid.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::types::ConnectionQuality;

/// Top-level subsystem configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Durable action log storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file.
    pub path: PathBuf,
    /// Connection pool size.
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("courier.db"), pool_size: constants::DEFAULT_DB_POOL_SIZE }
    }
}

/// Connectivity probe configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeConfig {
    /// Endpoint used for lightweight reachability checks.
    pub endpoint_url: String,
    /// Seconds between periodic checks.
    pub interval_secs: u64,
    /// Deadline for a single check, in milliseconds.
    pub timeout_ms: u64,
    /// Latency bucket boundary for `excellent`, in milliseconds.
    pub excellent_below_ms: u64,
    /// Latency bucket boundary for `good`, in milliseconds.
    pub good_below_ms: u64,
}

impl ProbeConfig {
    /// Probe deadline as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Probe interval as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "http://127.0.0.1:8080/health".to_string(),
            interval_secs: constants::DEFAULT_PROBE_INTERVAL_SECS,
            timeout_ms: constants::DEFAULT_PROBE_TIMEOUT_MS,
            excellent_below_ms: constants::DEFAULT_EXCELLENT_BELOW_MS,
            good_below_ms: constants::DEFAULT_GOOD_BELOW_MS,
        }
    }
}

/// Drain and retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// Seconds between drain polls while connectivity holds.
    pub poll_interval_secs: u64,
    /// Timeout for a single backend apply call, in seconds.
    pub apply_timeout_secs: u64,
    /// Replay attempts before an entry converts to failed.
    pub max_attempts: i32,
    /// Base delay for exponential retry backoff, in milliseconds.
    pub backoff_base_ms: u64,
    /// Upper bound on a single backoff delay, in seconds.
    pub backoff_cap_secs: u64,
    /// Minimum connection quality that permits automatic draining.
    ///
    /// Policy knob: `poor` (the default) drains on any reachable connection;
    /// raising it to `good` defers replay until the link improves.
    pub drain_min_quality: ConnectionQuality,
}

impl SyncConfig {
    /// Drain poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Backend apply timeout as a `Duration`.
    pub fn apply_timeout(&self) -> Duration {
        Duration::from_secs(self.apply_timeout_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: constants::DEFAULT_POLL_INTERVAL_SECS,
            apply_timeout_secs: constants::DEFAULT_APPLY_TIMEOUT_SECS,
            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: constants::DEFAULT_BACKOFF_BASE_MS,
            backoff_cap_secs: constants::DEFAULT_BACKOFF_CAP_SECS,
            drain_min_quality: ConnectionQuality::Poor,
        }
    }
}
