//! Configuration loader
//!
//! Loads subsystem configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the required variables are missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports TOML and JSON formats
//!
//! ## Environment Variables
//! - `COURIER_DB_PATH`: Database file path (required for env loading)
//! - `COURIER_PROBE_URL`: Reachability endpoint (required for env loading)
//! - `COURIER_DB_POOL_SIZE`: Connection pool size
//! - `COURIER_PROBE_INTERVAL_SECS`: Seconds between reachability checks
//! - `COURIER_SYNC_POLL_INTERVAL_SECS`: Seconds between drain polls
//! - `COURIER_SYNC_MAX_ATTEMPTS`: Retry budget per action

use std::path::{Path, PathBuf};

use courier_domain::{Config, CourierError, Result};
use tracing::{debug, info};

const FILE_CANDIDATES: &[&str] = &["courier.toml", "courier.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `CourierError::Config` if configuration cannot be loaded from
/// either source, the file format is invalid, or a variable fails to parse.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            info!("configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            debug!(error = ?e, "environment configuration incomplete, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// `COURIER_DB_PATH` and `COURIER_PROBE_URL` must be present; the remaining
/// variables override defaults when set.
pub fn load_from_env() -> Result<Config> {
    let db_path = require_env("COURIER_DB_PATH")?;
    let probe_url = require_env("COURIER_PROBE_URL")?;

    let mut config = Config::default();
    config.database.path = PathBuf::from(db_path);
    config.probe.endpoint_url = probe_url;

    if let Some(pool_size) = optional_env("COURIER_DB_POOL_SIZE")? {
        config.database.pool_size = pool_size;
    }
    if let Some(interval) = optional_env("COURIER_PROBE_INTERVAL_SECS")? {
        config.probe.interval_secs = interval;
    }
    if let Some(interval) = optional_env("COURIER_SYNC_POLL_INTERVAL_SECS")? {
        config.sync.poll_interval_secs = interval;
    }
    if let Some(attempts) = optional_env("COURIER_SYNC_MAX_ATTEMPTS")? {
        config.sync.max_attempts = attempts;
    }

    Ok(config)
}

/// Load configuration from a file
///
/// When `path` is `None`, probes the default candidates in the working
/// directory.
pub fn load_from_file(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => probe_default_paths().ok_or_else(|| {
            CourierError::Config(format!(
                "no configuration file found (tried: {})",
                FILE_CANDIDATES.join(", ")
            ))
        })?,
    };

    let raw = std::fs::read_to_string(&path).map_err(|e| {
        CourierError::Config(format!("failed to read {}: {e}", path.display()))
    })?;

    let config = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&raw)
            .map_err(|e| CourierError::Config(format!("invalid JSON in {}: {e}", path.display())))?
    } else {
        toml::from_str(&raw)
            .map_err(|e| CourierError::Config(format!("invalid TOML in {}: {e}", path.display())))?
    };

    info!(path = %path.display(), "configuration loaded from file");
    Ok(config)
}

fn probe_default_paths() -> Option<PathBuf> {
    FILE_CANDIDATES.iter().map(PathBuf::from).find(|candidate| candidate.is_file())
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| CourierError::Config(format!("{name} is not set")))
}

fn optional_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| CourierError::Config(format!("{name} has an invalid value: {raw}"))),
        Err(_) => Ok(None),
    }
}
