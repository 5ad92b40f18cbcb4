//! Domain constants and default tuning values

/// Default interval between reachability probes, in seconds.
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;

/// Deadline for a single reachability check, in milliseconds. A check that
/// exceeds this counts as a failure, not as degraded quality.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3_000;

/// Round-trip latency below which quality classifies as excellent.
pub const DEFAULT_EXCELLENT_BELOW_MS: u64 = 150;

/// Round-trip latency below which quality classifies as good.
pub const DEFAULT_GOOD_BELOW_MS: u64 = 500;

/// Default interval between drain polls while connectivity holds, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Default timeout for a single backend apply call, in seconds.
pub const DEFAULT_APPLY_TIMEOUT_SECS: u64 = 30;

/// Retry budget: replay attempts before an entry converts to failed.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Base delay for exponential retry backoff, in milliseconds.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Upper bound on a single retry backoff delay, in seconds.
pub const DEFAULT_BACKOFF_CAP_SECS: u64 = 60;

/// Maximum stored length of a persisted failure reason.
pub const MAX_ERROR_REASON_LEN: usize = 256;

/// Default database connection pool size.
pub const DEFAULT_DB_POOL_SIZE: u32 = 4;
