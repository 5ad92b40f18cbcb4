//! Sync infrastructure for Courier
//!
//! This module provides the replay machinery for the durable action queue:
//! - SyncError: failure classification for retry decisions
//! - SyncControl: shared state cell linking probe, coordinator and publisher
//! - BackendAdapter: outbound port for applying actions to the backend
//! - SyncCoordinator: background drain worker with ordering and backoff
//!
//! All workers have explicit lifecycle management, join handle tracking, and
//! cancellation support.

pub mod adapter;
pub mod control;
pub mod coordinator;
mod errors;

pub use adapter::{BackendAdapter, HttpBackendAdapter, HttpBackendAdapterConfig};
pub use control::{DrainState, SyncControl};
pub use coordinator::{SyncCoordinator, SyncCoordinatorConfig};
pub use errors::{SyncError, SyncErrorCategory};
