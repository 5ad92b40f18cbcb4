//! Observable status read-model

pub mod publisher;

pub use publisher::{SnapshotListener, StatusPublisher, SubscriptionId};
