//! Connectivity probing and quality classification

pub mod monitor;

pub use monitor::{ConnectivityProbe, HttpReachabilityCheck, QualityListener, ReachabilityCheck};
