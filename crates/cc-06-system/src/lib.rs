//! # System Module (cc-06)
//!
//! Node health (every tracked module running) and node status (chain id,
//! height, app hash, version, uptime) for the gateway.

pub mod service;

pub use service::{HealthReport, ModuleHealth, NodeStatus, SystemModule, MODULE_NAME};
