//! # State Sync Module (cc-04)
//!
//! Snapshots application state every `snapshot_interval` heights and serves
//! or restores those snapshots through the snapshot callbacks.
//!
//! A snapshot payload is the bincode-encoded list of account, validator and
//! chain metadata records, split into `chunk_size` chunks. Its hash is the
//! SHA-256 of the whole payload and its metadata carries the app hash at
//! the snapshot height.

pub mod domain;
pub mod service;

pub use domain::SNAPSHOT_FORMAT;
pub use service::{StateSyncConfig, StateSyncModule, MODULE_NAME};
