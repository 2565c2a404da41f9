//! # Storage Module (cc-05)
//!
//! Content-addressed blob storage in the node-local store. Files are keyed
//! by the lowercase hex SHA-256 of their bytes, so uploads are idempotent.
//! Nothing here is part of consensus state; the module registers for no
//! callbacks and is reached only through the gateway.

pub mod service;

pub use service::{StorageError, StorageModule, DEFAULT_MAX_FILE_SIZE, MODULE_NAME};
