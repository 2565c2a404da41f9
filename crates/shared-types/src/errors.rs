//! # Error Types
//!
//! Defines error types used across modules and the chain store.

use thiserror::Error;

/// Errors raised by the persistent store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Key absent from the store.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write or commit attempted with no open batch.
    #[error("batch not started")]
    BatchNotStarted,

    /// A batch is already open for block application.
    #[error("batch already in progress")]
    BatchInProgress,

    /// Underlying engine or filesystem failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Errors returned by module handlers and lifecycle hooks.
///
/// A handler error aborts the dispatch it occurred in and reaches the
/// consensus engine unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    /// A handler failed while serving a callback.
    #[error("[{module}] {message}")]
    Handler { module: String, message: String },

    /// Store access failed inside a handler.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Input bytes could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Initialization failed before the module became ready.
    #[error("[{module}] startup failed: {message}")]
    Startup { module: String, message: String },

    /// Teardown failed.
    #[error("[{module}] shutdown failed: {message}")]
    Shutdown { module: String, message: String },

    /// The shared cancellation token fired.
    #[error("cancelled")]
    Cancelled,

    /// The consensus engine stopped with an error.
    #[error("Engine error: {0}")]
    Engine(String),
}

impl ModuleError {
    pub fn handler(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            module: module.into(),
            message: message.into(),
        }
    }

    pub fn startup(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Startup {
            module: module.into(),
            message: message.into(),
        }
    }

    pub fn shutdown(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Shutdown {
            module: module.into(),
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
