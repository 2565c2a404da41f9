//! Gateway domain: configuration and the JSON-RPC error model.

pub mod config;
pub mod error;

pub use config::GatewayConfig;
pub use error::{codes, ApiError, ApiResult, GatewayError};
