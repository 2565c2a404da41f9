//! # API Gateway (cc-07)
//!
//! JSON-RPC 2.0 over HTTP for the Cadence modules.
//!
//! ## Endpoints
//!
//! - `POST /` - JSON-RPC, single request or batch
//! - `GET /health` - per-module status, 503 while any module is not running
//! - `GET /metrics` - Prometheus text format
//!
//! ## Methods
//!
//! | Method | Params | Result |
//! |--------|--------|--------|
//! | `account_getAccount` | `[address]` | account |
//! | `chain_getBlock` | `[height]` (0 = latest) | block meta |
//! | `chain_getTransaction` | `[hash_hex]` | tx record |
//! | `chain_sendTransaction` | `[tx_hex]` | `{ hash, code, log }` |
//! | `validator_getValidators` | `[]` | validator list |
//! | `validator_getValidator` | `[pub_key]` | validator |
//! | `storage_upload` | `[data_hex]` | `{ cid }` |
//! | `storage_download` | `[cid]` | `{ data }` |
//! | `system_getHealth` | `[]` | `{ healthy, modules }` |
//! | `system_getStatus` | `[]` | node status |
//!
//! Missing records answer `-32001`, bad or blank params `-32602`, unknown
//! methods `-32601`.

pub mod domain;
pub mod router;
pub mod service;

pub use domain::{codes, ApiError, ApiResult, GatewayConfig, GatewayError};
pub use router::{route_method, AppState, METHODS};
pub use service::{GatewayModule, MODULE_NAME};
