//! JSON-RPC method table. Each method is a thin adapter onto one module.

use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use cc_01_account::AccountModule;
use cc_02_chain::ChainModule;
use cc_03_validator::ValidatorModule;
use cc_05_storage::StorageModule;
use cc_06_system::SystemModule;
use shared_types::{tx_hash_hex, TxBroadcaster};

use crate::domain::error::{ApiError, ApiResult};

/// Handles to the modules the gateway serves.
#[derive(Clone)]
pub struct AppState {
    pub account: Arc<AccountModule>,
    pub chain: Arc<ChainModule>,
    pub validator: Arc<ValidatorModule>,
    pub storage: Arc<StorageModule>,
    pub system: Arc<SystemModule>,
    pub broadcaster: Arc<dyn TxBroadcaster>,
}

/// Every method `route_method` answers.
pub const METHODS: &[&str] = &[
    "account_getAccount",
    "chain_getBlock",
    "chain_getTransaction",
    "chain_sendTransaction",
    "validator_getValidators",
    "validator_getValidator",
    "storage_upload",
    "storage_download",
    "system_getHealth",
    "system_getStatus",
];

/// Route a JSON-RPC method to its module.
pub async fn route_method(state: &AppState, method: &str, params: Option<&Value>) -> ApiResult<Value> {
    match method {
        // Account
        "account_getAccount" => {
            let address = parse_non_empty(params, 0, "address")?;
            let account = state
                .account
                .get_account(&address)
                .map_err(|e| ApiError::from_store(e, format!("account {address}")))?;
            to_value(&account)
        }

        // Chain
        "chain_getBlock" => {
            let height: u64 = parse_param_optional(params, 0)?.unwrap_or(0);
            let block = state
                .chain
                .get_block(height)
                .map_err(|e| ApiError::from_store(e, format!("block {height}")))?;
            to_value(&block)
        }
        "chain_getTransaction" => {
            let hash = parse_non_empty(params, 0, "hash")?;
            let record = state
                .chain
                .get_transaction(&hash)
                .map_err(|e| ApiError::from_store(e, format!("transaction {hash}")))?;
            to_value(&record)
        }
        "chain_sendTransaction" => {
            let tx_hex = parse_non_empty(params, 0, "tx")?;
            let tx = hex::decode(tx_hex.trim_start_matches("0x"))?;
            let hash = tx_hash_hex(&tx);
            let resp = state.broadcaster.broadcast_tx(tx).await?;
            Ok(json!({ "hash": hash, "code": resp.code, "log": resp.log }))
        }

        // Validator
        "validator_getValidators" => {
            let validators = state
                .validator
                .list_validators()
                .map_err(|e| ApiError::internal(e.to_string()))?;
            to_value(&validators)
        }
        "validator_getValidator" => {
            let pub_key = parse_non_empty(params, 0, "pub_key")?;
            let validator = state
                .validator
                .get_validator(&pub_key)
                .map_err(|e| ApiError::from_store(e, format!("validator {pub_key}")))?;
            to_value(&validator)
        }

        // Storage
        "storage_upload" => {
            let data_hex = parse_non_empty(params, 0, "data")?;
            let data = hex::decode(data_hex.trim_start_matches("0x"))?;
            let cid = state.storage.upload(&data)?;
            Ok(json!({ "cid": cid }))
        }
        "storage_download" => {
            let cid = parse_non_empty(params, 0, "cid")?;
            let data = state.storage.download(&cid)?;
            Ok(json!({ "data": hex::encode(data) }))
        }

        // System
        "system_getHealth" => to_value(&state.system.health()),
        "system_getStatus" => {
            let status = state
                .system
                .node_status()
                .map_err(|e| ApiError::internal(e.to_string()))?;
            to_value(&status)
        }

        _ => Err(ApiError::method_not_found(method)),
    }
}

fn to_value<T: Serialize>(value: &T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|e| ApiError::internal(e.to_string()))
}

fn param_at(params: Option<&Value>, index: usize) -> Option<&Value> {
    params.and_then(|p| {
        if p.is_array() {
            p.get(index)
        } else if index == 0 {
            Some(p)
        } else {
            None
        }
    })
}

/// Parse a required parameter from the params array.
fn parse_param<T: serde::de::DeserializeOwned>(params: Option<&Value>, index: usize) -> ApiResult<T> {
    let param = param_at(params, index)
        .ok_or_else(|| ApiError::invalid_params(format!("missing parameter at index {}", index)))?;

    serde_json::from_value(param.clone())
        .map_err(|e| ApiError::invalid_params(format!("invalid parameter at index {}: {}", index, e)))
}

/// An optional parameter: absent or null yields `None`, anything else must parse.
fn parse_param_optional<T: serde::de::DeserializeOwned>(
    params: Option<&Value>,
    index: usize,
) -> ApiResult<Option<T>> {
    match param_at(params, index) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => parse_param(params, index).map(Some),
    }
}

/// A required string parameter that must not be blank.
fn parse_non_empty(params: Option<&Value>, index: usize, name: &str) -> ApiResult<String> {
    let value: String = parse_param(params, index)?;
    if value.trim().is_empty() {
        return Err(ApiError::invalid_params(format!("{name} is empty")));
    }
    Ok(value)
}
