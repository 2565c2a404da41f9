use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use chain_store::ChainStore;
use shared_types::{
    Application, CheckTxRequest, CheckTxResponse, Event, FinalizeBlockRequest,
    FinalizeBlockResponse, InitChainRequest, InitChainResponse, Lifecycle, Module, ModuleError,
    ProcessProposalRequest, ProcessProposalResponse, QueryRequest, QueryResponse, StoreError,
    Transaction, TxBody, Validator, ValidatorUpdate,
};

pub const MODULE_NAME: &str = "validator";

/// CheckTx codes owned by this module.
pub mod codes {
    pub const UNDECODABLE: u32 = 1;
    pub const NEGATIVE_POWER: u32 = 4;
    pub const EMPTY_PUB_KEY: u32 = 5;
}

/// Validates an `UpdateValidator` body, returning the rejection code and log.
pub fn validate_update(pub_key: &str, power: i64) -> Result<(), (u32, &'static str)> {
    if pub_key.trim().is_empty() {
        return Err((codes::EMPTY_PUB_KEY, "validator public key is empty"));
    }
    if power < 0 {
        return Err((codes::NEGATIVE_POWER, "validator power is negative"));
    }
    Ok(())
}

/// Keeps the validator set in `validator/` records and reports power changes
/// back to the consensus engine.
pub struct ValidatorModule {
    lifecycle: Lifecycle,
    store: Arc<ChainStore>,
}

impl ValidatorModule {
    pub fn new(store: Arc<ChainStore>) -> Self {
        Self {
            lifecycle: Lifecycle::new(MODULE_NAME),
            store,
        }
    }

    pub fn get_validator(&self, pub_key: &str) -> Result<Validator, StoreError> {
        self.store.get_validator(pub_key)
    }

    pub fn list_validators(&self) -> Result<Vec<Validator>, StoreError> {
        self.store.list_validators()
    }

    fn apply_update(&self, pub_key: &str, power: i64) -> Result<(), StoreError> {
        if power == 0 {
            return self.store.remove_validator(pub_key);
        }
        let name = match self.store.get_validator(pub_key) {
            Ok(existing) => existing.name,
            Err(e) if e.is_not_found() => String::new(),
            Err(e) => return Err(e),
        };
        self.store.store_validator(&Validator {
            pub_key: pub_key.to_string(),
            power,
            name,
        })
    }
}

#[async_trait]
impl Application for ValidatorModule {
    async fn query(&self, req: &QueryRequest) -> Result<QueryResponse, ModuleError> {
        let Some(pub_key) = req.path.strip_prefix("/validator/") else {
            return Ok(QueryResponse::default());
        };
        match self.store.get_validator(pub_key) {
            Ok(validator) => Ok(QueryResponse {
                key: req.path.as_bytes().to_vec(),
                value: serde_json::to_vec(&validator)
                    .map_err(|e| ModuleError::handler(MODULE_NAME, e.to_string()))?,
                height: self.store.last_height()?,
                ..Default::default()
            }),
            Err(e) if e.is_not_found() => Ok(QueryResponse::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn check_tx(&self, req: &CheckTxRequest) -> Result<CheckTxResponse, ModuleError> {
        let tx = match Transaction::decode(&req.tx) {
            Ok(tx) => tx,
            Err(e) => return Ok(CheckTxResponse::reject(codes::UNDECODABLE, e.to_string())),
        };
        if let TxBody::UpdateValidator { pub_key, power } = &tx.body {
            if let Err((code, log)) = validate_update(pub_key, *power) {
                return Ok(CheckTxResponse::reject(code, log));
            }
        }
        Ok(CheckTxResponse::default())
    }

    async fn init_chain(&self, req: &InitChainRequest) -> Result<InitChainResponse, ModuleError> {
        for update in &req.validators {
            self.apply_update(&update.pub_key, update.power)?;
        }
        info!(validators = req.validators.len(), "genesis validator set stored");
        Ok(InitChainResponse {
            validators: req.validators.clone(),
            app_hash: Vec::new(),
        })
    }

    async fn process_proposal(
        &self,
        req: &ProcessProposalRequest,
    ) -> Result<ProcessProposalResponse, ModuleError> {
        for raw in &req.txs {
            if let Ok(Transaction {
                body: TxBody::UpdateValidator { pub_key, power },
                ..
            }) = Transaction::decode(raw)
            {
                if validate_update(&pub_key, power).is_err() {
                    return Ok(ProcessProposalResponse::reject());
                }
            }
        }
        Ok(ProcessProposalResponse::accept())
    }

    /// Applies `UpdateValidator` transactions to the block batch; power 0
    /// removes the validator.
    async fn finalize_block(
        &self,
        req: &FinalizeBlockRequest,
    ) -> Result<FinalizeBlockResponse, ModuleError> {
        let mut response = FinalizeBlockResponse::default();
        for raw in &req.txs {
            let Ok(Transaction {
                body: TxBody::UpdateValidator { pub_key, power },
                ..
            }) = Transaction::decode(raw)
            else {
                continue;
            };
            if validate_update(&pub_key, power).is_err() {
                continue;
            }

            self.apply_update(&pub_key, power)?;
            info!(pub_key = %pub_key, power, height = req.height, "validator updated");
            response.events.push(
                Event::new("validator_updated")
                    .with_attribute("pub_key", pub_key.clone())
                    .with_attribute("power", power.to_string()),
            );
            response.validator_updates.push(ValidatorUpdate { pub_key, power });
        }
        Ok(response)
    }
}

impl Module for ValidatorModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
}
