use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use chain_store::ChainStore;
use shared_types::{
    Account, Application, CheckTxRequest, CheckTxResponse, Event, ExecTxResult,
    FinalizeBlockRequest, FinalizeBlockResponse, Lifecycle, Module, ModuleError,
    ProcessProposalRequest, ProcessProposalResponse, QueryRequest, QueryResponse, StoreError,
    Transaction, TxBody,
};

use crate::domain::{codes, validate_shape, AccountRejection};

pub const MODULE_NAME: &str = "account";

/// Query path prefix served by this module.
pub const QUERY_PREFIX: &str = "/account/";

/// Creates accounts from `CreateAccount` transactions and serves lookups.
pub struct AccountModule {
    lifecycle: Lifecycle,
    store: Arc<ChainStore>,
}

impl AccountModule {
    pub fn new(store: Arc<ChainStore>) -> Self {
        Self {
            lifecycle: Lifecycle::new(MODULE_NAME),
            store,
        }
    }

    /// Committed account by address.
    pub fn get_account(&self, address: &str) -> Result<Account, StoreError> {
        self.store.get_account(address)
    }

    /// Reason `account` cannot be created against committed state, if any.
    fn check_new(&self, account: &Account) -> Result<Option<AccountRejection>, StoreError> {
        if let Err(rejection) = validate_shape(account) {
            return Ok(Some(rejection));
        }
        if self.store.has_account(&account.address)? {
            return Ok(Some(AccountRejection::AlreadyExists));
        }
        Ok(None)
    }
}

fn rejected(rejection: AccountRejection) -> ExecTxResult {
    ExecTxResult {
        code: rejection.code(),
        log: rejection.log().to_string(),
        ..Default::default()
    }
}

#[async_trait]
impl Application for AccountModule {
    async fn query(&self, req: &QueryRequest) -> Result<QueryResponse, ModuleError> {
        let Some(address) = req.path.strip_prefix(QUERY_PREFIX) else {
            return Ok(QueryResponse::default());
        };
        match self.store.get_account(address) {
            Ok(account) => Ok(QueryResponse {
                key: req.path.as_bytes().to_vec(),
                value: serde_json::to_vec(&account)
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

        if let TxBody::CreateAccount { account } = &tx.body {
            if let Some(rejection) = self.check_new(account)? {
                return Ok(CheckTxResponse::reject(rejection.code(), rejection.log()));
            }
        }
        Ok(CheckTxResponse::default())
    }

    async fn process_proposal(
        &self,
        req: &ProcessProposalRequest,
    ) -> Result<ProcessProposalResponse, ModuleError> {
        if req.txs.iter().any(|tx| Transaction::decode(tx).is_err()) {
            debug!(height = req.height, "proposal carries undecodable transaction");
            return Ok(ProcessProposalResponse::reject());
        }
        Ok(ProcessProposalResponse::accept())
    }

    /// Writes new accounts into the open block batch. Produces one result per
    /// transaction in the block.
    async fn finalize_block(
        &self,
        req: &FinalizeBlockRequest,
    ) -> Result<FinalizeBlockResponse, ModuleError> {
        let mut response = FinalizeBlockResponse::default();
        // Batch writes are invisible to reads until commit, so duplicates
        // within one block are tracked here.
        let mut created_in_block = HashSet::new();

        for raw in &req.txs {
            let tx = match Transaction::decode(raw) {
                Ok(tx) => tx,
                Err(e) => {
                    response.tx_results.push(ExecTxResult {
                        code: codes::UNDECODABLE,
                        log: e.to_string(),
                        ..Default::default()
                    });
                    continue;
                }
            };

            let TxBody::CreateAccount { account } = tx.body else {
                response.tx_results.push(ExecTxResult::default());
                continue;
            };

            if created_in_block.contains(&account.address) {
                response.tx_results.push(rejected(AccountRejection::AlreadyExists));
                continue;
            }
            if let Some(rejection) = self.check_new(&account)? {
                response.tx_results.push(rejected(rejection));
                continue;
            }

            let account = Account {
                created_at_height: req.height,
                ..account
            };
            self.store.store_account(&account)?;
            info!(address = %account.address, height = req.height, "account created");

            let event = Event::new("account_created")
                .with_attribute("address", account.address.clone())
                .with_attribute("height", req.height.to_string());
            response.tx_results.push(ExecTxResult {
                events: vec![event.clone()],
                ..Default::default()
            });
            response.events.push(event);
            created_in_block.insert(account.address);
        }

        Ok(response)
    }
}

impl Module for AccountModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(address: &str) -> Vec<u8> {
        Transaction::new(
            0,
            TxBody::CreateAccount {
                account: Account::new(address, "name"),
            },
        )
        .encode()
        .unwrap()
    }

    fn module() -> AccountModule {
        AccountModule::new(Arc::new(ChainStore::in_memory()))
    }

    fn block(height: u64, txs: Vec<Vec<u8>>) -> FinalizeBlockRequest {
        FinalizeBlockRequest {
            txs,
            height,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_check_tx_codes() {
        let m = module();
        let ok = m
            .check_tx(&CheckTxRequest {
                tx: create("alice"),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(ok.is_ok());

        let garbage = m
            .check_tx(&CheckTxRequest {
                tx: vec![1, 2],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(garbage.code, codes::UNDECODABLE);

        let empty = m
            .check_tx(&CheckTxRequest {
                tx: create(""),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(empty.code, codes::EMPTY_ADDRESS);
    }

    #[tokio::test]
    async fn test_finalize_requires_open_batch() {
        let m = module();
        let err = m
            .finalize_block(&block(1, vec![create("alice")]))
            .await
            .unwrap_err();
        assert_eq!(err, ModuleError::Store(StoreError::BatchNotStarted));
    }

    #[tokio::test]
    async fn test_finalize_creates_accounts_visible_after_commit() {
        let store = Arc::new(ChainStore::in_memory());
        let m = AccountModule::new(store.clone());

        store.start_batch().unwrap();
        let resp = m
            .finalize_block(&block(3, vec![create("alice"), create("alice"), vec![9]]))
            .await
            .unwrap();

        assert_eq!(resp.tx_results.len(), 3);
        assert_eq!(resp.tx_results[0].code, 0);
        assert_eq!(resp.tx_results[1].code, codes::ACCOUNT_EXISTS);
        assert_eq!(resp.tx_results[2].code, codes::UNDECODABLE);
        assert_eq!(resp.events.len(), 1);
        assert!(m.get_account("alice").unwrap_err().is_not_found());

        store.commit().unwrap();
        assert_eq!(m.get_account("alice").unwrap().created_at_height, 3);

        let again = m
            .check_tx(&CheckTxRequest {
                tx: create("alice"),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(again.code, codes::ACCOUNT_EXISTS);
    }

    #[tokio::test]
    async fn test_query_by_path() {
        let store = Arc::new(ChainStore::in_memory());
        let m = AccountModule::new(store.clone());
        store.start_batch().unwrap();
        store.store_account(&Account::new("bob", "Bob")).unwrap();
        store.commit().unwrap();

        let hit = m
            .query(&QueryRequest {
                path: "/account/bob".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let account: Account = serde_json::from_slice(&hit.value).unwrap();
        assert_eq!(account.name, "Bob");

        let other = m
            .query(&QueryRequest {
                path: "/block/1".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(other.value.is_empty());
    }

    #[tokio::test]
    async fn test_process_proposal_rejects_garbage() {
        let m = module();
        let resp = m
            .process_proposal(&ProcessProposalRequest {
                txs: vec![create("a"), vec![0xff]],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(resp, ProcessProposalResponse::reject());
    }
}
