//! Block byte cap enforced by the chain module through the router.

use std::sync::Arc;

use cc_02_chain::domain::codes;
use cc_02_chain::{ChainConfig, ChainModule};
use chain_store::ChainStore;
use node_runtime::{Registration, Router};
use shared_types::{
    Application, CallbackKind, CheckTxKind, CheckTxRequest, Module, PrepareProposalRequest,
    ProcessProposalRequest, ProposalStatus,
};

const MAX_TX_BYTES: i64 = 10;

fn router() -> Router {
    let chain: Arc<dyn Module> = Arc::new(ChainModule::new(
        Arc::new(ChainStore::in_memory()),
        ChainConfig {
            max_tx_bytes: MAX_TX_BYTES,
            ..Default::default()
        },
    ));
    Registration::new()
        .register(CallbackKind::CheckTx, vec![chain.clone()])
        .register(CallbackKind::PrepareProposal, vec![chain.clone()])
        .register(CallbackKind::ProcessProposal, vec![chain])
        .build()
}

#[tokio::test]
async fn test_oversized_leading_tx_cannot_reach_a_block() {
    let router = router();
    let txs = vec![vec![1u8; 100], vec![2u8; 5]];

    // The chain module trims everything; the empty answer leaves the
    // engine's list in place.
    let prepared = router
        .prepare_proposal(&PrepareProposalRequest {
            txs: txs.clone(),
            max_tx_bytes: MAX_TX_BYTES,
            height: 1,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(prepared.txs, txs);

    let processed = router
        .process_proposal(&ProcessProposalRequest {
            txs: prepared.txs,
            height: 1,
            hash: vec![1; 32],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(processed.status, ProposalStatus::Reject);
}

#[tokio::test]
async fn test_oversized_tx_rejected_at_admission() {
    let router = router();
    let resp = router
        .check_tx(&CheckTxRequest {
            tx: vec![0u8; 100],
            kind: CheckTxKind::New,
        })
        .await
        .unwrap();
    assert_eq!(resp.code, codes::TX_TOO_LARGE);

    let fits = router
        .check_tx(&CheckTxRequest {
            tx: vec![0u8; 5],
            kind: CheckTxKind::New,
        })
        .await
        .unwrap();
    assert!(fits.is_ok());
}

#[tokio::test]
async fn test_proposal_within_cap_is_accepted() {
    let router = router();
    let processed = router
        .process_proposal(&ProcessProposalRequest {
            txs: vec![vec![0u8; 5], vec![0u8; 5]],
            height: 1,
            hash: vec![1; 32],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(processed.status, ProposalStatus::Accept);
}
