//! # Chain Module (cc-02)
//!
//! Block and transaction index plus the app hash every replica agrees on.
//!
//! | Callback | Behaviour |
//! |----------|-----------|
//! | Info | last committed height and app hash |
//! | InitChain | records chain id, returns the genesis app hash |
//! | CheckTx | rejects a tx larger than the configured `max_tx_bytes` (6) |
//! | PrepareProposal | trims the tx list to `max_tx_bytes` |
//! | ProcessProposal | rejects out-of-sequence heights, empty block hashes and payloads over `max_tx_bytes` |
//! | FinalizeBlock | writes `block/` and `tx/` records, chains the app hash |
//! | ExtendVote / VerifyVoteExtension | height-stamped extension |
//! | Commit | retain height from `retain_blocks` |
//! | Query | `/block/<height>`, `/tx/<hash>` as JSON |

pub mod domain;
pub mod service;

pub use service::{ChainConfig, ChainModule, MODULE_NAME};
