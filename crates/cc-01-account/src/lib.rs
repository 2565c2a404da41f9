//! # Account Module (cc-01)
//!
//! Owns the `account/` records of the chain store.
//!
//! | Callback | Behaviour |
//! |----------|-----------|
//! | CheckTx | rejects undecodable envelopes (1), empty addresses (2), existing accounts (3) |
//! | ProcessProposal | rejects proposals carrying undecodable transactions |
//! | FinalizeBlock | writes new accounts into the block batch, one result per tx |
//! | Query | `/account/<address>` as JSON |

pub mod domain;
pub mod service;

pub use domain::{codes, AccountRejection};
pub use service::{AccountModule, MODULE_NAME};
