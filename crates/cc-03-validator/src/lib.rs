//! # Validator Module (cc-03)
//!
//! Maintains the validator set under `validator/` and reports power changes
//! through FinalizeBlock.
//!
//! | Callback | Behaviour |
//! |----------|-----------|
//! | InitChain | stores and echoes the genesis validators |
//! | CheckTx | rejects empty keys (5) and negative power (4) |
//! | ProcessProposal | rejects proposals with invalid validator updates |
//! | FinalizeBlock | applies updates, power 0 removes |
//! | Query | `/validator/<pub_key>` as JSON |

pub mod service;

pub use service::{codes, validate_update, ValidatorModule, MODULE_NAME};
