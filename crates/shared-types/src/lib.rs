//! # Shared Types Crate
//!
//! Types every Cadence crate agrees on:
//!
//! - `abci` - the callback protocol between the consensus engine and the
//!   application.
//! - `entities` - records kept in the chain store and the transaction
//!   envelope.
//! - `errors` - module and store error taxonomy.
//! - `gate` - the one-shot dependency gate.
//! - `module_trait` - the `Application` / `Module` contract and the default
//!   `Lifecycle` object.

pub mod abci;
pub mod entities;
pub mod errors;
pub mod gate;
pub mod module_trait;

pub use abci::*;
pub use entities::*;
pub use errors::*;
pub use gate::{await_all, DependencyGate};
pub use module_trait::{Application, Lifecycle, Module, ModuleStatus, TxBroadcaster};
