//! # Chain Store
//!
//! Persistence for the node.
//!
//! ## Crate Structure
//!
//! - `ports` - the `KeyValueStore` port every backend implements
//! - `adapters` - in-memory, file-backed and (feature `rocksdb`) RocksDB
//!   backends
//! - `keys` - per-record-kind key prefixes
//! - `chain_store` - batched consensus state (`ChainStore`) and the
//!   `BlockCommitter` hook the router drives
//! - `local_store` - node-local snapshots and files
//!
//! ## Usage
//!
//! ```ignore
//! use chain_store::ChainStore;
//!
//! let store = ChainStore::in_memory();
//! store.start_batch()?;
//! store.store_account(&account)?;
//! store.commit()?;
//! let account = store.get_account("alice")?;
//! ```

pub mod adapters;
pub mod chain_store;
pub mod keys;
pub mod local_store;
pub mod ports;

pub use adapters::{open_store, FileBackedKVStore, InMemoryKVStore, StoreBackend};
#[cfg(feature = "rocksdb")]
pub use adapters::{RocksDbConfig, RocksDbStore};
pub use chain_store::{BlockCommitter, ChainStore};
pub use local_store::LocalStore;
pub use ports::{BatchOperation, KeyValueStore};
