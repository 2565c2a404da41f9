//! Backend adapters for the [`KeyValueStore`](crate::ports::KeyValueStore) port.

mod file;
mod memory;
#[cfg(feature = "rocksdb")]
mod rocksdb_adapter;

pub use file::FileBackedKVStore;
pub use memory::InMemoryKVStore;
#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbConfig, RocksDbStore};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use shared_types::StoreError;

use crate::ports::KeyValueStore;

/// Which engine backs a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    File,
    Rocksdb,
}

/// Open a store of the given backend at `path`. `path` is ignored for
/// [`StoreBackend::Memory`].
pub fn open_store(
    backend: StoreBackend,
    path: impl AsRef<Path>,
) -> Result<Arc<dyn KeyValueStore>, StoreError> {
    match backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryKVStore::new())),
        StoreBackend::File => Ok(Arc::new(FileBackedKVStore::open(path)?)),
        #[cfg(feature = "rocksdb")]
        StoreBackend::Rocksdb => Ok(Arc::new(RocksDbStore::open(
            path,
            RocksDbConfig::default(),
        )?)),
        #[cfg(not(feature = "rocksdb"))]
        StoreBackend::Rocksdb => Err(StoreError::Io(
            "built without the `rocksdb` feature".to_string(),
        )),
    }
}
