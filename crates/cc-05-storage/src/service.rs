use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use chain_store::LocalStore;
use shared_types::{Application, Lifecycle, Module, StoreError};

pub const MODULE_NAME: &str = "storage";

/// 4 MiB
pub const DEFAULT_MAX_FILE_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file is empty")]
    Empty,

    #[error("file too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("invalid content id: {0}")]
    InvalidCid(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }
}

pub struct StorageModule {
    lifecycle: Lifecycle,
    local: Arc<LocalStore>,
    max_file_size: usize,
}

impl StorageModule {
    pub fn new(local: Arc<LocalStore>, max_file_size: usize) -> Self {
        Self {
            lifecycle: Lifecycle::new(MODULE_NAME),
            local,
            max_file_size,
        }
    }

    /// Store `data` and return its content id.
    pub fn upload(&self, data: &[u8]) -> Result<String, StorageError> {
        if data.is_empty() {
            return Err(StorageError::Empty);
        }
        if data.len() > self.max_file_size {
            return Err(StorageError::TooLarge {
                size: data.len(),
                max: self.max_file_size,
            });
        }
        let cid = self.local.put_file(data)?;
        info!(cid = %cid, size = data.len(), "file stored");
        Ok(cid)
    }

    pub fn download(&self, cid: &str) -> Result<Vec<u8>, StorageError> {
        let cid = cid.to_lowercase();
        if cid.len() != 64 || !cid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidCid(cid));
        }
        let data = self.local.get_file(&cid)?;
        debug!(cid = %cid, size = data.len(), "file read");
        Ok(data)
    }
}

#[async_trait]
impl Application for StorageModule {}

impl Module for StorageModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
}
