//! File-backed key-value store.
//!
//! Persists the whole map to a single binary file on every write, providing
//! durability without RocksDB. Suitable for development and light nodes.
//!
//! Format: repeated `[key_len:u32][key][value_len:u32][value]`, little endian.
//! Writes go to a temp file that is fsynced and renamed over the original.
//! A sibling `.lock` file is held with an exclusive advisory lock for the
//! lifetime of the store.

use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use shared_types::StoreError;

use super::memory::{apply, scan, OrderedMap};
use crate::ports::{BatchOperation, KeyValueStore};

pub struct FileBackedKVStore {
    data: RwLock<OrderedMap>,
    path: PathBuf,
    _lock: File,
}

impl FileBackedKVStore {
    /// Open or create the store at `path`.
    ///
    /// Fails if another process holds the store open.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path.with_extension("lock"))?;
        lock.try_lock_exclusive()
            .map_err(|e| StoreError::Io(format!("{} is locked: {e}", path.display())))?;

        let data = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            OrderedMap::new()
        };
        info!(path = %path.display(), keys = data.len(), "opened file store");

        Ok(Self {
            data: RwLock::new(data),
            path,
            _lock: lock,
        })
    }

    fn load_from_file(path: &Path) -> Result<OrderedMap, StoreError> {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;

        let mut data = OrderedMap::new();
        let mut cursor = 0;
        while cursor < bytes.len() {
            let key = read_chunk(&bytes, &mut cursor)?;
            let value = read_chunk(&bytes, &mut cursor)?;
            data.insert(key, value);
        }
        Ok(data)
    }

    fn save_to_file(&self, data: &OrderedMap) -> Result<(), StoreError> {
        let mut bytes = Vec::new();
        for (key, value) in data {
            bytes.extend_from_slice(&(key.len() as u32).to_le_bytes());
            bytes.extend_from_slice(key);
            bytes.extend_from_slice(&(value.len() as u32).to_le_bytes());
            bytes.extend_from_slice(value);
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Apply `operations` to a copy, persist it, then swap it in. The
    /// in-memory view only changes once the file write succeeded.
    fn write_through(&self, operations: Vec<BatchOperation>) -> Result<(), StoreError> {
        let mut data = self.data.write();
        let mut next = data.clone();
        apply(&mut next, operations);
        self.save_to_file(&next)?;
        *data = next;
        Ok(())
    }
}

fn read_chunk(bytes: &[u8], cursor: &mut usize) -> Result<Vec<u8>, StoreError> {
    let corrupt = || StoreError::Serialization("truncated store file".to_string());
    let len_end = cursor.checked_add(4).ok_or_else(corrupt)?;
    let len_bytes: [u8; 4] = bytes
        .get(*cursor..len_end)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(corrupt)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    let end = len_end.checked_add(len).ok_or_else(corrupt)?;
    let chunk = bytes.get(len_end..end).ok_or_else(corrupt)?.to_vec();
    *cursor = end;
    Ok(chunk)
}

impl KeyValueStore for FileBackedKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.write_through(vec![BatchOperation::put(key, value)])
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.write_through(vec![BatchOperation::delete(key)])
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), StoreError> {
        self.write_through(operations)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        Ok(scan(&self.data.read(), prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chain.db");
        {
            let store = FileBackedKVStore::open(&path).unwrap();
            store
                .atomic_batch_write(vec![
                    BatchOperation::put(b"account/a".to_vec(), b"1".to_vec()),
                    BatchOperation::put(b"account/b".to_vec(), b"2".to_vec()),
                ])
                .unwrap();
            store.delete(b"account/a").unwrap();
        }
        let store = FileBackedKVStore::open(&path).unwrap();
        assert_eq!(store.get(b"account/a").unwrap(), None);
        assert_eq!(store.get(b"account/b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn test_second_open_is_rejected_while_locked() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chain.db");
        let _first = FileBackedKVStore::open(&path).unwrap();
        assert!(matches!(
            FileBackedKVStore::open(&path),
            Err(StoreError::Io(_))
        ));
    }

    #[test]
    fn test_truncated_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chain.db");
        fs::write(&path, [5u8, 0, 0, 0, b'a']).unwrap();
        assert!(matches!(
            FileBackedKVStore::open(&path),
            Err(StoreError::Serialization(_))
        ));
    }
}
