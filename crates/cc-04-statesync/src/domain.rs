//! Snapshot payload encoding and restore bookkeeping.

use sha2::{Digest, Sha256};

use shared_types::{Snapshot, StoreError};

/// The only snapshot format this node produces and accepts.
pub const SNAPSHOT_FORMAT: u32 = 1;

pub type Records = Vec<(Vec<u8>, Vec<u8>)>;

pub fn encode_records(records: &Records) -> Result<Vec<u8>, StoreError> {
    Ok(bincode::serialize(records)?)
}

pub fn decode_records(payload: &[u8]) -> Result<Records, StoreError> {
    Ok(bincode::deserialize(payload)?)
}

/// Split `payload` into `chunk_size` pieces. An empty payload still yields
/// one (empty) chunk so every snapshot has at least one.
pub fn split_chunks(payload: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
    let size = chunk_size.max(1);
    if payload.is_empty() {
        return vec![Vec::new()];
    }
    payload.chunks(size).map(<[u8]>::to_vec).collect()
}

pub fn payload_hash(payload: &[u8]) -> Vec<u8> {
    Sha256::digest(payload).to_vec()
}

/// Heights to delete so that only the newest `keep_recent` remain.
/// `heights` must be ascending; `keep_recent == 0` keeps everything.
pub fn heights_to_prune(heights: &[u64], keep_recent: usize) -> &[u64] {
    if keep_recent == 0 || heights.len() <= keep_recent {
        return &[];
    }
    &heights[..heights.len() - keep_recent]
}

/// A snapshot being restored from peers.
#[derive(Debug)]
pub struct Restore {
    pub snapshot: Snapshot,
    pub app_hash: Vec<u8>,
    pub buffer: Vec<u8>,
    pub next_chunk: u32,
}

impl Restore {
    pub fn new(snapshot: Snapshot, app_hash: Vec<u8>) -> Self {
        Self {
            snapshot,
            app_hash,
            buffer: Vec::new(),
            next_chunk: 0,
        }
    }

    pub fn is_last(&self, index: u32) -> bool {
        index + 1 == self.snapshot.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_chunks_covers_payload() {
        let payload: Vec<u8> = (0..10).collect();
        let chunks = split_chunks(&payload, 4);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), payload);
        assert_eq!(split_chunks(&[], 4), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_prune_keeps_newest() {
        let heights = [10, 20, 30, 40];
        assert_eq!(heights_to_prune(&heights, 2), &[10, 20]);
        assert!(heights_to_prune(&heights, 4).is_empty());
        assert!(heights_to_prune(&heights, 0).is_empty());
    }

    #[test]
    fn test_records_survive_encoding() {
        let records = vec![(b"account/a".to_vec(), b"x".to_vec())];
        let bytes = encode_records(&records).unwrap();
        assert_eq!(decode_records(&bytes).unwrap(), records);
        assert!(decode_records(&[0xff]).is_err());
    }
}
