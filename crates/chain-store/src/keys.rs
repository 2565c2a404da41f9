//! Key layout. Each record kind lives under its own prefix followed by the
//! natural key; heights are big-endian so scans come back in height order.

pub const ACCOUNT_PREFIX: &[u8] = b"account/";
pub const VALIDATOR_PREFIX: &[u8] = b"validator/";
pub const BLOCK_PREFIX: &[u8] = b"block/";
pub const TX_PREFIX: &[u8] = b"tx/";
pub const META_PREFIX: &[u8] = b"meta/";

pub const META_LAST_HEIGHT: &str = "last_height";
pub const META_APP_HASH: &str = "app_hash";
pub const META_CHAIN_ID: &str = "chain_id";

// Local store
pub const SNAPSHOT_PREFIX: &[u8] = b"snapshot/";
pub const CHUNK_PREFIX: &[u8] = b"chunk/";
pub const FILE_PREFIX: &[u8] = b"file/";

fn join(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(prefix.len() + key.len());
    out.extend_from_slice(prefix);
    out.extend_from_slice(key);
    out
}

pub fn account_key(address: &str) -> Vec<u8> {
    join(ACCOUNT_PREFIX, address.as_bytes())
}

pub fn validator_key(pub_key: &str) -> Vec<u8> {
    join(VALIDATOR_PREFIX, pub_key.as_bytes())
}

pub fn block_key(height: u64) -> Vec<u8> {
    join(BLOCK_PREFIX, &height.to_be_bytes())
}

pub fn tx_key(hash_hex: &str) -> Vec<u8> {
    join(TX_PREFIX, hash_hex.as_bytes())
}

pub fn meta_key(name: &str) -> Vec<u8> {
    join(META_PREFIX, name.as_bytes())
}

pub fn snapshot_key(height: u64) -> Vec<u8> {
    join(SNAPSHOT_PREFIX, &height.to_be_bytes())
}

pub fn chunk_prefix(height: u64) -> Vec<u8> {
    let mut key = join(CHUNK_PREFIX, &height.to_be_bytes());
    key.push(b'/');
    key
}

pub fn chunk_key(height: u64, index: u32) -> Vec<u8> {
    let mut key = chunk_prefix(height);
    key.extend_from_slice(&index.to_be_bytes());
    key
}

pub fn file_key(cid: &str) -> Vec<u8> {
    join(FILE_PREFIX, cid.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_keys_sort_by_height() {
        assert!(block_key(2) < block_key(10));
        assert!(block_key(255) < block_key(256));
    }

    #[test]
    fn test_account_key_layout() {
        assert_eq!(account_key("alice"), b"account/alice".to_vec());
    }

    #[test]
    fn test_chunk_keys_grouped_by_height() {
        let key = chunk_key(7, 3);
        assert!(key.starts_with(&chunk_prefix(7)));
        assert!(!key.starts_with(&chunk_prefix(8)));
    }
}
