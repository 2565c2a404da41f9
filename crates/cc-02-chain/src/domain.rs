//! Pure chain rules: app hash chaining, proposal sizing, retain height.

use sha2::{Digest, Sha256};

/// CheckTx codes returned by the chain module.
pub mod codes {
    pub const TX_TOO_LARGE: u32 = 6;
}

/// Genesis app hash: SHA-256 of the chain id.
pub fn genesis_app_hash(chain_id: &str) -> Vec<u8> {
    Sha256::digest(chain_id.as_bytes()).to_vec()
}

/// Next app hash: SHA-256(previous app hash || height (BE) || tx hashes...).
///
/// Every replica executing the same block on the same previous state derives
/// the same value.
pub fn next_app_hash(prev: &[u8], height: u64, tx_hashes: &[[u8; 32]]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(prev);
    hasher.update(height.to_be_bytes());
    for h in tx_hashes {
        hasher.update(h);
    }
    hasher.finalize().to_vec()
}

/// Keep transactions in order while their cumulative size fits `max_bytes`.
/// A non-positive limit keeps everything.
pub fn fit_txs(txs: &[Vec<u8>], max_bytes: i64) -> Vec<Vec<u8>> {
    if max_bytes <= 0 {
        return txs.to_vec();
    }
    let mut total: i64 = 0;
    txs.iter()
        .take_while(|tx| {
            total = total.saturating_add(tx.len() as i64);
            total <= max_bytes
        })
        .cloned()
        .collect()
}

/// Cumulative size of `txs` in bytes.
pub fn total_bytes(txs: &[Vec<u8>]) -> i64 {
    txs.iter()
        .fold(0i64, |total, tx| total.saturating_add(tx.len() as i64))
}

/// Whether `bytes` exceeds `max_bytes`. A non-positive limit never does.
pub fn over_limit(bytes: i64, max_bytes: i64) -> bool {
    max_bytes > 0 && bytes > max_bytes
}

/// Lowest height to keep when pruning, 0 to keep everything.
pub fn retain_height(last_height: u64, retain_blocks: u64) -> u64 {
    if retain_blocks == 0 || last_height <= retain_blocks {
        0
    } else {
        last_height - retain_blocks
    }
}

/// Vote extension carried for `height`: the height in big-endian.
pub fn vote_extension(height: u64) -> Vec<u8> {
    height.to_be_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_hash_depends_on_every_input() {
        let base = next_app_hash(b"prev", 1, &[[1u8; 32]]);
        assert_eq!(base.len(), 32);
        assert_eq!(base, next_app_hash(b"prev", 1, &[[1u8; 32]]));
        assert_ne!(base, next_app_hash(b"prev", 2, &[[1u8; 32]]));
        assert_ne!(base, next_app_hash(b"other", 1, &[[1u8; 32]]));
        assert_ne!(base, next_app_hash(b"prev", 1, &[[2u8; 32]]));
    }

    #[test]
    fn test_fit_txs_stops_at_limit() {
        let txs = vec![vec![0u8; 4], vec![0u8; 4], vec![0u8; 4]];
        assert_eq!(fit_txs(&txs, 8).len(), 2);
        assert_eq!(fit_txs(&txs, 3).len(), 0);
        assert_eq!(fit_txs(&txs, 0).len(), 3);
    }

    #[test]
    fn test_byte_limit() {
        let txs = vec![vec![0u8; 100], vec![0u8; 5]];
        assert_eq!(total_bytes(&txs), 105);
        assert!(over_limit(105, 10));
        assert!(!over_limit(10, 10));
        assert!(!over_limit(105, 0));
    }

    #[test]
    fn test_retain_height() {
        assert_eq!(retain_height(10, 0), 0);
        assert_eq!(retain_height(10, 20), 0);
        assert_eq!(retain_height(100, 30), 70);
    }
}
