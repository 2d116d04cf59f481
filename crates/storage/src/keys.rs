//! The chain-scoped key schema.
//!
//! Every key begins with `chain:<id>:`, so chains never collide in a shared
//! store. Heights and log indexes are zero-padded to a fixed 20 digits so
//! that lexicographic order equals numeric order; the widths are part of the
//! on-disk format and fixed forever once a store exists.

use alloy_primitives::{hex, B256};

/// Width of a zero-padded height or log index.
pub const NUMERIC_WIDTH: usize = 20;

/// Key of a block record.
pub fn block(chain_id: u64, height: u64) -> Vec<u8> {
    format!("chain:{chain_id}:block:{height:0NUMERIC_WIDTH$}").into_bytes()
}

/// Prefix shared by all block keys of a chain.
pub fn block_prefix(chain_id: u64) -> Vec<u8> {
    format!("chain:{chain_id}:block:").into_bytes()
}

/// Key of a transaction record.
pub fn transaction(chain_id: u64, hash: &B256) -> Vec<u8> {
    format!("chain:{chain_id}:tx:{}", hex::encode(hash)).into_bytes()
}

/// Key of a fee-delegation meta record.
pub fn fee_meta(chain_id: u64, hash: &B256) -> Vec<u8> {
    format!("chain:{chain_id}:feemeta:{}", hex::encode(hash)).into_bytes()
}

/// Key of a receipt record.
pub fn receipt(chain_id: u64, hash: &B256) -> Vec<u8> {
    format!("chain:{chain_id}:receipt:{}", hex::encode(hash)).into_bytes()
}

/// Key of a log record.
pub fn log(chain_id: u64, height: u64, log_index: u64) -> Vec<u8> {
    format!("chain:{chain_id}:log:{height:0NUMERIC_WIDTH$}:{log_index:0NUMERIC_WIDTH$}")
        .into_bytes()
}

/// Prefix shared by the log keys of one block.
pub fn log_prefix(chain_id: u64, height: u64) -> Vec<u8> {
    format!("chain:{chain_id}:log:{height:0NUMERIC_WIDTH$}:").into_bytes()
}

/// Key of the per-chain watermark.
pub fn latest(chain_id: u64) -> Vec<u8> {
    format!("chain:{chain_id}:latest").into_bytes()
}

/// Key of the block-hash secondary index entry.
pub fn block_hash(chain_id: u64, hash: &B256) -> Vec<u8> {
    format!("chain:{chain_id}:blockhash:{}", hex::encode(hash)).into_bytes()
}

/// Recovers the height from a block key produced by [block].
pub fn parse_block_height(key: &[u8], chain_id: u64) -> Option<u64> {
    let prefix = block_prefix(chain_id);
    let rest = key.strip_prefix(prefix.as_slice())?;
    std::str::from_utf8(rest).ok()?.parse().ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zero_padding_makes_lexicographic_order_numeric() {
        let low = block(1, 9);
        let mid = block(1, 10);
        let high = block(1, 100);
        assert!(low < mid);
        assert!(mid < high);
    }

    #[test]
    fn chains_never_share_a_prefix() {
        // "chain:1:" must not prefix "chain:10:" keys.
        let one = block(1, 5);
        let ten = block(10, 5);
        assert!(!ten.starts_with(b"chain:1:"));
        assert!(one.starts_with(b"chain:1:"));
    }

    #[test]
    fn block_height_round_trips() {
        let key = block(7, 123_456);
        assert_eq!(parse_block_height(&key, 7), Some(123_456));
        assert_eq!(parse_block_height(&key, 8), None);
    }
}
