//! Genesis bootstrap: seed block 0 into a fresh store before normal
//! fetching begins.

use crate::{chain::ChainStore, errors::StorageError};
use quarry_primitives::BlockSource;
use tracing::info;

/// Ensures the chain has its genesis block.
///
/// A store with a watermark (or an already-present block 0) is left alone.
/// Otherwise block 0 is fetched, committed, and the watermark seeded at 0.
/// Returns `true` if the bootstrap ran.
pub async fn ensure_genesis(
    store: &ChainStore,
    source: &dyn BlockSource,
) -> Result<bool, StorageError> {
    if store.watermark()?.is_some() || store.has_block(0)? {
        return Ok(false);
    }

    let fetched = source
        .block_by_number(0)
        .await
        .map_err(|e| StorageError::Backend(format!("genesis fetch: {e}")))?
        .ok_or_else(|| StorageError::Backend("peer has no genesis block".to_string()))?;
    let receipts = if fetched.block.transactions.is_empty() {
        Vec::new()
    } else {
        source
            .block_receipts(&fetched.block)
            .await
            .map_err(|e| StorageError::Backend(format!("genesis receipts: {e}")))?
    };

    store.commit_block(&fetched, &receipts)?;
    store.advance_watermark(0)?;
    info!(target: "storage", chain_id = store.chain_id(), "bootstrapped genesis block");
    Ok(true)
}
