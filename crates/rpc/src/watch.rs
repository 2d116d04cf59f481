//! Poll-based head and pending-transaction watching.
//!
//! The transport is plain HTTP, so `eth_subscribe` is not available; these
//! watchers poll instead and surface the same event shapes a subscription
//! would.

use crate::client::RpcClient;
use alloy_primitives::{B256, U256};
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A new canonical head observed at the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadEvent {
    /// The block number.
    pub number: u64,
    /// The block hash.
    pub hash: B256,
    /// The block timestamp.
    pub timestamp: u64,
}

/// Handle to a running watcher; dropping it stops the poll loop.
#[derive(Debug)]
pub struct WatchHandle<T> {
    receiver: mpsc::Receiver<T>,
    cancel: CancellationToken,
}

impl<T> WatchHandle<T> {
    /// Receives the next item; `None` after [Self::stop] or client drop.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Stops the poll loop.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl<T> Drop for WatchHandle<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl RpcClient {
    /// Watches for new heads by polling `eth_blockNumber`.
    pub fn watch_heads(self: &Arc<Self>, interval: Duration) -> WatchHandle<HeadEvent> {
        let client = Arc::clone(self);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let (tx, receiver) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut last: Option<u64> = None;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                let tip = match client.block_number().await {
                    Ok(tip) => tip,
                    Err(err) => {
                        debug!(target: "rpc", %err, "head poll failed");
                        continue;
                    }
                };
                let from = last.map_or(tip, |l| l + 1);
                for number in from..=tip {
                    match client.block_by_number(number).await {
                        Ok(Some(fetched)) => {
                            let block = &fetched.block;
                            let event = HeadEvent {
                                number: block.number,
                                hash: block.hash,
                                timestamp: block.timestamp,
                            };
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                        Ok(None) => break,
                        Err(err) => {
                            debug!(target: "rpc", number, %err, "head fetch failed");
                            break;
                        }
                    }
                }
                last = Some(tip);
            }
        });

        WatchHandle { receiver, cancel }
    }

    /// Watches for pending transaction hashes via the filter API.
    pub fn watch_pending(self: &Arc<Self>, interval: Duration) -> WatchHandle<B256> {
        let client = Arc::clone(self);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let (tx, receiver) = mpsc::channel(256);

        tokio::spawn(async move {
            let mut filter_id: Option<U256> = None;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                let id = match filter_id {
                    Some(id) => id,
                    None => match client.raw("eth_newPendingTransactionFilter", json!([])).await {
                        Ok(value) => match serde_json::from_value::<U256>(value) {
                            Ok(id) => {
                                filter_id = Some(id);
                                id
                            }
                            Err(err) => {
                                debug!(target: "rpc", %err, "bad pending filter id");
                                continue;
                            }
                        },
                        Err(err) => {
                            debug!(target: "rpc", %err, "pending filter install failed");
                            continue;
                        }
                    },
                };
                match client.raw("eth_getFilterChanges", json!([id])).await {
                    Ok(value) => {
                        let hashes: Vec<B256> =
                            serde_json::from_value(value).unwrap_or_default();
                        for hash in hashes {
                            if tx.send(hash).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(err) => {
                        debug!(target: "rpc", %err, "pending filter poll failed");
                        // The node may have expired the filter; reinstall.
                        filter_id = None;
                    }
                }
            }
        });

        WatchHandle { receiver, cancel }
    }
}
