//! The [RpcClient]: a thread-safe JSON-RPC client over an HTTP transport.

use crate::{
    batch::{BatchFailure, BatchResult},
    errors::{is_method_not_found, RpcClientError},
    types::{RawBlock, RawReceipt, RawTransaction},
};
use alloy_json_rpc::{RpcParam, RpcReturn};
use alloy_primitives::{Address, B256, U256, U64};
use alloy_provider::{Provider, ReqwestProvider};
use alloy_rpc_client::RpcClient as AlloyRpcClient;
use alloy_transport_http::Http;
use lru::LruCache;
use quarry_primitives::{
    BlockRecord, BlockSource, FeeDelegationMeta, FetchedBlock, ReceiptRecord, SourceError,
    SourceStats, TransactionRecord,
};
use reqwest::{Client as HttpClient, Url};
use std::{
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
    time::Duration,
};

/// The default per-call deadline.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

const CACHE_SIZE: usize = 32;

/// A JSON-RPC client for one endpoint.
///
/// Shared by all workers of a chain; every method takes `&self`. Transport
/// and decode errors are returned verbatim, retry policy belongs to the
/// caller.
#[derive(Debug)]
pub struct RpcClient {
    provider: ReqwestProvider,
    endpoint: Url,
    timeout: Duration,
    /// `block_by_hash` LRU cache.
    block_cache: Mutex<LruCache<B256, FetchedBlock>>,
    /// Per-block receipts LRU cache, keyed by block hash.
    receipts_cache: Mutex<LruCache<B256, Vec<ReceiptRecord>>>,
    calls: AtomicU64,
    errors: AtomicU64,
}

impl RpcClient {
    /// Creates a client over HTTP with the given per-call deadline.
    pub fn new_http(endpoint: Url, timeout: Duration) -> Self {
        let http = Http::<HttpClient>::new(endpoint.clone());
        let provider = ReqwestProvider::new(AlloyRpcClient::new(http, true));
        Self {
            provider,
            endpoint,
            timeout,
            block_cache: Mutex::new(LruCache::new(NonZeroUsize::new(CACHE_SIZE).unwrap())),
            receipts_cache: Mutex::new(LruCache::new(NonZeroUsize::new(CACHE_SIZE).unwrap())),
            calls: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// The endpoint this client talks to.
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Issues one request with the configured deadline applied.
    async fn request<P, R>(&self, method: &'static str, params: P) -> Result<R, RpcClientError>
    where
        P: RpcParam,
        R: RpcReturn,
    {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match tokio::time::timeout(self.timeout, self.provider.raw_request(method.into(), params))
            .await
        {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                Err(RpcClientError::Transport(err))
            }
            Err(_) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                Err(RpcClientError::Timeout(self.timeout))
            }
        }
    }

    /// Raw passthrough for vendor-specific methods.
    pub async fn raw(
        &self,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcClientError> {
        self.request(method, params).await
    }

    /// Returns the latest block number.
    pub async fn block_number(&self) -> Result<u64, RpcClientError> {
        let number: U64 = self.request("eth_blockNumber", ()).await?;
        Ok(number.to::<u64>())
    }

    /// Returns the chain id.
    pub async fn chain_id(&self) -> Result<u64, RpcClientError> {
        let id: U64 = self.request("eth_chainId", ()).await?;
        Ok(id.to::<u64>())
    }

    /// Returns the `web3_clientVersion` banner.
    pub async fn client_version(&self) -> Result<String, RpcClientError> {
        self.request("web3_clientVersion", ()).await
    }

    /// Returns the `net_version` string.
    pub async fn net_version(&self) -> Result<String, RpcClientError> {
        self.request("net_version", ()).await
    }

    /// Returns an account balance at the latest block.
    pub async fn balance_at(&self, address: Address) -> Result<U256, RpcClientError> {
        self.request("eth_getBalance", (address, "latest")).await
    }

    /// Fetches a block by number with full transactions.
    pub async fn block_by_number(
        &self,
        number: u64,
    ) -> Result<Option<FetchedBlock>, RpcClientError> {
        let raw: Option<RawBlock> =
            self.request("eth_getBlockByNumber", (format!("0x{number:x}"), true)).await?;
        match raw {
            Some(raw) => {
                let fetched = raw.into_fetched()?;
                self.block_cache.lock().unwrap().put(fetched.block.hash, fetched.clone());
                Ok(Some(fetched))
            }
            None => Ok(None),
        }
    }

    /// Fetches a block by hash with full transactions.
    pub async fn block_by_hash(&self, hash: B256) -> Result<Option<FetchedBlock>, RpcClientError> {
        if let Some(cached) = self.block_cache.lock().unwrap().get(&hash) {
            return Ok(Some(cached.clone()));
        }
        let raw: Option<RawBlock> = self.request("eth_getBlockByHash", (hash, true)).await?;
        match raw {
            Some(raw) => {
                let fetched = raw.into_fetched()?;
                self.block_cache.lock().unwrap().put(hash, fetched.clone());
                Ok(Some(fetched))
            }
            None => Ok(None),
        }
    }

    /// Fetches a transaction by hash, with its fee-delegation sidecar when
    /// the raw type byte was `0x16`.
    pub async fn transaction_by_hash(
        &self,
        hash: B256,
    ) -> Result<Option<(TransactionRecord, Option<FeeDelegationMeta>)>, RpcClientError> {
        let raw: Option<RawTransaction> =
            self.request("eth_getTransactionByHash", (hash,)).await?;
        raw.map(|raw| raw.into_record(0, B256::ZERO, 0).map_err(RpcClientError::from))
            .transpose()
    }

    /// Fetches the receipt for one transaction.
    pub async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<ReceiptRecord>, RpcClientError> {
        let raw: Option<RawReceipt> =
            self.request("eth_getTransactionReceipt", (hash,)).await?;
        raw.map(|raw| raw.into_record().map_err(RpcClientError::from)).transpose()
    }

    /// Fetches all receipts for a block.
    ///
    /// Prefers the bulk `eth_getBlockReceipts` method and falls back to a
    /// batch of per-transaction lookups when the server lacks it.
    pub async fn block_receipts(
        &self,
        block: &BlockRecord,
    ) -> Result<Vec<ReceiptRecord>, RpcClientError> {
        if block.transactions.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(cached) = self.receipts_cache.lock().unwrap().get(&block.hash) {
            return Ok(cached.clone());
        }

        let bulk: Result<Option<Vec<RawReceipt>>, RpcClientError> =
            self.request("eth_getBlockReceipts", (format!("0x{:x}", block.number),)).await;
        let receipts = match bulk {
            Ok(Some(raws)) => raws
                .into_iter()
                .map(|raw| raw.into_record().map_err(RpcClientError::from))
                .collect::<Result<Vec<_>, _>>()?,
            Ok(None) => return Err(RpcClientError::BlockNotFound(block.number)),
            Err(RpcClientError::Transport(ref err)) if is_method_not_found(err) => {
                tracing::debug!(
                    target: "rpc",
                    number = block.number,
                    "eth_getBlockReceipts unavailable, falling back to per-tx receipts"
                );
                let hashes = block.transactions.iter().map(|tx| tx.hash).collect::<Vec<_>>();
                self.batch_receipts(&hashes).await?.into_complete()?
            }
            Err(err) => return Err(err),
        };

        self.receipts_cache.lock().unwrap().put(block.hash, receipts.clone());
        Ok(receipts)
    }

    /// Issues one JSON-RPC batch of `eth_getTransactionReceipt` calls.
    pub async fn batch_receipts(
        &self,
        hashes: &[B256],
    ) -> Result<BatchResult<B256, ReceiptRecord>, RpcClientError> {
        let mut result = BatchResult::default();
        if hashes.is_empty() {
            return Ok(result);
        }

        let client = self.provider.client();
        let mut batch = client.new_batch();
        let mut waiters = Vec::with_capacity(hashes.len());
        for hash in hashes {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let params = (*hash,);
            match batch.add_call::<_, Option<RawReceipt>>("eth_getTransactionReceipt", &params) {
                Ok(waiter) => waiters.push((*hash, Some(waiter))),
                Err(err) => {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    result
                        .failed
                        .push(BatchFailure { key: *hash, error: RpcClientError::Transport(err) });
                    waiters.push((*hash, None));
                }
            }
        }

        match tokio::time::timeout(self.timeout, batch.send()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                return Err(RpcClientError::Transport(err));
            }
            Err(_) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                return Err(RpcClientError::Timeout(self.timeout));
            }
        }

        for (hash, waiter) in waiters {
            let Some(waiter) = waiter else { continue };
            match waiter.await {
                Ok(Some(raw)) => match raw.into_record() {
                    Ok(receipt) => result.ok.push(receipt),
                    Err(err) => result
                        .failed
                        .push(BatchFailure { key: hash, error: RpcClientError::Decode(err) }),
                },
                Ok(None) => result
                    .failed
                    .push(BatchFailure { key: hash, error: RpcClientError::ReceiptNotFound(hash) }),
                Err(err) => {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    result
                        .failed
                        .push(BatchFailure { key: hash, error: RpcClientError::Transport(err) });
                }
            }
        }
        Ok(result)
    }

    /// Issues one JSON-RPC batch of block fetches for a height range.
    pub async fn batch_blocks(
        &self,
        heights: &[u64],
    ) -> Result<BatchResult<u64, FetchedBlock>, RpcClientError> {
        let mut result = BatchResult::default();
        if heights.is_empty() {
            return Ok(result);
        }

        let client = self.provider.client();
        let mut batch = client.new_batch();
        let mut waiters = Vec::with_capacity(heights.len());
        for height in heights {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let params = (format!("0x{height:x}"), true);
            match batch.add_call::<_, Option<RawBlock>>("eth_getBlockByNumber", &params) {
                Ok(waiter) => waiters.push((*height, Some(waiter))),
                Err(err) => {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    result
                        .failed
                        .push(BatchFailure { key: *height, error: RpcClientError::Transport(err) });
                    waiters.push((*height, None));
                }
            }
        }

        match tokio::time::timeout(self.timeout, batch.send()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                return Err(RpcClientError::Transport(err));
            }
            Err(_) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                return Err(RpcClientError::Timeout(self.timeout));
            }
        }

        for (height, waiter) in waiters {
            let Some(waiter) = waiter else { continue };
            match waiter.await {
                Ok(Some(raw)) => match raw.into_fetched() {
                    Ok(fetched) => result.ok.push(fetched),
                    Err(err) => result
                        .failed
                        .push(BatchFailure { key: height, error: RpcClientError::Decode(err) }),
                },
                Ok(None) => result.failed.push(BatchFailure {
                    key: height,
                    error: RpcClientError::BlockNotFound(height),
                }),
                Err(err) => {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    result
                        .failed
                        .push(BatchFailure { key: height, error: RpcClientError::Transport(err) });
                }
            }
        }
        Ok(result)
    }

    /// Snapshot of the client's call counters.
    pub fn call_stats(&self) -> SourceStats {
        SourceStats {
            calls: self.calls.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[async_trait::async_trait]
impl BlockSource for RpcClient {
    async fn block_number(&self) -> Result<u64, SourceError> {
        Self::block_number(self).await.map_err(Into::into)
    }

    async fn block_by_number(&self, number: u64) -> Result<Option<FetchedBlock>, SourceError> {
        Self::block_by_number(self, number).await.map_err(Into::into)
    }

    async fn block_receipts(
        &self,
        block: &BlockRecord,
    ) -> Result<Vec<ReceiptRecord>, SourceError> {
        Self::block_receipts(self, block).await.map_err(Into::into)
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<ReceiptRecord>, SourceError> {
        Self::transaction_receipt(self, hash).await.map_err(Into::into)
    }

    fn stats(&self) -> SourceStats {
        self.call_stats()
    }
}
