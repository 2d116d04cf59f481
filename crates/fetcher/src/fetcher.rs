//! The [Fetcher]: dispatch loop, worker pool, and the commit/publish path.

use crate::{config::FetcherConfig, errors::FetchError, watermark::WatermarkTracker};
use futures::stream::{StreamExt, TryStreamExt};
use quarry_adapters::{ConsensusParser, SystemContractsHandler};
use quarry_bus::{Event, EventBus};
use quarry_primitives::{BlockSource, FetchedBlock, ReceiptRecord, SourceError};
use quarry_storage::ChainStore;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex as StdMutex,
};
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// An inclusive range of heights dispatched as one work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeightRange {
    /// First height in the range.
    pub lo: u64,
    /// Last height in the range.
    pub hi: u64,
}

impl HeightRange {
    /// A single-height range.
    pub const fn single(height: u64) -> Self {
        Self { lo: height, hi: height }
    }

    /// Number of heights covered.
    pub const fn len(&self) -> u64 {
        self.hi - self.lo + 1
    }

    /// Always at least one height.
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl core::fmt::Display for HeightRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{}..{}]", self.lo, self.hi)
    }
}

struct FetchContext {
    chain_id: u64,
    cfg: FetcherConfig,
    source: Arc<dyn BlockSource>,
    store: ChainStore,
    bus: Arc<EventBus>,
    consensus: Option<Arc<dyn ConsensusParser>>,
    system: Option<Arc<SystemContractsHandler>>,
    cancel: CancellationToken,
    tracker: WatermarkTracker,
    tip: AtomicU64,
}

impl core::fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FetchContext").field("chain_id", &self.chain_id).finish()
    }
}

/// The per-chain ingest pipeline.
///
/// One dispatcher slices `[next ..= tip]` into bounded work items; a worker
/// pool drains them, committing each height atomically and publishing its
/// records on the bus. The watermark follows the contiguous prefix.
#[derive(Debug)]
pub struct Fetcher {
    ctx: Arc<FetchContext>,
    queue_tx: mpsc::Sender<HeightRange>,
    queue_rx: StdMutex<Option<mpsc::Receiver<HeightRange>>>,
}

/// A cheap handle for enqueueing extra work (gap recovery) into a running
/// pipeline.
#[derive(Debug, Clone)]
pub struct FetcherHandle {
    queue_tx: mpsc::Sender<HeightRange>,
    cancel: CancellationToken,
}

impl FetcherHandle {
    /// Enqueues a range, waiting for queue room. Returns
    /// [FetchError::Cancelled] once the pipeline is shut down.
    pub async fn enqueue(&self, range: HeightRange) -> Result<(), FetchError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
            sent = self.queue_tx.send(range) => sent.map_err(|_| FetchError::Cancelled),
        }
    }

    /// Completes once the pipeline shuts down.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }
}

impl Fetcher {
    /// Assembles a pipeline. `consensus` and `system` come from the chain's
    /// adapter when the family has those capabilities.
    pub fn new(
        cfg: FetcherConfig,
        source: Arc<dyn BlockSource>,
        store: ChainStore,
        bus: Arc<EventBus>,
        consensus: Option<Arc<dyn ConsensusParser>>,
        system: Option<Arc<SystemContractsHandler>>,
        cancel: CancellationToken,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(cfg.queue_depth.max(1));
        let chain_id = store.chain_id();
        let ctx = Arc::new(FetchContext {
            chain_id,
            cfg,
            source,
            store,
            bus,
            consensus,
            system,
            cancel,
            tracker: WatermarkTracker::new(0),
            tip: AtomicU64::new(0),
        });
        Self { ctx, queue_tx, queue_rx: StdMutex::new(Some(queue_rx)) }
    }

    /// Handle for enqueueing work from outside the pipeline.
    pub fn handle(&self) -> FetcherHandle {
        FetcherHandle { queue_tx: self.queue_tx.clone(), cancel: self.ctx.cancel.clone() }
    }

    /// The last tip observed by the dispatcher.
    pub fn observed_tip(&self) -> u64 {
        self.ctx.tip.load(Ordering::Relaxed)
    }

    /// Runs the pipeline until cancellation or a fatal error.
    ///
    /// Cancellation is a clean `Ok(())` exit; a fatal return means the
    /// instance must leave the running state.
    pub async fn run(&self) -> Result<(), FetchError> {
        let queue_rx =
            self.queue_rx.lock().unwrap().take().ok_or(FetchError::AlreadyRunning)?;
        let ctx = &self.ctx;

        // Resume point: the stored watermark wins over the configured start
        // unless the operator asked to begin later.
        let stored = ctx.store.watermark()?;
        let origin = match stored {
            Some(watermark) => ctx.cfg.start_height.max(watermark + 1),
            None => ctx.cfg.start_height,
        };
        ctx.tracker.reset(origin);

        // Heights already on disk (from a prior run or a gap-riddled store)
        // count toward contiguity and are not re-dispatched.
        let present = ctx.store.block_heights_from(origin)?;
        let dispatch_from = present.last().map_or(origin, |max| max + 1);
        ctx.tracker.seed(present.iter().copied());
        if let Some(watermark) = ctx.tracker.watermark() {
            ctx.store.advance_watermark(watermark)?;
        }
        info!(
            target: "fetcher",
            chain_id = ctx.chain_id, origin, dispatch_from,
            "pipeline starting"
        );

        let queue_rx = Arc::new(TokioMutex::new(queue_rx));
        let (fatal_tx, mut fatal_rx) = mpsc::channel::<FetchError>(1);

        let mut tasks = Vec::with_capacity(ctx.cfg.workers.max(1) + 1);
        for worker_id in 0..ctx.cfg.workers.max(1) {
            tasks.push(tokio::spawn(worker_loop(
                Arc::clone(ctx),
                Arc::clone(&queue_rx),
                fatal_tx.clone(),
                worker_id,
            )));
        }
        tasks.push(tokio::spawn(dispatch_loop(
            Arc::clone(ctx),
            self.queue_tx.clone(),
            dispatch_from,
            fatal_tx,
        )));

        let result = tokio::select! {
            fatal = fatal_rx.recv() => fatal.map_or(Ok(()), Err),
            _ = ctx.cancel.cancelled() => Ok(()),
        };

        ctx.cancel.cancel();
        for task in tasks {
            let _ = task.await;
        }
        if let Err(err) = &result {
            error!(target: "fetcher", chain_id = ctx.chain_id, %err, "pipeline failed");
        } else {
            info!(target: "fetcher", chain_id = ctx.chain_id, "pipeline stopped");
        }
        result
    }
}

/// Polls the tip and slices un-indexed heights into bounded work items.
async fn dispatch_loop(
    ctx: Arc<FetchContext>,
    queue_tx: mpsc::Sender<HeightRange>,
    mut next: u64,
    fatal_tx: mpsc::Sender<FetchError>,
) {
    loop {
        let tip = match discover_tip(&ctx).await {
            Ok(tip) => tip,
            Err(FetchError::Cancelled) => return,
            Err(err) => {
                // First fatal wins; a full channel means one is in flight.
                let _ = fatal_tx.try_send(err);
                return;
            }
        };
        ctx.tip.store(tip, Ordering::Relaxed);
        let effective = tip.saturating_sub(ctx.cfg.confirmations);

        while next <= effective {
            let hi = next.saturating_add(ctx.cfg.batch_size.max(1) - 1).min(effective);
            let range = HeightRange { lo: next, hi };
            tokio::select! {
                _ = ctx.cancel.cancelled() => return,
                sent = queue_tx.send(range) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
            debug!(target: "fetcher", chain_id = ctx.chain_id, %range, "dispatched");
            next = hi + 1;
        }

        // Caught up; live tracking polls on a short sleep.
        tokio::select! {
            _ = ctx.cancel.cancelled() => return,
            _ = tokio::time::sleep(ctx.cfg.poll_interval) => {}
        }
    }
}

/// Fetches the tip with the pipeline's retry budget. Exhaustion is fatal:
/// an endpoint that cannot answer `eth_blockNumber` is unusable.
async fn discover_tip(ctx: &FetchContext) -> Result<u64, FetchError> {
    let attempts = ctx.cfg.max_retries.max(1);
    let mut last = SourceError::Transient("unreachable".to_string());
    for attempt in 1..=attempts {
        if ctx.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        match ctx.source.block_number().await {
            Ok(tip) => return Ok(tip),
            Err(err) => {
                debug!(target: "fetcher", chain_id = ctx.chain_id, attempt, %err, "tip poll failed");
                last = err;
            }
        }
        let delay = ctx.cfg.retry_delay_for(attempt);
        tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(FetchError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
    Err(FetchError::TipUnavailable { attempts, last })
}

/// One worker: drain work items, process heights, escalate fatal errors.
async fn worker_loop(
    ctx: Arc<FetchContext>,
    queue_rx: Arc<TokioMutex<mpsc::Receiver<HeightRange>>>,
    fatal_tx: mpsc::Sender<FetchError>,
    worker_id: usize,
) {
    loop {
        let Some(range) = next_item(&ctx, &queue_rx).await else { return };
        debug!(target: "fetcher", chain_id = ctx.chain_id, worker_id, %range, "processing");
        for height in range.lo..=range.hi {
            if ctx.cancel.is_cancelled() {
                return;
            }
            if let Err(fatal) = run_height(&ctx, height).await {
                let _ = fatal_tx.try_send(fatal);
                return;
            }
        }
    }
}

async fn next_item(
    ctx: &FetchContext,
    queue_rx: &TokioMutex<mpsc::Receiver<HeightRange>>,
) -> Option<HeightRange> {
    let mut guard = tokio::select! {
        _ = ctx.cancel.cancelled() => return None,
        guard = queue_rx.lock() => guard,
    };
    tokio::select! {
        _ = ctx.cancel.cancelled() => None,
        item = guard.recv() => item,
    }
}

/// Processes one height with the configured retry budget.
///
/// Returns `Err` only for errors that must stop the pipeline; permanent
/// height-level failures are reported on the bus and skipped.
async fn run_height(ctx: &Arc<FetchContext>, height: u64) -> Result<(), FetchError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let err = match process_height(ctx, height).await {
            Ok(()) => return Ok(()),
            Err(FetchError::Cancelled) => return Ok(()),
            Err(err) => err,
        };

        if err.is_fatal() {
            error!(target: "fetcher", chain_id = ctx.chain_id, height, %err, "fatal error");
            return Err(err);
        }
        if !err.is_retryable() {
            warn!(
                target: "fetcher",
                chain_id = ctx.chain_id, height, %err,
                "height failed permanently, skipping"
            );
            report_failure(ctx, height, &err).await;
            return Ok(());
        }
        if attempt > ctx.cfg.max_retries {
            // Storage that keeps failing poisons the instance; a flaky peer
            // only costs this height.
            if matches!(err, FetchError::Storage(_)) {
                error!(
                    target: "fetcher",
                    chain_id = ctx.chain_id, height, %err,
                    "storage kept failing, escalating"
                );
                return Err(err);
            }
            warn!(
                target: "fetcher",
                chain_id = ctx.chain_id, height, %err,
                "retries exhausted, reporting failure"
            );
            report_failure(ctx, height, &err).await;
            return Ok(());
        }

        debug!(
            target: "fetcher",
            chain_id = ctx.chain_id, height, attempt, %err,
            "height failed, retrying"
        );
        tokio::select! {
            _ = ctx.cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(ctx.cfg.retry_delay_for(attempt)) => {}
        }
    }
}

/// Fetch, annotate, commit, publish one height.
async fn process_height(ctx: &Arc<FetchContext>, height: u64) -> Result<(), FetchError> {
    let fetched = ctx
        .source
        .block_by_number(height)
        .await
        .map_err(|source| FetchError::Source { height, source })?
        .ok_or_else(|| FetchError::Source {
            height,
            source: SourceError::NotFound(format!("block {height}")),
        })?;
    let FetchedBlock { mut block, fee_metas } = fetched;

    let mut receipts = if block.gas_used >= ctx.cfg.heavy_gas_threshold
        && !block.transactions.is_empty()
    {
        heavy_receipts(ctx, &block).await?
    } else {
        ctx.source
            .block_receipts(&block)
            .await
            .map_err(|source| FetchError::Source { height, source })?
    };
    if receipts.len() != block.transactions.len() {
        return Err(FetchError::ReceiptMismatch {
            height,
            expected: block.transactions.len(),
            actual: receipts.len(),
        });
    }

    // Adapter annotations: system-contract decoding on logs, consensus data
    // on the block. Both are best-effort.
    if let Some(system) = &ctx.system {
        for receipt in &mut receipts {
            for log in &mut receipt.logs {
                if log.decoded.is_none() {
                    log.decoded = system.decode(log);
                }
            }
        }
    }
    if let Some(consensus) = &ctx.consensus {
        match consensus.parse(&block) {
            Ok(data) => block.consensus = Some(data),
            Err(err) => {
                warn!(target: "fetcher", chain_id = ctx.chain_id, height, %err, "consensus parse failed")
            }
        }
    }

    // A cancellation observed here discards the batch unwritten.
    if ctx.cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
    }

    let fetched = FetchedBlock { block, fee_metas };
    ctx.store.commit_block(&fetched, &receipts)?;
    publish_records(ctx, &fetched, &receipts).await;

    if let Some(watermark) = ctx.tracker.record(height) {
        ctx.store.advance_watermark(watermark)?;
        let tip = ctx.tip.load(Ordering::Relaxed);
        publish(ctx, Event::progress(ctx.chain_id, watermark, tip)).await;
    }
    Ok(())
}

/// Fetches receipts per transaction with a bounded inner fan-out; used for
/// blocks heavy enough to stall a worker on the bulk path.
async fn heavy_receipts(
    ctx: &Arc<FetchContext>,
    block: &quarry_primitives::BlockRecord,
) -> Result<Vec<ReceiptRecord>, FetchError> {
    let height = block.number;
    debug!(
        target: "fetcher",
        chain_id = ctx.chain_id, height, gas_used = block.gas_used,
        "heavy block, fanning out receipt fetches"
    );
    futures::stream::iter(block.transactions.iter().map(|tx| {
        let source = Arc::clone(&ctx.source);
        let hash = tx.hash;
        async move {
            source
                .transaction_receipt(hash)
                .await
                .map_err(|source| FetchError::Source { height, source })?
                .ok_or_else(|| FetchError::Source {
                    height,
                    source: SourceError::NotFound(format!("receipt {hash}")),
                })
        }
    }))
    // `buffered` preserves transaction order.
    .buffered(ctx.cfg.receipt_workers.max(1))
    .try_collect()
    .await
}

/// Publishes Block, then Transactions, then Logs for one committed height.
async fn publish_records(
    ctx: &Arc<FetchContext>,
    fetched: &FetchedBlock,
    receipts: &[ReceiptRecord],
) {
    let block = &fetched.block;
    publish(ctx, Event::block(ctx.chain_id, Arc::new(block.clone()))).await;
    for tx in &block.transactions {
        publish(ctx, Event::transaction(ctx.chain_id, Arc::new(tx.clone()))).await;
    }
    for receipt in receipts {
        for log in &receipt.logs {
            publish(ctx, Event::log(ctx.chain_id, Arc::new(log.clone()))).await;
        }
    }
}

async fn report_failure(ctx: &Arc<FetchContext>, height: u64, err: &FetchError) {
    publish(ctx, Event::error(ctx.chain_id, Some(height), err.to_string())).await;
}

async fn publish(ctx: &Arc<FetchContext>, event: Event) {
    if let Err(err) = ctx.bus.publish(event).await {
        warn!(target: "fetcher", chain_id = ctx.chain_id, %err, "bus publish failed");
    }
}
