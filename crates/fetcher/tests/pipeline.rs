//! End-to-end pipeline scenarios over the in-memory chain and store.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use quarry_adapters::{ConsensusParser, SystemContractsHandler, WbftParser};
use quarry_bus::{BusConfig, EventBus, EventFilter, EventKind};
use quarry_fetcher::{Fetcher, FetcherConfig, GapRecovery};
use quarry_primitives::{
    FeeDelegationMeta, LogRecord, MockChain, ReceiptRecord, SignatureParts, TransactionRecord,
};
use quarry_storage::{ChainStore, MemoryStore};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

const CHAIN_ID: u64 = 1;

fn test_config() -> FetcherConfig {
    FetcherConfig {
        batch_size: 4,
        workers: 3,
        max_retries: 2,
        retry_delay: Duration::from_millis(20),
        poll_interval: Duration::from_millis(25),
        ..Default::default()
    }
}

fn chain_store() -> ChainStore {
    ChainStore::new(CHAIN_ID, Arc::new(MemoryStore::new()))
}

fn build_fetcher(
    cfg: FetcherConfig,
    chain: Arc<MockChain>,
    store: ChainStore,
    bus: Arc<EventBus>,
    consensus: Option<Arc<dyn ConsensusParser>>,
    system: Option<Arc<SystemContractsHandler>>,
) -> (Arc<Fetcher>, CancellationToken) {
    let cancel = CancellationToken::new();
    let fetcher =
        Arc::new(Fetcher::new(cfg, chain, store, bus, consensus, system, cancel.clone()));
    (fetcher, cancel)
}

async fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) {
    tokio::time::timeout(timeout, async {
        loop {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// A transaction plus its matching receipt, with deterministic hashes.
fn transaction_at(number: u64, block_hash: B256) -> (TransactionRecord, ReceiptRecord) {
    let hash = keccak256(format!("tx-{number}"));
    let tx = TransactionRecord {
        hash,
        block_number: number,
        block_hash,
        from: Address::repeat_byte(0x42),
        to: Some(Address::repeat_byte(0x43)),
        value: U256::from(1),
        gas_limit: 21_000,
        max_fee_per_gas: Some(2_000_000_000),
        max_priority_fee_per_gas: Some(1_000_000_000),
        tx_type: 0x02,
        ..Default::default()
    };
    let receipt = ReceiptRecord {
        transaction_hash: hash,
        block_number: number,
        block_hash,
        status: true,
        cumulative_gas_used: 21_000,
        gas_used: 21_000,
        ..Default::default()
    };
    (tx, receipt)
}

#[tokio::test]
async fn basic_ingest_reaches_the_tip() {
    let chain = Arc::new(MockChain::with_empty_blocks(10));
    let store = chain_store();
    let bus = EventBus::new(BusConfig::default());
    let mut blocks = bus.subscribe("blocks", EventFilter::kinds(&[EventKind::Block]), Some(64));
    let mut records = bus.subscribe(
        "records",
        EventFilter::kinds(&[EventKind::Transaction, EventKind::Log]),
        Some(64),
    );

    let (fetcher, cancel) =
        build_fetcher(test_config(), chain, store.clone(), bus.clone(), None, None);
    let run = tokio::spawn({
        let fetcher = Arc::clone(&fetcher);
        async move { fetcher.run().await }
    });

    wait_until(|| store.watermark().unwrap() == Some(10), Duration::from_secs(5)).await;
    cancel.cancel();
    run.await.unwrap().unwrap();

    let mut block_events = 0;
    while blocks.try_recv().is_some() {
        block_events += 1;
    }
    assert_eq!(block_events, 11);
    assert!(records.try_recv().is_none(), "empty blocks must emit no tx/log events");

    for height in 0..=10 {
        assert!(store.has_block(height).unwrap());
    }
}

#[tokio::test]
async fn gap_recovery_fills_holes_and_watermark_converges() {
    let chain = Arc::new(MockChain::with_empty_blocks(6));
    let store = chain_store();
    // Pre-seed the store with blocks {0,1,2,5,6} and watermark 2.
    for height in [0u64, 1, 2, 5, 6] {
        store.commit_block(&MockChain::empty_block(height), &[]).unwrap();
    }
    store.advance_watermark(2).unwrap();

    let bus = EventBus::new(BusConfig::default());
    let (fetcher, cancel) =
        build_fetcher(test_config(), chain, store.clone(), bus, None, None);
    let recovery = GapRecovery::new(store.clone(), fetcher.handle());
    let run = tokio::spawn({
        let fetcher = Arc::clone(&fetcher);
        async move { fetcher.run().await }
    });

    let report = recovery.recover_once().await.unwrap();
    assert_eq!(report.missing, 2);

    wait_until(|| store.watermark().unwrap() == Some(6), Duration::from_secs(5)).await;
    assert!(store.has_block(3).unwrap());
    assert!(store.has_block(4).unwrap());

    cancel.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn stopping_mid_batch_leaves_no_partial_heights() {
    let chain = Arc::new(MockChain::new());
    for number in 0..=60 {
        let mut fetched = MockChain::empty_block(number);
        let (tx, receipt) = transaction_at(number, fetched.block.hash);
        fetched.block.transactions.push(tx.clone());
        chain.insert_block(fetched);
        chain.insert_receipts(tx.hash, vec![receipt]);
    }
    chain.set_latency(Duration::from_millis(5));

    let store = chain_store();
    let bus = EventBus::new(BusConfig::default());
    let (fetcher, cancel) =
        build_fetcher(test_config(), chain, store.clone(), bus, None, None);
    let run = tokio::spawn({
        let fetcher = Arc::clone(&fetcher);
        async move { fetcher.run().await }
    });

    // Let it get partway through, then pull the plug mid-batch.
    wait_until(
        || store.watermark().unwrap().map_or(false, |w| w >= 5),
        Duration::from_secs(5),
    )
    .await;
    cancel.cancel();
    run.await.unwrap().unwrap();

    // Every height at or below the watermark must be fully present: block,
    // transaction, and receipt. No partial commit is observable.
    let watermark = store.watermark().unwrap().expect("some progress was made");
    for height in 0..=watermark {
        let block = store.block_by_number(height).unwrap();
        assert_eq!(block.transactions.len(), 1, "height {height}");
        let tx_hash = block.transactions[0].hash;
        store.transaction(&tx_hash).unwrap();
        store.receipt(&tx_hash).unwrap();
    }
}

#[tokio::test]
async fn fee_delegated_block_persists_exactly_one_meta() {
    let chain = Arc::new(MockChain::with_empty_blocks(0));
    let store = chain_store();

    // Block 1 carries one plain dynamic-fee transaction and one that arrived
    // as type 0x16 and was re-expressed as 0x02 with a sidecar.
    let mut fetched = MockChain::empty_block(1);
    let block_hash = fetched.block.hash;
    let (plain_tx, plain_receipt) = transaction_at(1, block_hash);
    let delegated_hash = keccak256("fee-delegated");
    let delegated_tx = TransactionRecord {
        hash: delegated_hash,
        block_number: 1,
        block_hash,
        from: Address::repeat_byte(0x51),
        to: Some(Address::repeat_byte(0x52)),
        gas_limit: 50_000,
        tx_type: 0x02,
        ..Default::default()
    };
    let delegated_receipt = ReceiptRecord {
        transaction_hash: delegated_hash,
        transaction_index: 1,
        block_number: 1,
        block_hash,
        status: true,
        cumulative_gas_used: 71_000,
        gas_used: 50_000,
        ..Default::default()
    };
    fetched.block.transactions = vec![plain_tx.clone(), delegated_tx];
    fetched.fee_metas = vec![FeeDelegationMeta {
        transaction_hash: delegated_hash,
        block_number: 1,
        original_type: 0x16,
        fee_payer: Address::repeat_byte(0xaa),
        fee_payer_signature: SignatureParts { v: U256::from(1), ..Default::default() },
    }];
    chain.insert_block(fetched);
    chain.insert_receipts(plain_tx.hash, vec![plain_receipt]);
    chain.insert_receipts(delegated_hash, vec![delegated_receipt]);

    let bus = EventBus::new(BusConfig::default());
    let (fetcher, cancel) =
        build_fetcher(test_config(), chain, store.clone(), bus, None, None);
    let run = tokio::spawn({
        let fetcher = Arc::clone(&fetcher);
        async move { fetcher.run().await }
    });
    wait_until(|| store.watermark().unwrap() == Some(1), Duration::from_secs(5)).await;
    cancel.cancel();
    run.await.unwrap().unwrap();

    // Exactly one meta record: the delegated transaction has one, the plain
    // one does not.
    let meta = store.fee_meta(&delegated_hash).unwrap().expect("meta stored");
    assert_eq!(meta.original_type, 0x16);
    assert_eq!(meta.fee_payer, Address::repeat_byte(0xaa));
    assert!(store.fee_meta(&plain_tx.hash).unwrap().is_none());
    assert_eq!(store.transaction(&delegated_hash).unwrap().tx_type, 0x02);
}

#[tokio::test]
async fn adapter_annotations_are_persisted() {
    let chain = Arc::new(MockChain::with_empty_blocks(0));
    let store = chain_store();

    let mut fetched = MockChain::empty_block(1);
    let block_hash = fetched.block.hash;
    let (tx, mut receipt) = transaction_at(1, block_hash);
    let token = Address::from_slice(&{
        let mut bytes = [0u8; 20];
        bytes[18] = 0x10;
        bytes
    });
    let mut value_word = [0u8; 32];
    value_word[31] = 1;
    receipt.logs.push(LogRecord {
        address: token,
        topics: vec![
            keccak256("Transfer(address,address,uint256)"),
            B256::left_padding_from(Address::repeat_byte(0x11).as_slice()),
            B256::left_padding_from(Address::repeat_byte(0x22).as_slice()),
        ],
        data: Bytes::from(value_word.to_vec()),
        block_number: 1,
        transaction_hash: tx.hash,
        log_index: 0,
        ..Default::default()
    });
    fetched.block.transactions.push(tx.clone());
    chain.insert_block(fetched);
    chain.insert_receipts(tx.hash, vec![receipt]);

    let bus = EventBus::new(BusConfig::default());
    let consensus: Arc<dyn ConsensusParser> = Arc::new(WbftParser::new(0));
    let system = Arc::new(SystemContractsHandler::stableone());
    let (fetcher, cancel) = build_fetcher(
        test_config(),
        chain,
        store.clone(),
        bus,
        Some(consensus),
        Some(system),
    );
    let run = tokio::spawn({
        let fetcher = Arc::clone(&fetcher);
        async move { fetcher.run().await }
    });
    wait_until(|| store.watermark().unwrap() == Some(1), Duration::from_secs(5)).await;
    cancel.cancel();
    run.await.unwrap().unwrap();

    let block = store.block_by_number(1).unwrap();
    let consensus = block.consensus.expect("consensus annotation stored");
    assert_eq!(consensus.consensus_type, "wbft");

    let logs = store.logs_in_block(1).unwrap();
    assert_eq!(logs.len(), 1);
    let decoded = logs[0].decoded.as_ref().expect("system decode stored");
    assert_eq!(decoded.name, "Transfer");
    assert_eq!(decoded.contract_name, "StableToken");
}

#[tokio::test]
async fn missing_block_below_tip_reports_an_error_event() {
    let chain = Arc::new(MockChain::with_empty_blocks(1));
    chain.set_tip(3);

    let store = chain_store();
    let bus = EventBus::new(BusConfig::default());
    let mut errors = bus.subscribe("errors", EventFilter::kinds(&[EventKind::Error]), Some(16));

    let (fetcher, cancel) =
        build_fetcher(test_config(), chain, store.clone(), bus, None, None);
    let run = tokio::spawn({
        let fetcher = Arc::clone(&fetcher);
        async move { fetcher.run().await }
    });

    // Heights 0 and 1 commit; 2 and 3 exhaust retries and surface as
    // failure events. The watermark halts before the hole.
    wait_until(|| store.watermark().unwrap() == Some(1), Duration::from_secs(5)).await;
    let error = tokio::time::timeout(Duration::from_secs(5), errors.recv())
        .await
        .expect("error event in time")
        .expect("bus alive");
    assert!(matches!(error.height(), Some(2) | Some(3)));
    assert_eq!(store.watermark().unwrap(), Some(1));

    cancel.cancel();
    run.await.unwrap().unwrap();
}
