//! In-memory fakes for the controller/worker collaborator seams.
#![allow(dead_code)] // each test binary exercises a subset of the fakes

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use tron_events::cursor::{CursorStore, ProcessedBlocks};
use tron_events::error::{Error, Result};
use tron_events::publisher::EventSink;
use tron_events::queue::{QueueClass, Task, TaskSink};
use tron_events::scanner::{
    BlockNumber, BlockSource, Contract, NormalizedTransaction, RetInfo, ScannedBlock,
};

/// Deterministic block time: three seconds per block from a fixed epoch.
pub fn block_time(number: BlockNumber) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + 3 * number, 0).unwrap()
}

pub fn transaction(id: &str, block_number: BlockNumber) -> NormalizedTransaction {
    NormalizedTransaction {
        id: id.to_string(),
        contract: Contract::default(),
        result: RetInfo {
            contract_ret: "SUCCESS".to_string(),
        },
        timestamp: block_time(block_number),
        block_number,
        block_timestamp: block_time(block_number),
        expiration: None,
        receipt: None,
        logs: Vec::new(),
        signers: Vec::new(),
    }
}

pub fn block(number: BlockNumber, txs: Vec<NormalizedTransaction>) -> ScannedBlock {
    ScannedBlock {
        number,
        time: block_time(number),
        transactions: txs,
    }
}

/// A chain whose head and blocks tests control directly.
#[derive(Default)]
pub struct FakeChain {
    head: AtomicI64,
    blocks: Mutex<HashMap<BlockNumber, ScannedBlock>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_block(&self, number: BlockNumber, txs: Vec<NormalizedTransaction>) {
        self.blocks.lock().unwrap().insert(number, block(number, txs));
    }

    /// Inserts the block and makes it the head.
    pub fn set_head(&self, number: BlockNumber, txs: Vec<NormalizedTransaction>) {
        self.insert_block(number, txs);
        self.head.store(number, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlockSource for FakeChain {
    async fn scan(&self, block_number: BlockNumber) -> Result<ScannedBlock> {
        // A real scan suspends on I/O; yield so controller loops driven by
        // this fake stay cooperative.
        tokio::task::yield_now().await;
        let number = if block_number == 0 {
            self.head.load(Ordering::SeqCst)
        } else {
            block_number
        };
        self.blocks
            .lock()
            .unwrap()
            .get(&number)
            .cloned()
            .ok_or(Error::BlockNotFound(number))
    }
}

/// Records every appended transaction in publish order.
#[derive(Default)]
pub struct RecordingSink {
    published: Mutex<Vec<NormalizedTransaction>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<NormalizedTransaction> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_ids(&self) -> Vec<String> {
        self.published().into_iter().map(|tx| tx.id).collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, tx: &NormalizedTransaction) -> Result<()> {
        self.published.lock().unwrap().push(tx.clone());
        Ok(())
    }

    async fn publish_batch(&self, txs: &[NormalizedTransaction]) -> Result<()> {
        self.published.lock().unwrap().extend_from_slice(txs);
        Ok(())
    }
}

/// In-memory cursor plus processed-set.
#[derive(Default)]
pub struct MemoryCursor {
    last_synced: AtomicI64,
    processed: Mutex<HashMap<BlockNumber, i64>>,
}

impl MemoryCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursor(last_synced: BlockNumber) -> Self {
        let cursor = Self::default();
        cursor.last_synced.store(last_synced, Ordering::SeqCst);
        cursor
    }

    pub fn last_synced(&self) -> BlockNumber {
        self.last_synced.load(Ordering::SeqCst)
    }

    pub fn processed_blocks(&self) -> Vec<BlockNumber> {
        let mut blocks: Vec<BlockNumber> = self.processed.lock().unwrap().keys().copied().collect();
        blocks.sort_unstable();
        blocks
    }

    /// Backdates a marker, for retention tests.
    pub fn mark_processed_at(&self, block_number: BlockNumber, marked_at: i64) {
        self.processed.lock().unwrap().insert(block_number, marked_at);
    }
}

#[async_trait]
impl CursorStore for MemoryCursor {
    async fn load(&self) -> Result<BlockNumber> {
        Ok(self.last_synced.load(Ordering::SeqCst))
    }

    async fn save(&self, block_number: BlockNumber) -> Result<()> {
        self.last_synced.store(block_number, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ProcessedBlocks for MemoryCursor {
    async fn is_processed(&self, block_number: BlockNumber) -> Result<bool> {
        Ok(self.processed.lock().unwrap().contains_key(&block_number))
    }

    async fn mark_processed(&self, block_number: BlockNumber) -> Result<()> {
        self.processed
            .lock()
            .unwrap()
            .insert(block_number, Utc::now().timestamp());
        Ok(())
    }

    async fn cleanup_old_entries(&self, max_age: Duration) -> Result<usize> {
        let cutoff = Utc::now().timestamp() - max_age.as_secs() as i64;
        let mut processed = self.processed.lock().unwrap();
        let before = processed.len();
        processed.retain(|_, marked_at| *marked_at >= cutoff);
        Ok(before - processed.len())
    }
}

/// Records every enqueued task with its queue class.
#[derive(Default)]
pub struct RecordingQueue {
    tasks: Mutex<Vec<(QueueClass, Task)>>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> Vec<(QueueClass, Task)> {
        self.tasks.lock().unwrap().clone()
    }

    pub fn block_numbers(&self, class: QueueClass) -> Vec<BlockNumber> {
        self.tasks()
            .into_iter()
            .filter(|(c, _)| *c == class)
            .map(|(_, task)| task.block_number().unwrap())
            .collect()
    }
}

#[async_trait]
impl TaskSink for RecordingQueue {
    async fn enqueue(&self, class: QueueClass, tasks: &[Task]) -> Result<()> {
        let mut recorded = self.tasks.lock().unwrap();
        recorded.extend(tasks.iter().map(|task| (class, task.clone())));
        Ok(())
    }
}
