//! Block catch-up processing.
//!
//! One `block:process` task scans one block, publishes its transactions
//! as a single pipelined batch, and records the block in the
//! processed-set. The processed-set check makes re-delivery cheap; two
//! workers racing the same block may double-publish, which downstream
//! consumers absorb by deduplicating on transaction id.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::cursor::ProcessedBlocks;
use crate::error::Result;
use crate::publisher::EventSink;
use crate::queue::{Task, TaskHandler};
use crate::scanner::BlockSource;

pub struct BlockProcessor {
    scanner: Arc<dyn BlockSource>,
    publisher: Arc<dyn EventSink>,
    processed: Arc<dyn ProcessedBlocks>,
}

impl BlockProcessor {
    pub fn new(
        scanner: Arc<dyn BlockSource>,
        publisher: Arc<dyn EventSink>,
        processed: Arc<dyn ProcessedBlocks>,
    ) -> Self {
        Self {
            scanner,
            publisher,
            processed,
        }
    }
}

#[async_trait]
impl TaskHandler for BlockProcessor {
    async fn handle(&self, task: &Task) -> Result<()> {
        let block_number = task.block_number()?;

        if self.processed.is_processed(block_number).await? {
            debug!(block = block_number, "Block already processed, skipping");
            return Ok(());
        }

        let block = self.scanner.scan(block_number).await?;
        self.publisher.publish_batch(&block.transactions).await?;
        self.processed.mark_processed(block_number).await?;

        crate::metrics::record_block_processed();
        debug!(
            block = block_number,
            transactions = block.transactions.len(),
            "Block processed"
        );
        Ok(())
    }
}
