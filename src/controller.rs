//! Tip controller.
//!
//! The single cooperative loop that follows the chain head. Each
//! iteration loads the cursor, scans the head, publishes the head block's
//! transactions, classifies the cursor/head gap, and either paces itself
//! to the next block or loops immediately to keep catching up. Gap blocks
//! are never processed inline: they are fanned out to the worker pool
//! through the task queue.
//!
//! Partial work is safe everywhere in this loop: blocks are idempotent
//! via the processed-set and the stream is at-least-once by contract.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::cursor::{CursorStore, ProcessedBlocks};
use crate::publisher::EventSink;
use crate::queue::{QueueClass, Task, TaskSink};
use crate::scanner::{BlockNumber, BlockSource};

/// Largest gap still considered a slight backlog.
pub const SLIGHT_BACKLOG_MAX: i64 = 20;

/// Catch-up never reaches further back than this many blocks behind the
/// head: seven days of three-second blocks, matching stream retention.
pub const BACKLOG_HORIZON: i64 = 201_600;

/// How long after a block's own time the next head is expected: one
/// 3-second block interval plus a small propagation margin.
pub const HEAD_FOLLOW_DELAY: Duration = Duration::from_millis(3_100);

/// Pause before retrying a failed iteration.
const ERROR_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Head/cursor relationship for one iteration. `Stalled` is decided
/// before classification; the remaining arms partition every `(L, H)`
/// pair with `L < H`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapClass {
    /// First run, or the head directly extends the cursor.
    InSync,
    /// A short gap of blocks wanting low-latency catch-up (inclusive).
    SlightBacklog { from: BlockNumber, to: BlockNumber },
    /// A long gap, clamped to [`BACKLOG_HORIZON`] (inclusive).
    LargeBacklog { from: BlockNumber, to: BlockNumber },
}

impl GapClass {
    /// Classifies a non-stalled iteration (`last_synced < head`).
    #[must_use]
    pub fn classify(last_synced: BlockNumber, head: BlockNumber) -> GapClass {
        if last_synced == 0 || head == last_synced + 1 {
            GapClass::InSync
        } else if head - last_synced <= SLIGHT_BACKLOG_MAX {
            GapClass::SlightBacklog {
                from: last_synced + 1,
                to: head - 1,
            }
        } else {
            GapClass::LargeBacklog {
                from: (head - BACKLOG_HORIZON).max(last_synced + 1),
                to: head - 1,
            }
        }
    }
}

/// What the loop does after an iteration.
enum Pace {
    /// Sleep until the next block is due, relative to the head's time.
    FollowHead(DateTime<Utc>),
    /// Loop immediately; there is catch-up in flight.
    Immediate,
}

pub struct TipController {
    scanner: Arc<dyn BlockSource>,
    publisher: Arc<dyn EventSink>,
    cursor: Arc<dyn CursorStore>,
    processed: Arc<dyn ProcessedBlocks>,
    queue: Arc<dyn TaskSink>,
}

impl TipController {
    pub fn new(
        scanner: Arc<dyn BlockSource>,
        publisher: Arc<dyn EventSink>,
        cursor: Arc<dyn CursorStore>,
        processed: Arc<dyn ProcessedBlocks>,
        queue: Arc<dyn TaskSink>,
    ) -> Self {
        Self {
            scanner,
            publisher,
            cursor,
            processed,
            queue,
        }
    }

    /// Runs until cancelled. Errors never end the loop; each failed
    /// iteration is retried after a short pause.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Tip controller started");

        while !cancel.is_cancelled() {
            match self.iteration().await {
                Ok(Pace::FollowHead(block_time)) => {
                    sleep_until_next_block(block_time, &cancel).await;
                }
                Ok(Pace::Immediate) => {}
                Err(e) => {
                    error!(error = %e, "Tip iteration failed");
                    cancellable_sleep(ERROR_RETRY_DELAY, &cancel).await;
                }
            }
        }

        info!("Tip controller stopped");
    }

    async fn iteration(&self) -> crate::error::Result<Pace> {
        let last_synced = self.cursor.load().await?;
        let head = self.scanner.scan(0).await?;

        // Stalled tip: nothing new, wait out the block interval. A head
        // below the cursor (reorg dip, lagging node) is treated the same
        // so the cursor never regresses.
        if head.number <= last_synced {
            debug!(
                head = head.number,
                last_synced, "Head not ahead of cursor, waiting for next block"
            );
            return Ok(Pace::FollowHead(head.time));
        }

        self.publisher.publish_batch(&head.transactions).await?;
        self.processed.mark_processed(head.number).await?;
        crate::metrics::record_head_published();

        let pace = match GapClass::classify(last_synced, head.number) {
            GapClass::InSync => {
                debug!(head = head.number, "In sync");
                Pace::FollowHead(head.time)
            }
            GapClass::SlightBacklog { from, to } => {
                info!(
                    head = head.number,
                    from,
                    to,
                    gap = to - from + 1,
                    "Slight backlog, scheduling priority catch-up"
                );
                self.enqueue_range(QueueClass::Priority, from, to).await?;
                Pace::FollowHead(head.time)
            }
            GapClass::LargeBacklog { from, to } => {
                info!(
                    head = head.number,
                    from,
                    to,
                    gap = to - from + 1,
                    "Large backlog, scheduling backlog catch-up"
                );
                self.enqueue_range(QueueClass::Backlog, from, to).await?;
                Pace::Immediate
            }
        };

        self.cursor.save(head.number).await?;
        Ok(pace)
    }

    async fn enqueue_range(
        &self,
        class: QueueClass,
        from: BlockNumber,
        to: BlockNumber,
    ) -> crate::error::Result<()> {
        let tasks: Vec<Task> = (from..=to).map(Task::block_process).collect();
        self.queue.enqueue(class, &tasks).await
    }
}

/// Sleeps until `block_time + HEAD_FOLLOW_DELAY`, or returns immediately
/// when that instant has already passed.
async fn sleep_until_next_block(block_time: DateTime<Utc>, cancel: &CancellationToken) {
    let deadline = block_time + chrono::Duration::from_std(HEAD_FOLLOW_DELAY).unwrap_or_default();
    let Ok(wait) = (deadline - Utc::now()).to_std() else {
        return; // already past due
    };
    cancellable_sleep(wait, cancel).await;
}

async fn cancellable_sleep(duration: Duration, cancel: &CancellationToken) {
    tokio::select! {
        () = cancel.cancelled() => {}
        () = tokio::time::sleep(duration) => {}
    }
}
