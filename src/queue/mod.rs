//! Task queueing.
//!
//! Redis-backed multi-class FIFO used for catch-up work: pending lists per
//! queue class, a sorted-set of retry-scheduled tasks promoted back by a
//! Lua script, and a dead list for tasks that exhausted their retry
//! budget.
//!
//! Keys under `<prefix>:queue:`:
//!
//! - `<prefix>:queue:<class>` — pending tasks (LPUSH / BLMOVE).
//! - `<prefix>:queue:<class>:active` — in-flight tasks.
//! - `<prefix>:queue:<class>:retry` — tasks scored by their next delivery
//!   time.
//! - `<prefix>:queue:dead` — terminally failed tasks; never re-driven.

mod client;
mod worker;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::{MAX_ENQUEUE_BATCH, QueueClient};
pub use worker::{TaskHandler, WorkerPool};

use crate::error::{Error, Result};
use crate::scanner::BlockNumber;

/// Task type for block catch-up processing.
pub const TASK_BLOCK_PROCESS: &str = "block:process";

/// Retry budget per task.
pub const MAX_RETRY: u32 = 5;

/// Fixed retry-delay schedule, clamped to the last value.
pub const RETRY_DELAYS: [Duration; 9] = [
    Duration::from_secs(5),
    Duration::from_secs(10),
    Duration::from_secs(30),
    Duration::from_secs(60),
    Duration::from_secs(180),
    Duration::from_secs(300),
    Duration::from_secs(600),
    Duration::from_secs(1800),
    Duration::from_secs(3600),
];

/// Delay before the retry following `retried` prior attempts.
#[must_use]
pub fn retry_delay(retried: u32) -> Duration {
    let index = (retried as usize).min(RETRY_DELAYS.len() - 1);
    RETRY_DELAYS[index]
}

/// Queue classes, in scheduling intent order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueClass {
    /// Near-tip gaps that want low queueing latency.
    Priority,
    /// Large catch-up ranges.
    Backlog,
    /// Everything else.
    Default,
}

impl QueueClass {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QueueClass::Priority => "priority",
            QueueClass::Backlog => "backlog",
            QueueClass::Default => "default",
        }
    }
}

/// A queued unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "type")]
    pub task_type: String,

    pub payload: serde_json::Value,

    #[serde(default)]
    pub retried: u32,

    #[serde(default = "default_max_retry")]
    pub max_retry: u32,
}

fn default_max_retry() -> u32 {
    MAX_RETRY
}

impl Task {
    /// A `block:process` task for one block.
    #[must_use]
    pub fn block_process(block_number: BlockNumber) -> Self {
        Self {
            task_type: TASK_BLOCK_PROCESS.to_string(),
            payload: serde_json::json!({ "block_number": block_number }),
            retried: 0,
            max_retry: MAX_RETRY,
        }
    }

    /// Extracts the block number from a `block:process` payload.
    pub fn block_number(&self) -> Result<BlockNumber> {
        self.payload
            .get("block_number")
            .and_then(serde_json::Value::as_i64)
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                Error::MalformedTask(format!("missing or invalid block_number in {}", self.payload))
            })
    }
}

/// Enqueue seam used by the tip controller.
#[async_trait]
pub trait TaskSink: Send + Sync {
    async fn enqueue(&self, class: QueueClass, tasks: &[Task]) -> Result<()>;
}

pub(crate) mod keys {
    use super::QueueClass;

    pub fn pending(prefix: &str, class: QueueClass) -> String {
        format!("{prefix}:queue:{}", class.as_str())
    }

    pub fn active(prefix: &str, class: QueueClass) -> String {
        format!("{prefix}:queue:{}:active", class.as_str())
    }

    pub fn retry(prefix: &str, class: QueueClass) -> String {
        format!("{prefix}:queue:{}:retry", class.as_str())
    }

    pub fn dead(prefix: &str) -> String {
        format!("{prefix}:queue:dead")
    }
}
