use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::debug;

use crate::error::Result;
use crate::queue::{QueueClass, Task, TaskSink, keys};

/// Tasks flushed per pipelined round-trip.
pub const MAX_ENQUEUE_BATCH: usize = 100;

/// Producer side of the task queue.
#[derive(Clone)]
pub struct QueueClient {
    conn: ConnectionManager,
    prefix: String,
}

impl QueueClient {
    pub fn new(conn: ConnectionManager, prefix: &str) -> Self {
        Self {
            conn,
            prefix: prefix.to_string(),
        }
    }
}

#[async_trait]
impl TaskSink for QueueClient {
    async fn enqueue(&self, class: QueueClass, tasks: &[Task]) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let key = keys::pending(&self.prefix, class);
        let mut conn = self.conn.clone();

        for chunk in tasks.chunks(MAX_ENQUEUE_BATCH) {
            let mut pipe = redis::pipe();
            for task in chunk {
                pipe.lpush(&key, serde_json::to_string(task)?).ignore();
            }
            let _: () = pipe.query_async(&mut conn).await?;
        }

        crate::metrics::record_tasks_enqueued(class.as_str(), tasks.len());
        debug!(queue = class.as_str(), count = tasks.len(), "Enqueued tasks");
        Ok(())
    }
}
