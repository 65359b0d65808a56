//! Worker pool.
//!
//! Each queue class gets its own quota of workers; each worker owns a
//! dedicated connection because BLMOVE blocks and must not starve shared
//! multiplexed traffic. A per-class promoter moves due retry tasks back
//! into the pending list through a Lua script so the pop-side never races
//! the reschedule.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Direction};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use crate::config::QueueConfig;
use crate::error::{Error, Result};
use crate::queue::{QueueClass, Task, keys, retry_delay};

/// Seconds a worker blocks waiting for a task before re-checking
/// cancellation.
const POP_TIMEOUT_SECS: f64 = 1.0;

/// How often due retry tasks are promoted back to pending.
const PROMOTE_INTERVAL: Duration = Duration::from_secs(1);

/// Pause after a storage error before the worker tries again.
const BACKEND_RETRY_DELAY: Duration = Duration::from_secs(1);

const PROMOTE_SCRIPT: &str = r"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, 100)
for _, task in ipairs(due) do
    redis.call('RPUSH', KEYS[2], task)
    redis.call('ZREM', KEYS[1], task)
end
return #due
";

/// Executes one task at a time. Implementations must be safe to call
/// concurrently from independent workers.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &Task) -> Result<()>;
}

type HandlerMap = HashMap<String, Arc<dyn TaskHandler>>;

/// Bounded pool of queue-class workers.
pub struct WorkerPool {
    client: redis::Client,
    prefix: String,
    quotas: Vec<(QueueClass, usize)>,
    handlers: HandlerMap,
}

impl WorkerPool {
    pub fn new(client: redis::Client, prefix: &str, config: &QueueConfig) -> Self {
        Self {
            client,
            prefix: prefix.to_string(),
            quotas: vec![
                (QueueClass::Priority, config.priority_workers),
                (QueueClass::Backlog, config.backlog_workers),
                (QueueClass::Default, config.default_workers()),
            ],
            handlers: HandlerMap::new(),
        }
    }

    /// Registers the handler for a task type.
    pub fn register(&mut self, task_type: &str, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(task_type.to_string(), handler);
    }

    /// Spawns all workers and promoters. The returned tracker completes
    /// once every worker has drained after cancellation.
    pub fn spawn(self, cancel: CancellationToken) -> TaskTracker {
        let tracker = TaskTracker::new();
        let handlers = Arc::new(self.handlers);

        for (class, quota) in self.quotas {
            tracker.spawn(run_promoter(
                self.client.clone(),
                self.prefix.clone(),
                class,
                cancel.clone(),
            ));

            for slot in 0..quota {
                tracker.spawn(run_worker(
                    self.client.clone(),
                    self.prefix.clone(),
                    class,
                    slot,
                    Arc::clone(&handlers),
                    cancel.clone(),
                ));
            }
        }

        tracker.close();
        tracker
    }
}

async fn connect(client: &redis::Client, cancel: &CancellationToken) -> Option<ConnectionManager> {
    loop {
        match ConnectionManager::new(client.clone()).await {
            Ok(conn) => return Some(conn),
            Err(e) => {
                error!(error = %e, "Queue connection failed, retrying");
                tokio::select! {
                    () = cancel.cancelled() => return None,
                    () = tokio::time::sleep(BACKEND_RETRY_DELAY) => {}
                }
            }
        }
    }
}

async fn run_worker(
    client: redis::Client,
    prefix: String,
    class: QueueClass,
    slot: usize,
    handlers: Arc<HandlerMap>,
    cancel: CancellationToken,
) {
    let pending = keys::pending(&prefix, class);
    let active = keys::active(&prefix, class);
    let retry = keys::retry(&prefix, class);
    let dead = keys::dead(&prefix);

    let Some(mut conn) = connect(&client, &cancel).await else {
        return;
    };

    debug!(queue = class.as_str(), slot, "Worker started");

    loop {
        let popped: redis::RedisResult<Option<String>> = tokio::select! {
            () = cancel.cancelled() => break,
            result = conn.blmove(
                &pending,
                &active,
                Direction::Right,
                Direction::Left,
                POP_TIMEOUT_SECS,
            ) => result,
        };

        match popped {
            Ok(None) => {} // idle timeout, re-check cancellation
            Ok(Some(raw)) => {
                let disposition = execute(&raw, &handlers).await;
                if let Err(e) =
                    settle(&mut conn, &raw, disposition, class, &active, &retry, &dead).await
                {
                    error!(error = %e, queue = class.as_str(), "Failed to settle task");
                }
            }
            Err(e) => {
                error!(error = %e, queue = class.as_str(), "Queue pop failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(BACKEND_RETRY_DELAY) => {}
                }
            }
        }
    }

    debug!(queue = class.as_str(), slot, "Worker stopped");
}

enum Disposition {
    Done,
    Retry(Task, String),
    Dead(String),
}

async fn execute(raw: &str, handlers: &HandlerMap) -> Disposition {
    let task: Task = match serde_json::from_str(raw) {
        Ok(task) => task,
        Err(e) => return Disposition::Dead(format!("unparseable payload: {e}")),
    };

    let Some(handler) = handlers.get(&task.task_type) else {
        return Disposition::Dead(Error::UnknownTaskType(task.task_type.clone()).to_string());
    };

    // A panicking handler fails the task instead of taking down the pool.
    match std::panic::AssertUnwindSafe(handler.handle(&task))
        .catch_unwind()
        .await
    {
        Err(_) => Disposition::Retry(task, "handler panicked".to_string()),
        Ok(Ok(())) => Disposition::Done,
        Ok(Err(e)) if e.is_permanent() => Disposition::Dead(e.to_string()),
        Ok(Err(e)) => Disposition::Retry(task, e.to_string()),
    }
}

async fn settle(
    conn: &mut ConnectionManager,
    raw: &str,
    disposition: Disposition,
    class: QueueClass,
    active: &str,
    retry: &str,
    dead: &str,
) -> Result<()> {
    let _: i64 = conn.lrem(active, 1, raw).await?;

    match disposition {
        Disposition::Done => {}
        Disposition::Retry(mut task, reason) => {
            if task.retried >= task.max_retry {
                error!(
                    queue = class.as_str(),
                    task_type = %task.task_type,
                    payload = %task.payload,
                    retried = task.retried,
                    reason = %reason,
                    "Task exhausted its retry budget, dead-lettering"
                );
                let _: i64 = conn.lpush(dead, serde_json::to_string(&task)?).await?;
                crate::metrics::record_task_dead(class.as_str());
            } else {
                let delay = retry_delay(task.retried);
                task.retried += 1;
                let deliver_at = Utc::now().timestamp() + delay.as_secs() as i64;
                warn!(
                    queue = class.as_str(),
                    task_type = %task.task_type,
                    payload = %task.payload,
                    retried = task.retried,
                    delay_secs = delay.as_secs(),
                    reason = %reason,
                    "Task failed, scheduling retry"
                );
                let _: i64 = conn
                    .zadd(retry, serde_json::to_string(&task)?, deliver_at)
                    .await?;
                crate::metrics::record_task_retried(class.as_str());
            }
        }
        Disposition::Dead(reason) => {
            error!(
                queue = class.as_str(),
                payload = raw,
                reason = %reason,
                "Task failed permanently, dead-lettering"
            );
            let _: i64 = conn.lpush(dead, raw).await?;
            crate::metrics::record_task_dead(class.as_str());
        }
    }

    Ok(())
}

async fn run_promoter(
    client: redis::Client,
    prefix: String,
    class: QueueClass,
    cancel: CancellationToken,
) {
    let script = redis::Script::new(PROMOTE_SCRIPT);
    let retry = keys::retry(&prefix, class);
    let pending = keys::pending(&prefix, class);

    let Some(mut conn) = connect(&client, &cancel).await else {
        return;
    };

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(PROMOTE_INTERVAL) => {}
        }

        let result: redis::RedisResult<i64> = script
            .key(&retry)
            .key(&pending)
            .arg(Utc::now().timestamp())
            .invoke_async(&mut conn)
            .await;

        match result {
            Ok(promoted) if promoted > 0 => {
                debug!(queue = class.as_str(), promoted, "Promoted due retry tasks");
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, queue = class.as_str(), "Retry promotion failed"),
        }
    }

    debug!(queue = class.as_str(), "Promoter stopped");
}
