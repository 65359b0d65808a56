//! Daemon wiring.
//!
//! Builds every collaborator once and hands each to its consumers as a
//! constructor parameter; nothing holds a back-reference to the service.
//! Startup fails fast when the stream backend or the node cannot be
//! reached; after that, all errors are handled inside the loops.

use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::controller::TipController;
use crate::cursor::RedisCursorStore;
use crate::error::Result;
use crate::node::HttpNodeClient;
use crate::publisher::EventPublisher;
use crate::queue::{QueueClient, TASK_BLOCK_PROCESS, WorkerPool};
use crate::scanner::{BlockSource, Scanner};
use crate::worker::BlockProcessor;

/// Bound on how long shutdown waits for in-flight tasks to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Service {
    controller: TipController,
    pool: WorkerPool,
    cursor_store: RedisCursorStore,
}

impl Service {
    /// Connects all collaborators. Errors here are fatal startup
    /// failures.
    pub async fn connect(config: &Config) -> Result<Self> {
        let client = redis::Client::open(config.redis.url())?;
        let conn = ConnectionManager::new(client.clone()).await?;
        info!(addr = %config.redis.addr, "Stream backend connected");

        let node = HttpNodeClient::new(&config.tron)?;
        let scanner = Arc::new(Scanner::new(Arc::new(node)));

        // Probe the node so a bad URL fails startup instead of looping.
        let head = scanner.scan(0).await?;
        info!(node_url = %config.tron.node_url, head = head.number, "Node reachable");

        let publisher = Arc::new(EventPublisher::new(conn.clone()));
        let cursor_store = RedisCursorStore::new(conn.clone(), &config.redis.prefix);
        let queue_client = Arc::new(QueueClient::new(conn, &config.redis.prefix));

        let processor = Arc::new(BlockProcessor::new(
            scanner.clone(),
            publisher.clone(),
            Arc::new(cursor_store.clone()),
        ));

        let mut pool = WorkerPool::new(client, &config.redis.prefix, &config.queue);
        pool.register(TASK_BLOCK_PROCESS, processor);

        let controller = TipController::new(
            scanner,
            publisher,
            Arc::new(cursor_store.clone()),
            Arc::new(cursor_store.clone()),
            queue_client,
        );

        Ok(Self {
            controller,
            pool,
            cursor_store,
        })
    }

    /// Runs until `cancel` fires, then drains workers with a bounded
    /// timeout. Partially processed blocks are safe: block processing is
    /// idempotent.
    pub async fn run(self, cancel: CancellationToken) {
        let workers = self.pool.spawn(cancel.clone());

        let sweeper = tokio::spawn(self.cursor_store.clone().run_sweeper(cancel.clone()));

        self.controller.run(cancel).await;

        info!("Draining workers");
        if tokio::time::timeout(DRAIN_TIMEOUT, workers.wait())
            .await
            .is_err()
        {
            warn!("Worker drain timed out, abandoning in-flight tasks");
        }
        sweeper.abort();
    }
}
