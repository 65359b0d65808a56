//! Cursor persistence.
//!
//! Two separately keyed regions so a corrupted or cleared processed-set
//! never loses the authoritative cursor:
//!
//! - `<prefix>:last_synced_block` — plain decimal integer, 0 when absent.
//! - `<prefix>:processed_blocks` — set of block numbers scored by the
//!   wall-clock second at which they were marked processed. Membership is
//!   authoritative for worker idempotence; entries age out after seven
//!   days via an hourly sweeper.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::scanner::BlockNumber;

/// How long processed-block markers are kept.
pub const PROCESSED_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// How often the sweeper evicts expired markers.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// The authoritative `last_synced_block` cursor. Advanced only by the tip
/// controller, monotonically.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Returns 0 when the cursor has never been written.
    async fn load(&self) -> Result<BlockNumber>;

    async fn save(&self, block_number: BlockNumber) -> Result<()>;
}

/// The processed-blocks set consulted and written by block workers.
#[async_trait]
pub trait ProcessedBlocks: Send + Sync {
    async fn is_processed(&self, block_number: BlockNumber) -> Result<bool>;

    async fn mark_processed(&self, block_number: BlockNumber) -> Result<()>;

    /// Removes markers older than `max_age`; returns how many were evicted.
    async fn cleanup_old_entries(&self, max_age: Duration) -> Result<usize>;
}

/// Redis-backed cursor store.
#[derive(Clone)]
pub struct RedisCursorStore {
    conn: ConnectionManager,
    last_synced_key: String,
    processed_key: String,
}

impl RedisCursorStore {
    pub fn new(conn: ConnectionManager, prefix: &str) -> Self {
        Self {
            conn,
            last_synced_key: format!("{prefix}:last_synced_block"),
            processed_key: format!("{prefix}:processed_blocks"),
        }
    }

    /// Evicts expired processed-block markers every [`SWEEP_INTERVAL`]
    /// until cancelled.
    pub async fn run_sweeper(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(SWEEP_INTERVAL) => {}
            }

            match self.cleanup_old_entries(PROCESSED_RETENTION).await {
                Ok(removed) => {
                    crate::metrics::record_entries_swept(removed);
                    if removed > 0 {
                        info!(removed, "Swept expired processed-block markers");
                    } else {
                        debug!("Processed-block sweep found nothing to evict");
                    }
                }
                Err(e) => error!(error = %e, "Processed-block sweep failed"),
            }
        }
        debug!("Cursor sweeper stopped");
    }
}

#[async_trait]
impl CursorStore for RedisCursorStore {
    async fn load(&self) -> Result<BlockNumber> {
        let mut conn = self.conn.clone();
        let value: Option<BlockNumber> = conn.get(&self.last_synced_key).await?;
        Ok(value.unwrap_or(0))
    }

    async fn save(&self, block_number: BlockNumber) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(&self.last_synced_key, block_number).await?;
        Ok(())
    }
}

#[async_trait]
impl ProcessedBlocks for RedisCursorStore {
    async fn is_processed(&self, block_number: BlockNumber) -> Result<bool> {
        let mut conn = self.conn.clone();
        let count: i64 = conn
            .zcount(&self.processed_key, block_number, block_number)
            .await?;
        Ok(count > 0)
    }

    async fn mark_processed(&self, block_number: BlockNumber) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .zadd(&self.processed_key, block_number, Utc::now().timestamp())
            .await?;
        Ok(())
    }

    async fn cleanup_old_entries(&self, max_age: Duration) -> Result<usize> {
        let cutoff = Utc::now().timestamp() - max_age.as_secs() as i64;
        let mut conn = self.conn.clone();
        let removed: usize = conn
            .zrembyscore(&self.processed_key, "-inf", cutoff)
            .await?;
        Ok(removed)
    }
}
