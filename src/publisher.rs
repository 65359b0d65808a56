//! Event publishing.
//!
//! Every transaction becomes one stream entry with a single `payload`
//! field holding its canonical JSON. Appends carry an approximate MAXLEN
//! trim hint so the stream stays near the seven-day window without
//! per-append trimming cost.
//!
//! Single appends go through a token limiter (one token per 3s/500) so
//! catch-up storms cannot drown the stream; batch appends are already
//! pipelined into one round-trip and bypass the limiter.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use redis::streams::StreamMaxlen;
use tokio::sync::Mutex;
use tokio::time::{Interval, MissedTickBehavior};

use crate::error::Result;
use crate::scanner::NormalizedTransaction;

/// Stream the daemon publishes to.
pub const STREAM_NAME: &str = "tron:events";

/// Approximate stream length cap: seven days of three-second blocks.
pub const STREAM_MAX_LEN: usize = 201_600;

/// Single-publish pacing: 500 appends per 3-second block time.
const PUBLISH_TICK: Duration = Duration::from_millis(6);

/// Append seam used by the tip controller and block workers.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Appends one transaction, rate-limited.
    async fn publish(&self, tx: &NormalizedTransaction) -> Result<()>;

    /// Appends each transaction as a separate entry in a single pipelined
    /// round-trip; partial failures fail the whole batch.
    async fn publish_batch(&self, txs: &[NormalizedTransaction]) -> Result<()>;
}

pub struct EventPublisher {
    conn: ConnectionManager,
    stream: String,
    limiter: Mutex<Interval>,
}

impl EventPublisher {
    pub fn new(conn: ConnectionManager) -> Self {
        Self::with_stream(conn, STREAM_NAME)
    }

    pub fn with_stream(conn: ConnectionManager, stream: &str) -> Self {
        let mut limiter = tokio::time::interval(PUBLISH_TICK);
        limiter.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            conn,
            stream: stream.to_string(),
            limiter: Mutex::new(limiter),
        }
    }
}

#[async_trait]
impl EventSink for EventPublisher {
    async fn publish(&self, tx: &NormalizedTransaction) -> Result<()> {
        self.limiter.lock().await.tick().await;

        let payload = serde_json::to_string(tx)?;
        let mut conn = self.conn.clone();
        let _: String = conn
            .xadd_maxlen(
                &self.stream,
                StreamMaxlen::Approx(STREAM_MAX_LEN),
                "*",
                &[("payload", payload.as_str())],
            )
            .await?;

        crate::metrics::record_transactions_published(1);
        Ok(())
    }

    async fn publish_batch(&self, txs: &[NormalizedTransaction]) -> Result<()> {
        if txs.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for tx in txs {
            let payload = serde_json::to_string(tx)?;
            pipe.xadd_maxlen(
                &self.stream,
                StreamMaxlen::Approx(STREAM_MAX_LEN),
                "*",
                &[("payload", payload.as_str())],
            )
            .ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;

        crate::metrics::record_transactions_published(txs.len());
        Ok(())
    }
}
