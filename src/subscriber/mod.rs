//! Subscriber SDK.
//!
//! Downstream consumers join a consumer group on the events stream,
//! resume from their persisted checkpoint, drain history, then tail live
//! entries. The two-phase protocol is what makes consumption resumable:
//! historical mode reads by id (which yields the consumer's own pending
//! entries), live mode reads `>` (entries never delivered to anyone in
//! the group).
//!
//! The group read/ack surface is the [`GroupStream`] trait; the run loop
//! is generic over it, so tests drive the protocol with an in-memory
//! stream while [`RedisGroupStream`] binds it to the real fabric.
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use tron_events::subscriber::{Subscriber, SubscriberConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SubscriberConfig::new("redis://127.0.0.1:6379/0", "billing", "worker-1");
//!     let mut subscriber = Subscriber::connect(config).await?;
//!
//!     subscriber
//!         .run(CancellationToken::new(), |event| async move {
//!             let tx = event.transaction()?;
//!             println!("{} in block {}", tx.id, tx.block_number);
//!             Ok(())
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

mod state_store;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamReadOptions, StreamReadReply};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub use state_store::{FileStateStore, StateStore};

use crate::error::{Error, Result};
use crate::publisher::STREAM_NAME;
use crate::scanner::NormalizedTransaction;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_READ_BLOCK_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_STATE_STORE_PATH: &str = "last_processed_id.txt";

/// Pause after a failed stream read before trying again.
const READ_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Where to start when no checkpoint exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InitialPosition {
    /// Process the full retained history.
    #[default]
    Beginning,
    /// Only entries published after the subscriber joins.
    End,
}

/// What to do when the handler returns an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HandlerErrorPolicy {
    /// Log, acknowledge and move on; failures are the application's
    /// responsibility to record.
    #[default]
    AckAndLog,
    /// Leave the entry pending and re-drain the pending list, so the
    /// entry is redelivered until the handler succeeds.
    NackAndRetry,
}

/// Subscriber configuration.
#[derive(Clone)]
pub struct SubscriberConfig {
    pub redis_url: String,
    pub stream_name: String,
    pub group_name: String,
    pub consumer_name: String,
    /// Checkpoint persistence; a file store at `state_store_path` when
    /// unset.
    pub state_store: Option<Arc<dyn StateStore>>,
    pub state_store_path: String,
    pub batch_size: usize,
    pub read_block_timeout: Duration,
    pub initial_position: InitialPosition,
    pub on_handler_error: HandlerErrorPolicy,
}

impl SubscriberConfig {
    #[must_use]
    pub fn new(redis_url: &str, group_name: &str, consumer_name: &str) -> Self {
        Self {
            redis_url: redis_url.to_string(),
            stream_name: STREAM_NAME.to_string(),
            group_name: group_name.to_string(),
            consumer_name: consumer_name.to_string(),
            state_store: None,
            state_store_path: DEFAULT_STATE_STORE_PATH.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            read_block_timeout: DEFAULT_READ_BLOCK_TIMEOUT,
            initial_position: InitialPosition::default(),
            on_handler_error: HandlerErrorPolicy::default(),
        }
    }

    #[must_use]
    pub fn stream_name(mut self, stream_name: &str) -> Self {
        self.stream_name = stream_name.to_string();
        self
    }

    #[must_use]
    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    #[must_use]
    pub fn state_store_path(mut self, path: &str) -> Self {
        self.state_store_path = path.to_string();
        self
    }

    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn read_block_timeout(mut self, timeout: Duration) -> Self {
        self.read_block_timeout = timeout;
        self
    }

    #[must_use]
    pub fn initial_position(mut self, position: InitialPosition) -> Self {
        self.initial_position = position;
        self
    }

    #[must_use]
    pub fn on_handler_error(mut self, policy: HandlerErrorPolicy) -> Self {
        self.on_handler_error = policy;
        self
    }
}

/// One stream entry delivered to the handler.
#[derive(Debug, Clone)]
pub struct Event {
    /// Stream-assigned id, time-ordered within the stream.
    pub id: String,
    pub fields: HashMap<String, String>,
}

impl Event {
    /// The serialized transaction, when present.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        self.fields.get("payload").map(String::as_str)
    }

    /// Deserializes the payload into a [`NormalizedTransaction`].
    pub fn transaction(&self) -> Result<NormalizedTransaction> {
        let payload = self
            .payload()
            .ok_or_else(|| Error::MalformedTask("stream entry without payload field".into()))?;
        Ok(serde_json::from_str(payload)?)
    }
}

/// Errors returned by user handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Consumer-group access to the events stream. The seam the run loop is
/// written against; tests substitute an in-memory stream.
#[async_trait]
pub trait GroupStream: Send + Sync {
    /// Creates the consumer group anchored at end-of-stream; an already
    /// existing group is not an error.
    async fn create_group(&mut self) -> Result<()>;

    /// Block-reads up to `count` entries for this consumer. `read_id` is
    /// either an explicit id (the consumer's pending entries after that
    /// id) or the `>` sentinel (entries never delivered to the group).
    async fn read(&mut self, read_id: &str, count: usize) -> Result<Vec<Event>>;

    /// Retires an entry from the group's pending list.
    async fn ack(&mut self, entry_id: &str) -> Result<()>;
}

/// [`GroupStream`] over a Redis stream.
///
/// Owns a dedicated connection: the blocking group read must not starve
/// shared multiplexed traffic.
pub struct RedisGroupStream {
    conn: MultiplexedConnection,
    stream_name: String,
    group_name: String,
    consumer_name: String,
    block_timeout: Duration,
}

impl RedisGroupStream {
    pub async fn connect(config: &SubscriberConfig) -> Result<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let conn = client.get_multiplexed_async_connection().await?;

        Ok(Self {
            conn,
            stream_name: config.stream_name.clone(),
            group_name: config.group_name.clone(),
            consumer_name: config.consumer_name.clone(),
            block_timeout: config.read_block_timeout,
        })
    }
}

#[async_trait]
impl GroupStream for RedisGroupStream {
    async fn create_group(&mut self) -> Result<()> {
        let result: redis::RedisResult<()> = self
            .conn
            .xgroup_create_mkstream(&self.stream_name, &self.group_name, "$")
            .await;

        match result {
            Ok(()) => {
                debug!(group = %self.group_name, "Consumer group created");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&mut self, read_id: &str, count: usize) -> Result<Vec<Event>> {
        let options = StreamReadOptions::default()
            .group(&self.group_name, &self.consumer_name)
            .count(count)
            .block(self.block_timeout.as_millis() as usize);

        let reply: Option<StreamReadReply> = self
            .conn
            .xread_options(&[self.stream_name.as_str()], &[read_id], &options)
            .await?;

        let Some(reply) = reply else {
            return Ok(Vec::new());
        };

        let mut events = Vec::new();
        for key in reply.keys {
            for entry in key.ids {
                let mut fields = HashMap::with_capacity(entry.map.len());
                for (name, value) in &entry.map {
                    if let Ok(text) = redis::from_redis_value::<String>(value) {
                        fields.insert(name.clone(), text);
                    }
                }
                events.push(Event {
                    id: entry.id,
                    fields,
                });
            }
        }
        Ok(events)
    }

    async fn ack(&mut self, entry_id: &str) -> Result<()> {
        let _: i64 = self
            .conn
            .xack(&self.stream_name, &self.group_name, &[entry_id])
            .await?;
        Ok(())
    }
}

/// Where the next read starts.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadPosition {
    /// Historical reads by explicit id (the consumer's pending entries).
    CatchUp(String),
    /// Live tailing via the `>` sentinel.
    Live,
}

impl ReadPosition {
    fn as_read_id(&self) -> &str {
        match self {
            ReadPosition::CatchUp(id) => id.as_str(),
            ReadPosition::Live => ">",
        }
    }
}

/// Seeds the read position from the stored checkpoint, falling back to
/// the configured initial position.
fn seed_position(checkpoint: Option<String>, initial: InitialPosition) -> ReadPosition {
    match (checkpoint, initial) {
        (Some(id), _) => ReadPosition::CatchUp(id),
        (None, InitialPosition::Beginning) => ReadPosition::CatchUp("0-0".to_string()),
        (None, InitialPosition::End) => ReadPosition::Live,
    }
}

pub struct Subscriber<S: GroupStream = RedisGroupStream> {
    config: SubscriberConfig,
    stream: S,
    state_store: Arc<dyn StateStore>,
}

impl Subscriber<RedisGroupStream> {
    /// Connects to the stream backend and resolves the checkpoint store.
    pub async fn connect(config: SubscriberConfig) -> Result<Self> {
        let stream = RedisGroupStream::connect(&config).await?;
        Ok(Self::with_stream(config, stream))
    }
}

impl<S: GroupStream> Subscriber<S> {
    /// A subscriber over an explicit [`GroupStream`].
    pub fn with_stream(config: SubscriberConfig, stream: S) -> Self {
        let state_store = config
            .state_store
            .clone()
            .unwrap_or_else(|| Arc::new(FileStateStore::new(&config.state_store_path)));

        Self {
            config,
            stream,
            state_store,
        }
    }

    /// Processes events until cancelled; returns [`Error::Shutdown`] on
    /// cancellation. The in-flight entry completes and is checkpointed
    /// before returning.
    pub async fn run<F, Fut>(&mut self, cancel: CancellationToken, mut handler: F) -> Result<()>
    where
        F: FnMut(Event) -> Fut,
        Fut: Future<Output = std::result::Result<(), HandlerError>>,
    {
        self.stream.create_group().await?;

        let checkpoint = self
            .state_store
            .get_last_processed_id(&self.config.group_name, &self.config.consumer_name)
            .await?;

        let mut position = seed_position(checkpoint.clone(), self.config.initial_position);
        match &checkpoint {
            Some(id) => info!(last_id = %id, "Resuming from checkpoint"),
            None => info!(position = ?position, "No checkpoint, starting fresh"),
        }

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Shutdown);
            }

            let reply = tokio::select! {
                () = cancel.cancelled() => return Err(Error::Shutdown),
                reply = self.stream.read(position.as_read_id(), self.config.batch_size) => reply,
            };

            let entries = match reply {
                Ok(entries) => entries,
                Err(e) => {
                    error!(error = %e, "Stream read failed");
                    tokio::select! {
                        () = cancel.cancelled() => return Err(Error::Shutdown),
                        () = tokio::time::sleep(READ_RETRY_DELAY) => {}
                    }
                    continue;
                }
            };

            if entries.is_empty() {
                if let ReadPosition::CatchUp(_) = position {
                    info!("Finished catching up, switching to live mode");
                    position = ReadPosition::Live;
                }
                continue;
            }

            for event in entries {
                let entry_id = event.id.clone();

                if let Err(e) = handler(event).await {
                    match self.config.on_handler_error {
                        HandlerErrorPolicy::AckAndLog => {
                            error!(entry = %entry_id, error = %e, "Handler failed, acknowledging anyway");
                        }
                        HandlerErrorPolicy::NackAndRetry => {
                            error!(entry = %entry_id, error = %e, "Handler failed, re-draining pending entries");
                            // The entry (and the rest of this batch) stays
                            // in the pending list; restart from its head.
                            position = ReadPosition::CatchUp("0".to_string());
                            break;
                        }
                    }
                }

                if let Err(e) = self.stream.ack(&entry_id).await {
                    error!(entry = %entry_id, error = %e, "Failed to acknowledge entry");
                }

                if let ReadPosition::CatchUp(ref mut last_id) = position {
                    *last_id = entry_id.clone();
                }
                if let Err(e) = self
                    .state_store
                    .save_last_processed_id(
                        &self.config.group_name,
                        &self.config.consumer_name,
                        &entry_id,
                    )
                    .await
                {
                    error!(entry = %entry_id, error = %e, "Failed to persist checkpoint");
                }
            }
        }
    }
}
