use thiserror::Error;

use crate::scanner::BlockNumber;

/// Errors surfaced by the ingestion pipeline and the subscriber SDK.
#[derive(Error, Debug)]
pub enum Error {
    #[error("node RPC error: {0}")]
    Rpc(#[from] reqwest::Error),

    #[error("node RPC timed out")]
    Timeout,

    #[error("block {0} not found")]
    BlockNotFound(BlockNumber),

    #[error("storage backend error: {0}")]
    Storage(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("malformed task payload: {0}")]
    MalformedTask(String),

    #[error("no handler registered for task type {0:?}")]
    UnknownTaskType(String),

    #[error("checkpoint store error: {0}")]
    Checkpoint(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("service is shutting down")]
    Shutdown,
}

impl Error {
    /// Whether a retry can succeed. Malformed payloads never benefit from
    /// one; everything else is assumed transient (including missing blocks,
    /// which reorgs and propagation delays can hide temporarily).
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Error::MalformedTask(_) | Error::UnknownTaskType(_))
    }
}

/// Convenience result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
