//! Checkpoint persistence for subscribers.
//!
//! The default store is a single file whose body is
//! `group:consumer:last_id`. A checkpoint written by a different
//! `(group, consumer)` identity is treated as absent, not as an error, so
//! redeployments under a new identity start cleanly.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;

/// Pluggable persistence for the last processed stream id, keyed by
/// `(group, consumer)`.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save_last_processed_id(&self, group: &str, consumer: &str, last_id: &str)
    -> Result<()>;

    /// Returns `None` when no checkpoint exists for this identity.
    async fn get_last_processed_id(&self, group: &str, consumer: &str) -> Result<Option<String>>;
}

/// File-backed [`StateStore`].
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn save_last_processed_id(
        &self,
        group: &str,
        consumer: &str,
        last_id: &str,
    ) -> Result<()> {
        let body = format!("{group}:{consumer}:{last_id}");
        tokio::fs::write(&self.path, body).await?;
        Ok(())
    }

    async fn get_last_processed_id(&self, group: &str, consumer: &str) -> Result<Option<String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut parts = content.trim().splitn(3, ':');
        let (Some(stored_group), Some(stored_consumer), Some(last_id)) =
            (parts.next(), parts.next(), parts.next())
        else {
            warn!(path = %self.path.display(), "Ignoring malformed checkpoint file");
            return Ok(None);
        };

        if stored_group != group || stored_consumer != consumer {
            warn!(
                path = %self.path.display(),
                stored_group,
                stored_consumer,
                "Checkpoint belongs to a different consumer identity, ignoring"
            );
            return Ok(None);
        }

        Ok(Some(last_id.to_string()))
    }
}
