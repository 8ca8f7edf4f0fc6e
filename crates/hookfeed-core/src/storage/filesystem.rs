//! # Filesystem Message Store
//!
//! Stores each message as a JSON document under `{base_path}/messages/{id}.json`.
//!
//! Writes go to a temporary file that is renamed into place, so a reader never
//! sees a partially written message. Mutations are serialized through a
//! process-local lock; the store assumes a single service instance owns the
//! directory.

use crate::messages::{
    paginate, CanonicalPayload, DeleteSelector, FeedMessage, MessageFilter, MessageStore, Page,
    Pagination, StoreError,
};
use crate::{MessageId, MessageState, Timestamp};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

const MESSAGES_DIR: &str = "messages";

/// Filesystem-backed message store
///
/// # Examples
///
/// ```no_run
/// use hookfeed_core::storage::FilesystemMessageStore;
/// use std::path::PathBuf;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FilesystemMessageStore::new(PathBuf::from("./data")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FilesystemMessageStore {
    base_path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FilesystemMessageStore {
    /// Open a store rooted at `base_path`, creating the directory layout if needed
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the directory cannot be created.
    pub async fn new(base_path: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(base_path.join(MESSAGES_DIR))
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("Failed to create message directory: {}", e),
            })?;

        Ok(Self {
            base_path,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn messages_dir(&self) -> PathBuf {
        self.base_path.join(MESSAGES_DIR)
    }

    fn message_path(&self, id: MessageId) -> PathBuf {
        self.messages_dir().join(format!("{}.json", id))
    }

    async fn read_message(&self, id: MessageId) -> Result<FeedMessage, StoreError> {
        let path = self.message_path(id);
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound { id }),
            Err(e) => {
                return Err(StoreError::Unavailable {
                    message: format!("Failed to read message file: {}", e),
                })
            }
        };

        serde_json::from_slice(&content).map_err(|e| StoreError::OperationFailed {
            message: format!("Failed to parse message {}: {}", id, e),
        })
    }

    /// Write via a sibling temp file and rename. The temp file is removed
    /// again if any step fails.
    async fn write_message(&self, message: &FeedMessage) -> Result<(), StoreError> {
        let path = self.message_path(message.id);
        let temp_path = path.with_extension("tmp");

        let content =
            serde_json::to_vec_pretty(message).map_err(|e| StoreError::OperationFailed {
                message: format!("Failed to serialize message: {}", e),
            })?;

        let result = match Self::write_temp(&temp_path, &content).await {
            Ok(()) => fs::rename(&temp_path, &path)
                .await
                .map_err(|e| StoreError::Unavailable {
                    message: format!("Failed to rename temp file: {}", e),
                }),
            Err(e) => Err(e),
        };

        if result.is_err() {
            if let Err(e) = fs::remove_file(&temp_path).await {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %temp_path.display(), error = %e, "Failed to remove temp file");
                }
            }
        }

        result
    }

    async fn write_temp(temp_path: &Path, content: &[u8]) -> Result<(), StoreError> {
        let mut file = fs::File::create(temp_path)
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("Failed to create temp file: {}", e),
            })?;
        file.write_all(content)
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("Failed to write temp file: {}", e),
            })?;
        file.flush().await.map_err(|e| StoreError::Unavailable {
            message: format!("Failed to flush temp file: {}", e),
        })
    }

    async fn remove_message(&self, id: MessageId) -> Result<(), StoreError> {
        match fs::remove_file(self.message_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound { id }),
            Err(e) => Err(StoreError::Unavailable {
                message: format!("Failed to delete message file: {}", e),
            }),
        }
    }

    /// Every stored message. Unreadable files are logged and skipped.
    async fn read_all(&self) -> Result<Vec<FeedMessage>, StoreError> {
        let mut entries =
            fs::read_dir(self.messages_dir())
                .await
                .map_err(|e| StoreError::Unavailable {
                    message: format!("Failed to list message directory: {}", e),
                })?;

        let mut messages = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("Failed to list message directory: {}", e),
            })?
        {
            let path = entry.path();
            let Some(id) = message_id_from_path(&path) else {
                continue;
            };

            match self.read_message(id).await {
                Ok(message) => messages.push(message),
                // Deleted between listing and reading
                Err(StoreError::NotFound { .. }) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable message file"),
            }
        }

        Ok(messages)
    }
}

fn message_id_from_path(path: &Path) -> Option<MessageId> {
    if path.extension()? != "json" {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

#[async_trait]
impl MessageStore for FilesystemMessageStore {
    async fn create(&self, payload: CanonicalPayload) -> Result<FeedMessage, StoreError> {
        let message = FeedMessage::from_payload(payload);
        let _guard = self.write_lock.lock().await;
        self.write_message(&message).await?;
        Ok(message)
    }

    async fn get(&self, id: MessageId) -> Result<FeedMessage, StoreError> {
        self.read_message(id).await
    }

    async fn query(
        &self,
        filter: &MessageFilter,
        page: Pagination,
    ) -> Result<Page<FeedMessage>, StoreError> {
        let matches = self
            .read_all()
            .await?
            .into_iter()
            .filter(|message| filter.matches(message))
            .collect();
        Ok(paginate(matches, page))
    }

    async fn update_state(
        &self,
        id: MessageId,
        state: MessageState,
    ) -> Result<FeedMessage, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut message = self.read_message(id).await?;
        message.transition_to(state, Timestamp::now());
        self.write_message(&message).await?;
        Ok(message)
    }

    async fn bulk_update_state(
        &self,
        ids: &[MessageId],
        state: MessageState,
    ) -> Result<usize, StoreError> {
        let now = Timestamp::now();
        let _guard = self.write_lock.lock().await;

        let mut updated = 0;
        for id in ids {
            let mut message = match self.read_message(*id).await {
                Ok(message) => message,
                Err(StoreError::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            };
            message.transition_to(state, now);
            self.write_message(&message).await?;
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete(&self, id: MessageId) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.remove_message(id).await
    }

    async fn bulk_delete(&self, selector: &DeleteSelector) -> Result<usize, StoreError> {
        selector.validate()?;
        let _guard = self.write_lock.lock().await;

        let targets: Vec<MessageId> = match selector {
            DeleteSelector::Ids(ids) => ids.clone(),
            DeleteSelector::Filter(_) => self
                .read_all()
                .await?
                .iter()
                .filter(|message| selector.matches(message))
                .map(|message| message.id)
                .collect(),
        };

        let mut deleted = 0;
        for id in targets {
            match self.remove_message(id).await {
                Ok(()) => deleted += 1,
                Err(StoreError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
#[path = "filesystem_tests.rs"]
mod tests;
