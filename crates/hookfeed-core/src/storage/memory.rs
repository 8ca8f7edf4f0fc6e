//! # In-Memory Message Store
//!
//! Process-local message store for development, tests and deployments that
//! do not need messages to survive a restart.

use crate::messages::{
    paginate, CanonicalPayload, DeleteSelector, FeedMessage, MessageFilter, MessageStore, Page,
    Pagination, StoreError,
};
use crate::{MessageId, MessageState, Timestamp};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Message store backed by a map behind an async read-write lock
#[derive(Debug, Clone, Default)]
pub struct InMemoryMessageStore {
    messages: Arc<RwLock<HashMap<MessageId, FeedMessage>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn create(&self, payload: CanonicalPayload) -> Result<FeedMessage, StoreError> {
        let message = FeedMessage::from_payload(payload);
        self.messages
            .write()
            .await
            .insert(message.id, message.clone());
        Ok(message)
    }

    async fn get(&self, id: MessageId) -> Result<FeedMessage, StoreError> {
        self.messages
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { id })
    }

    async fn query(
        &self,
        filter: &MessageFilter,
        page: Pagination,
    ) -> Result<Page<FeedMessage>, StoreError> {
        let matches: Vec<FeedMessage> = self
            .messages
            .read()
            .await
            .values()
            .filter(|message| filter.matches(message))
            .cloned()
            .collect();
        Ok(paginate(matches, page))
    }

    async fn update_state(
        &self,
        id: MessageId,
        state: MessageState,
    ) -> Result<FeedMessage, StoreError> {
        let mut messages = self.messages.write().await;
        let message = messages.get_mut(&id).ok_or(StoreError::NotFound { id })?;
        message.transition_to(state, Timestamp::now());
        Ok(message.clone())
    }

    async fn bulk_update_state(
        &self,
        ids: &[MessageId],
        state: MessageState,
    ) -> Result<usize, StoreError> {
        let now = Timestamp::now();
        let mut messages = self.messages.write().await;
        let mut updated = 0;
        for id in ids {
            if let Some(message) = messages.get_mut(id) {
                message.transition_to(state, now);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete(&self, id: MessageId) -> Result<(), StoreError> {
        self.messages
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound { id })
    }

    async fn bulk_delete(&self, selector: &DeleteSelector) -> Result<usize, StoreError> {
        selector.validate()?;

        let mut messages = self.messages.write().await;
        let before = messages.len();
        messages.retain(|_, message| !selector.matches(message));
        Ok(before - messages.len())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
