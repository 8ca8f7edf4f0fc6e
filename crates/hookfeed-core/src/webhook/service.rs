//! Orchestration of the ingestion pipeline.

use super::{AdapterSelection, WebhookError, WebhookRequest, WebhookResponse};
use crate::adapters::capture_request;
use crate::feeds::FeedCache;
use crate::messages::{FeedMessage, MessageStore, StoreError};
use crate::transform::TransformEngine;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Runs inbound requests through feed resolution, normalization, transforms
/// and storage.
///
/// Holds only shared, read-only collaborators, so one instance serves all
/// concurrent requests.
#[derive(Clone)]
pub struct WebhookService {
    feeds: Arc<FeedCache>,
    store: Arc<dyn MessageStore>,
    transforms: TransformEngine,
}

impl WebhookService {
    pub fn new(
        feeds: Arc<FeedCache>,
        store: Arc<dyn MessageStore>,
        transforms: TransformEngine,
    ) -> Self {
        Self {
            feeds,
            store,
            transforms,
        }
    }

    pub fn feeds(&self) -> &Arc<FeedCache> {
        &self.feeds
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Ingest a request and summarize the stored message
    #[instrument(skip(self, request), fields(routing_key = %request.routing_key))]
    pub async fn process_webhook(
        &self,
        request: WebhookRequest,
        selection: AdapterSelection,
    ) -> Result<WebhookResponse, WebhookError> {
        let message = self.ingest(request, selection).await?;
        Ok(WebhookResponse::from(&message))
    }

    /// Ingest a request and return the stored message
    ///
    /// # Errors
    ///
    /// - `WebhookError::FeedNotFound` - No feed owns the routing key
    /// - `WebhookError::AdapterParse` - The adapter could not read the request
    /// - `WebhookError::Script` - A transform script failed; names the script
    /// - `WebhookError::Store` - The store rejected the write
    pub async fn ingest(
        &self,
        request: WebhookRequest,
        selection: AdapterSelection,
    ) -> Result<FeedMessage, WebhookError> {
        let feed = self
            .feeds
            .get_by_routing_key(&request.routing_key)
            .ok_or_else(|| WebhookError::FeedNotFound {
                routing_key: request.routing_key.clone(),
            })?;

        let adapter_kind = match selection {
            AdapterSelection::FeedDefault => feed.primary_adapter(),
            AdapterSelection::Explicit(kind) => Some(kind),
        };

        let mut payload = match adapter_kind {
            Some(kind) => {
                let mut adapter = kind.create();
                adapter.unmarshal_request(&request)?;
                for warning in adapter.warnings() {
                    warn!(
                        feed_id = %feed.id,
                        adapter = %kind,
                        field = warning.field,
                        message = %warning.message,
                        "Field fell back to its default"
                    );
                }
                adapter.to_canonical_payload()
            }
            None => capture_request(&request),
        };

        // Stored under the feed id, never the alias used in the URL
        payload.feed_id = feed.id.clone();

        let scripts: Vec<String> = self
            .feeds
            .middleware_chain(feed)
            .map(str::to_string)
            .collect();
        if !scripts.is_empty() {
            debug!(feed_id = %feed.id, scripts = scripts.len(), "Running transform scripts");
            payload = self.transforms.apply_chain(&scripts, payload).await?;
        }

        // The write runs on its own task so that a dropped request cannot
        // interrupt it halfway.
        let store = Arc::clone(&self.store);
        let message = tokio::spawn(async move { store.create(payload).await })
            .await
            .map_err(|e| StoreError::OperationFailed {
                message: format!("store task failed: {}", e),
            })??;

        info!(
            message_id = %message.id,
            feed_id = %message.feed_id,
            priority = %message.priority,
            "Stored webhook message"
        );

        Ok(message)
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
