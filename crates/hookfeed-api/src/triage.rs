//! # Message Triage API
//!
//! Read and housekeeping endpoints over stored messages, mounted under
//! `/api/v1`. Bulk operations under `/feeds/{feedId}` only ever touch
//! messages of that feed, whatever ids the caller sends.

use crate::errors::MessageHandlerError;
use crate::responses::{
    BulkDeleteRequest, BulkDeleteResponse, BulkStateRequest, BulkStateResponse, FeedSummary,
    MessageQueryParams, StateUpdateRequest,
};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use hookfeed_core::feeds::Feed;
use hookfeed_core::messages::{DeleteSelector, FeedMessage, Page, StoreError};
use hookfeed_core::MessageId;
use tracing::{info, instrument};

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/feeds", get(list_feeds))
        .route("/api/v1/feeds/{feed_id}/messages", get(list_feed_messages))
        .route(
            "/api/v1/feeds/{feed_id}/messages/bulk-state",
            post(bulk_update_state),
        )
        .route(
            "/api/v1/feeds/{feed_id}/messages/bulk-delete",
            post(bulk_delete),
        )
        .route("/api/v1/feed-messages", get(search_messages))
        .route(
            "/api/v1/feed-messages/{id}",
            get(get_message).delete(delete_message),
        )
        .route("/api/v1/feed-messages/{id}/state", patch(update_message_state))
}

// ============================================================================
// Feeds
// ============================================================================

async fn list_feeds(State(state): State<AppState>) -> Json<Vec<FeedSummary>> {
    Json(state.feeds.list_all().iter().map(FeedSummary::from).collect())
}

#[instrument(skip(state, params))]
async fn list_feed_messages(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Query(params): Query<MessageQueryParams>,
) -> Result<Json<Page<FeedMessage>>, MessageHandlerError> {
    let feed = require_feed(&state, &feed_id)?;

    let (mut filter, page) = params.to_query()?;
    filter.feed_id = Some(feed.id.clone());

    Ok(Json(state.store.query(&filter, page).await?))
}

#[instrument(skip(state, request), fields(ids = request.ids.len()))]
async fn bulk_update_state(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Json(request): Json<BulkStateRequest>,
) -> Result<Json<BulkStateResponse>, MessageHandlerError> {
    let feed = require_feed(&state, &feed_id)?;
    let ids = owned_ids(&state, feed, &request.ids).await?;

    let updated = state.store.bulk_update_state(&ids, request.state).await?;
    info!(feed_id = %feed.id, updated, state = %request.state, "Bulk state update");

    Ok(Json(BulkStateResponse { updated }))
}

#[instrument(skip(state, request))]
async fn bulk_delete(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResponse>, MessageHandlerError> {
    let feed = require_feed(&state, &feed_id)?;

    let selector = match &request.ids {
        Some(ids) => DeleteSelector::Ids(owned_ids(&state, feed, ids).await?),
        None => request.filter_for(&feed.id)?,
    };

    let deleted = state.store.bulk_delete(&selector).await?;
    info!(feed_id = %feed.id, deleted, "Bulk delete");

    Ok(Json(BulkDeleteResponse { deleted }))
}

fn require_feed<'a>(state: &'a AppState, feed_id: &str) -> Result<&'a Feed, MessageHandlerError> {
    state
        .feeds
        .get_by_id(feed_id)
        .ok_or_else(|| MessageHandlerError::FeedNotFound {
            feed_id: feed_id.to_string(),
        })
}

/// Keep the ids that exist and belong to `feed`
async fn owned_ids(
    state: &AppState,
    feed: &Feed,
    ids: &[MessageId],
) -> Result<Vec<MessageId>, MessageHandlerError> {
    let mut owned = Vec::with_capacity(ids.len());
    for id in ids {
        match state.store.get(*id).await {
            Ok(message) if message.feed_id == feed.id => owned.push(*id),
            Ok(_) | Err(StoreError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(owned)
}

// ============================================================================
// Messages
// ============================================================================

#[instrument(skip(state, params))]
async fn search_messages(
    State(state): State<AppState>,
    Query(params): Query<MessageQueryParams>,
) -> Result<Json<Page<FeedMessage>>, MessageHandlerError> {
    let (filter, page) = params.to_query()?;
    Ok(Json(state.store.query(&filter, page).await?))
}

async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FeedMessage>, MessageHandlerError> {
    let id = parse_id(&id)?;
    Ok(Json(state.store.get(id).await?))
}

#[instrument(skip(state))]
async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, MessageHandlerError> {
    let id = parse_id(&id)?;
    state.store.delete(id).await?;
    info!(message_id = %id, "Deleted message");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, request))]
async fn update_message_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<StateUpdateRequest>,
) -> Result<Json<FeedMessage>, MessageHandlerError> {
    let id = parse_id(&id)?;
    Ok(Json(state.store.update_state(id, request.state).await?))
}

fn parse_id(id: &str) -> Result<MessageId, MessageHandlerError> {
    id.parse().map_err(|_| MessageHandlerError::InvalidMessageId { id: id.to_string() })
}

#[cfg(test)]
#[path = "triage_tests.rs"]
mod tests;
