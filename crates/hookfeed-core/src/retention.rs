//! # Retention
//!
//! Applies each feed's [`RetentionPolicy`](crate::feeds::RetentionPolicy) to
//! stored messages: messages older than `max_age_days` are removed, then the
//! oldest messages beyond `max_count` are removed.

use crate::feeds::{Feed, FeedCache};
use crate::messages::{
    DeleteFilter, DeleteSelector, MessageFilter, MessageStore, Pagination, StoreError,
};
use crate::{MessageId, Timestamp};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Messages removed from one feed by a retention pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedRetentionReport {
    pub feed_id: String,
    pub expired: usize,
    pub over_limit: usize,
}

impl FeedRetentionReport {
    pub fn total(&self) -> usize {
        self.expired + self.over_limit
    }
}

/// Outcome of a retention pass over every feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub feeds: Vec<FeedRetentionReport>,
    /// Feeds whose pass failed, with the error text
    pub failures: Vec<(String, String)>,
}

impl RetentionReport {
    /// Total messages deleted across all feeds
    pub fn deleted(&self) -> usize {
        self.feeds.iter().map(FeedRetentionReport::total).sum()
    }
}

/// Deletes messages that fall outside their feed's retention policy
#[derive(Clone)]
pub struct RetentionEnforcer {
    feeds: Arc<FeedCache>,
    store: Arc<dyn MessageStore>,
}

impl RetentionEnforcer {
    pub fn new(feeds: Arc<FeedCache>, store: Arc<dyn MessageStore>) -> Self {
        Self { feeds, store }
    }

    /// Apply one feed's policy relative to `now`
    pub async fn enforce_feed(
        &self,
        feed: &Feed,
        now: Timestamp,
    ) -> Result<FeedRetentionReport, StoreError> {
        let policy = feed.retention;

        let age_filter = DeleteSelector::Filter(DeleteFilter {
            feed_id: Some(feed.id.clone()),
            priority: None,
            older_than: Some(now.days_before(policy.max_age_days)),
        });
        let expired = self.store.bulk_delete(&age_filter).await?;

        // Everything after the newest `max_count` messages
        let overflow = self
            .store
            .query(
                &MessageFilter::for_feed(feed.id.clone()),
                Pagination {
                    skip: policy.max_count as usize,
                    limit: usize::MAX,
                },
            )
            .await?;
        let over_limit = if overflow.items.is_empty() {
            0
        } else {
            let ids: Vec<MessageId> = overflow.items.iter().map(|m| m.id).collect();
            self.store.bulk_delete(&DeleteSelector::Ids(ids)).await?
        };

        Ok(FeedRetentionReport {
            feed_id: feed.id.clone(),
            expired,
            over_limit,
        })
    }

    /// Apply every feed's policy. A failing feed does not stop the others.
    #[instrument(skip(self))]
    pub async fn enforce_all(&self) -> RetentionReport {
        let now = Timestamp::now();
        let mut report = RetentionReport::default();

        for feed in self.feeds.list_all() {
            match self.enforce_feed(feed, now).await {
                Ok(feed_report) => report.feeds.push(feed_report),
                Err(e) => {
                    warn!(feed_id = %feed.id, error = %e, "Retention pass failed");
                    report.failures.push((feed.id.clone(), e.to_string()));
                }
            }
        }

        if report.deleted() > 0 {
            info!(deleted = report.deleted(), "Retention pass removed messages");
        }

        report
    }
}

impl std::fmt::Debug for RetentionEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionEnforcer")
            .field("feeds", &self.feeds.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "retention_tests.rs"]
mod tests;
