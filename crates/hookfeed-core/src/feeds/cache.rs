//! Read-only feed lookup structures built once at startup.

use super::{Feed, FeedFile};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Immutable lookup cache over the configured feeds.
///
/// Holds three aligned views of the same feed set: the configuration order
/// for listings, an id index, and a routing key → feed id index. The cache is
/// never mutated after [`FeedCache::build`], so it can be shared across
/// request handlers behind an `Arc` without locking.
#[derive(Debug, Clone, Default)]
pub struct FeedCache {
    feeds: Vec<Feed>,
    by_id: HashMap<String, usize>,
    by_routing_key: HashMap<String, String>,
    global_middleware: Vec<String>,
}

impl FeedCache {
    /// Build the cache from resolved feeds.
    ///
    /// A routing key that appears on more than one feed resolves to the feed
    /// that was listed last. This is logged as a misconfiguration; loading
    /// through [`FeedFile::validate`] rejects it before it gets here.
    pub fn build(feeds: Vec<Feed>) -> Self {
        let mut by_id = HashMap::with_capacity(feeds.len());
        let mut by_routing_key = HashMap::new();

        for (index, feed) in feeds.iter().enumerate() {
            if by_id.insert(feed.id.clone(), index).is_some() {
                warn!(feed_id = %feed.id, "Duplicate feed id, later definition wins");
            }

            for key in &feed.routing_keys {
                if let Some(previous) = by_routing_key.insert(key.clone(), feed.id.clone()) {
                    if previous != feed.id {
                        warn!(
                            routing_key = %key,
                            previous_feed = %previous,
                            feed_id = %feed.id,
                            "Routing key claimed by multiple feeds, later definition wins"
                        );
                    }
                }
            }
        }

        debug!(
            feeds = feeds.len(),
            routing_keys = by_routing_key.len(),
            "Built feed cache"
        );

        Self {
            feeds,
            by_id,
            by_routing_key,
            global_middleware: Vec::new(),
        }
    }

    /// Build the cache from a validated feed file, including its global middleware
    pub fn from_file(file: &FeedFile) -> Self {
        Self::build(file.to_feeds()).with_global_middleware(file.middleware.clone())
    }

    /// Set the scripts that run for every feed ahead of the feed's own scripts
    pub fn with_global_middleware(mut self, middleware: Vec<String>) -> Self {
        self.global_middleware = middleware;
        self
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Feed> {
        self.by_id.get(id).map(|&index| &self.feeds[index])
    }

    pub fn get_by_routing_key(&self, key: &str) -> Option<&Feed> {
        self.by_routing_key
            .get(key)
            .and_then(|id| self.get_by_id(id))
    }

    /// All feeds in configuration order
    pub fn list_all(&self) -> &[Feed] {
        &self.feeds
    }

    pub fn global_middleware(&self) -> &[String] {
        &self.global_middleware
    }

    /// Scripts to run for a feed: global middleware first, then the feed's own
    pub fn middleware_chain<'a>(&'a self, feed: &'a Feed) -> impl Iterator<Item = &'a str> + 'a {
        self.global_middleware
            .iter()
            .chain(feed.middleware.iter())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
