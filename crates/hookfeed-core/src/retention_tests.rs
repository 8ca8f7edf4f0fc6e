//! Tests for retention enforcement

use super::*;
use crate::adapters::AdapterKind;
use crate::feeds::RetentionPolicy;
use crate::messages::{CanonicalPayload, MockMessageStore};
use crate::storage::InMemoryMessageStore;
use crate::RawJson;

fn feed(id: &str, max_count: u32, max_age_days: u32) -> Feed {
    Feed {
        id: id.to_string(),
        name: id.to_string(),
        category: String::new(),
        description: String::new(),
        routing_keys: vec![format!("{}-key", id)],
        middleware: Vec::new(),
        adapters_enabled: true,
        adapters: vec![AdapterKind::Raw],
        retention: RetentionPolicy {
            max_count,
            max_age_days,
        },
    }
}

fn payload(feed_id: &str, received_at: Timestamp) -> CanonicalPayload {
    CanonicalPayload::captured(
        feed_id,
        RawJson::empty_object(),
        RawJson::empty_object(),
        RawJson::empty_object(),
        received_at,
    )
}

/// Store holding messages for `feed_id` received 0, 1, .. `count - 1` days before `now`
async fn store_with_daily_messages(
    feed_id: &str,
    count: u32,
    now: Timestamp,
) -> Arc<InMemoryMessageStore> {
    let store = Arc::new(InMemoryMessageStore::new());
    for day in 0..count {
        store
            .create(payload(feed_id, now.days_before(day)))
            .await
            .unwrap();
    }
    store
}

/// Verify that messages past the age limit are deleted.
#[tokio::test]
async fn test_enforce_feed_removes_expired_messages() {
    let now = Timestamp::now();
    let store = store_with_daily_messages("builds", 5, now).await;
    let builds = feed("builds", 100, 2);
    let enforcer = RetentionEnforcer::new(
        Arc::new(FeedCache::build(vec![builds.clone()])),
        store.clone(),
    );

    let report = enforcer.enforce_feed(&builds, now).await.unwrap();

    // Days 3 and 4 are strictly older than the two day cutoff
    assert_eq!(report.expired, 2);
    assert_eq!(report.over_limit, 0);
    assert_eq!(store.len().await, 3);
}

/// Verify that only the newest max_count messages are kept.
#[tokio::test]
async fn test_enforce_feed_trims_to_max_count() {
    let now = Timestamp::now();
    let store = store_with_daily_messages("builds", 5, now).await;
    let builds = feed("builds", 2, 365);
    let enforcer = RetentionEnforcer::new(
        Arc::new(FeedCache::build(vec![builds.clone()])),
        store.clone(),
    );

    let report = enforcer.enforce_feed(&builds, now).await.unwrap();
    assert_eq!(report.over_limit, 3);

    let remaining = store
        .query(&MessageFilter::for_feed("builds"), Pagination::default())
        .await
        .unwrap();
    assert_eq!(remaining.total, 2);
    assert!(remaining.items.iter().all(|m| m.received_at >= now.days_before(1)));
}

/// Verify that the largest representable limits keep everything without panicking.
#[tokio::test]
async fn test_enforce_feed_with_extreme_limits() {
    let now = Timestamp::now();
    let store = store_with_daily_messages("builds", 3, now).await;
    let builds = feed("builds", u32::MAX, u32::MAX);
    let enforcer = RetentionEnforcer::new(
        Arc::new(FeedCache::build(vec![builds.clone()])),
        store.clone(),
    );

    let report = enforcer.enforce_feed(&builds, now).await.unwrap();

    assert_eq!(report.expired, 0);
    assert_eq!(report.over_limit, 0);
    assert_eq!(store.len().await, 3);
}

/// Verify that a zero day age limit removes everything received before now.
#[tokio::test]
async fn test_enforce_feed_with_zero_age() {
    let now = Timestamp::now();
    let store = store_with_daily_messages("builds", 3, now).await;
    let builds = feed("builds", 100, 0);
    let enforcer = RetentionEnforcer::new(
        Arc::new(FeedCache::build(vec![builds.clone()])),
        store.clone(),
    );

    let report = enforcer.enforce_feed(&builds, now).await.unwrap();

    // The message received exactly at `now` is not older than the cutoff
    assert_eq!(report.expired, 2);
    assert_eq!(store.len().await, 1);
}

/// Verify that other feeds' messages are untouched.
#[tokio::test]
async fn test_enforce_all_is_scoped_per_feed() {
    let now = Timestamp::now();
    let store = store_with_daily_messages("builds", 3, now).await;
    for day in 0..3 {
        store
            .create(payload("alerts", now.days_before(day)))
            .await
            .unwrap();
    }
    let feeds = FeedCache::build(vec![feed("builds", 1, 365), feed("alerts", 100, 365)]);
    let enforcer = RetentionEnforcer::new(Arc::new(feeds), store.clone());

    let report = enforcer.enforce_all().await;

    assert_eq!(report.deleted(), 2);
    assert!(report.failures.is_empty());
    let alerts = store
        .query(&MessageFilter::for_feed("alerts"), Pagination::default())
        .await
        .unwrap();
    assert_eq!(alerts.total, 3);
}

/// Verify that a store failure is reported without stopping the pass.
#[tokio::test]
async fn test_enforce_all_collects_failures() {
    let mut store = MockMessageStore::new();
    store.expect_bulk_delete().returning(|_| {
        Err(StoreError::Unavailable {
            message: "disk offline".to_string(),
        })
    });

    let feeds = FeedCache::build(vec![feed("builds", 10, 10), feed("alerts", 10, 10)]);
    let enforcer = RetentionEnforcer::new(Arc::new(feeds), Arc::new(store));

    let report = enforcer.enforce_all().await;

    assert!(report.feeds.is_empty());
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].0, "builds");
    assert!(report.failures[0].1.contains("disk offline"));
}
