//! Tests for the feed cache.

use super::*;
use crate::feeds::FeedDefinition;
use std::sync::Arc;

fn feed(id: &str, keys: &[&str]) -> Feed {
    Feed::from(FeedDefinition {
        name: id.to_uppercase(),
        id: id.to_string(),
        keys: keys.iter().map(|k| k.to_string()).collect(),
        ..Default::default()
    })
}

/// Verify that every routing key resolves to the same feed as the id lookup.
#[test]
fn test_routing_keys_resolve_to_owning_feed() {
    let cache = FeedCache::build(vec![
        feed("builds", &["builds", "ci-7f3a", "jenkins"]),
        feed("alerts", &["alerts"]),
        feed("deploys", &["deploys", "cd"]),
    ]);

    for feed in cache.list_all() {
        let by_id = cache.get_by_id(&feed.id).unwrap();
        for key in &feed.routing_keys {
            assert_eq!(cache.get_by_routing_key(key), Some(by_id), "key: {key}");
        }
    }
}

/// Verify that lookups for unknown ids and keys return nothing.
#[test]
fn test_missing_lookups() {
    let cache = FeedCache::build(vec![feed("builds", &["ci"])]);

    assert!(cache.get_by_id("nope").is_none());
    assert!(cache.get_by_routing_key("nope").is_none());
    // The id alone is not a routing key unless listed
    assert!(cache.get_by_routing_key("builds").is_none());
}

/// Verify that listing preserves configuration order.
#[test]
fn test_list_all_preserves_order() {
    let cache = FeedCache::build(vec![
        feed("zeta", &["z"]),
        feed("alpha", &["a"]),
        feed("mid", &["m"]),
    ]);

    let ids: Vec<&str> = cache.list_all().iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
    assert_eq!(cache.len(), 3);
    assert!(!cache.is_empty());
}

/// Verify that a duplicated routing key resolves to the later feed.
#[test]
fn test_duplicate_routing_key_last_write_wins() {
    let cache = FeedCache::build(vec![feed("first", &["shared"]), feed("second", &["shared"])]);

    let resolved = cache.get_by_routing_key("shared").unwrap();
    assert_eq!(resolved.id, "second");
}

/// Verify that global middleware runs ahead of feed middleware.
#[test]
fn test_middleware_chain_order() {
    let mut with_scripts = feed("builds", &["ci"]);
    with_scripts.middleware = vec!["feed-a.rhai".to_string(), "feed-b.rhai".to_string()];

    let cache = FeedCache::build(vec![with_scripts])
        .with_global_middleware(vec!["global.rhai".to_string()]);

    let feed = cache.get_by_id("builds").unwrap();
    let chain: Vec<&str> = cache.middleware_chain(feed).collect();
    assert_eq!(chain, vec!["global.rhai", "feed-a.rhai", "feed-b.rhai"]);
}

/// Verify that a cache built from a feed file carries its global middleware.
#[test]
fn test_from_file() {
    let file = FeedFile::from_yaml_str(
        r#"
middleware: [stamp.rhai]
feeds:
  - name: Builds
    id: builds
    keys: [ci]
"#,
    )
    .unwrap();

    let cache = FeedCache::from_file(&file);
    assert_eq!(cache.global_middleware(), &["stamp.rhai".to_string()]);
    assert_eq!(cache.get_by_routing_key("ci").unwrap().name, "Builds");
}

/// Verify that the cache can be read concurrently from many threads.
#[test]
fn test_concurrent_reads() {
    let cache = Arc::new(FeedCache::build(vec![
        feed("builds", &["ci"]),
        feed("alerts", &["pager"]),
    ]));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                let key = if i % 2 == 0 { "ci" } else { "pager" };
                for _ in 0..1000 {
                    assert!(cache.get_by_routing_key(key).is_some());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
