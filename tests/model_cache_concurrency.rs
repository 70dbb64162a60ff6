//! Model cache under concurrent dispatch, over real HTTP.

use mockito::Server;
use resilient_llm_backend::models::ModelCache;
use resilient_llm_backend::transport::HttpTransport;
use std::sync::Arc;
use std::time::Duration;

const TAGS: &str = r#"{"models":[{"name":"phi3:mini"},{"name":"llama3:8b"}]}"#;

fn cache() -> Arc<ModelCache> {
    Arc::new(ModelCache::new(
        Arc::new(HttpTransport::new().expect("transport builds")),
        Duration::from_secs(300),
        Duration::from_secs(10),
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_lookups_fetch_listing_once() {
    let mut server = Server::new_async().await;
    let tags = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(TAGS)
        .expect(1)
        .create_async()
        .await;

    let cache = cache();
    let base = server.url();
    let lookups = (0..16).map(|_| {
        let cache = cache.clone();
        let base = base.clone();
        tokio::spawn(async move { cache.available_models(&base).await })
    });

    for models in futures::future::join_all(lookups).await {
        assert_eq!(models.expect("lookup task"), vec!["phi3:mini", "llama3:8b"]);
    }
    tags.assert_async().await;
    assert_eq!(cache.stats().fetches, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn eviction_racing_lookups_refetches_exactly_once() {
    let mut server = Server::new_async().await;
    let tags = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(TAGS)
        .expect(2)
        .create_async()
        .await;

    let cache = cache();
    let base = server.url();
    cache.available_models(&base).await;

    // The eviction is polled first; the lookups behind it share one refetch.
    let (evicted, a, b, c) = tokio::join!(
        cache.invalidate(&base),
        cache.available_models(&base),
        cache.resolve_model(&base, "llama3:8b"),
        cache.available_models(&base),
    );

    assert!(evicted);
    assert_eq!(a, listed());
    assert_eq!(b, "llama3:8b");
    assert_eq!(c, listed());
    tags.assert_async().await;

    let stats = cache.stats();
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.fetches, 2);
}

fn listed() -> Vec<String> {
    vec!["phi3:mini".to_string(), "llama3:8b".to_string()]
}
