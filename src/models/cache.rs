//! Time-bounded cache of the models served at each address.

use super::select::{select_model, ModelChoice};
use crate::transport::{CallOptions, Transport};
use crate::{Error, ErrorContext, Result};
use arc_swap::ArcSwapOption;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Native model listing path.
pub const TAGS_PATH: &str = "/api/tags";

#[derive(Debug, Deserialize)]
struct TagEntry {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct TagsPayload {
    #[serde(default)]
    models: Vec<TagEntry>,
}

/// Parse a `/api/tags` body into model names, keeping listing order.
pub fn parse_tags(body: &str) -> Result<Vec<String>> {
    let payload: TagsPayload = serde_json::from_str(body)?;
    Ok(payload
        .models
        .into_iter()
        .map(|m| m.name.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect())
}

#[derive(Debug, Clone)]
struct ModelCacheEntry {
    models: Vec<String>,
    fetched_at: Instant,
}

impl ModelCacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub fetches: u64,
    pub fetch_failures: u64,
    pub evictions: u64,
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    fetch_failures: AtomicU64,
    evictions: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

type Slot = Arc<Mutex<Option<ModelCacheEntry>>>;

/// Shared model availability cache keyed by base address.
///
/// Each address owns a slot whose lock is held across its refetch, so two
/// dispatches can never interleave an eviction with a refetch of the same
/// address, and concurrent callers for one address share a single listing.
/// The outer map lock is only held to look up or insert a slot; a slow
/// address never stalls the others. Failed fetches are cached too (keeping
/// the previous list, if any), which bounds network traffic to one listing
/// per address per TTL window.
pub struct ModelCache {
    transport: Arc<dyn Transport>,
    ttl: Duration,
    timeout: Duration,
    bearer: ArcSwapOption<String>,
    slots: Mutex<HashMap<String, Slot>>,
    stats: AtomicStats,
}

impl ModelCache {
    pub fn new(transport: Arc<dyn Transport>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            transport,
            ttl,
            timeout,
            bearer: ArcSwapOption::empty(),
            slots: Mutex::new(HashMap::new()),
            stats: AtomicStats::default(),
        }
    }

    /// Credential attached to listing requests from now on.
    pub fn set_bearer(&self, bearer: Option<String>) {
        self.bearer.store(bearer.map(Arc::new));
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn slot(&self, base: &str) -> Slot {
        self.slots
            .lock()
            .await
            .entry(base.to_string())
            .or_default()
            .clone()
    }

    /// Models served at `base`. Never fails: a failed fetch yields the last
    /// known list, or an empty one.
    pub async fn available_models(&self, base: &str) -> Vec<String> {
        let slot = self.slot(base).await;
        let mut entry = slot.lock().await;
        if let Some(cached) = entry.as_ref().filter(|e| e.is_fresh(self.ttl)) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return cached.models.clone();
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        let models = match self.fetch(base).await {
            Ok(models) => {
                info!(base_url = base, count = models.len(), "model listing refreshed");
                models
            }
            Err(e) => {
                self.stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
                let previous = entry
                    .as_ref()
                    .map(|e| e.models.clone())
                    .unwrap_or_default();
                debug!(
                    base_url = base,
                    error = %e,
                    kept = previous.len(),
                    "model listing failed, keeping previous list"
                );
                previous
            }
        };

        *entry = Some(ModelCacheEntry {
            models: models.clone(),
            fetched_at: Instant::now(),
        });
        models
    }

    async fn fetch(&self, base: &str) -> Result<Vec<String>> {
        self.stats.fetches.fetch_add(1, Ordering::Relaxed);
        let bearer = self.bearer.load_full();
        let opts = CallOptions::new(self.timeout).with_bearer(bearer.as_deref().map(String::as_str));
        let url = format!("{}{}", base, TAGS_PATH);
        let resp = tokio::time::timeout(self.timeout, self.transport.get(&url, opts))
            .await
            .map_err(|_| {
                Error::timeout(
                    self.timeout,
                    ErrorContext::new().with_base_url(base).with_source("model_cache"),
                )
            })??;
        if !resp.is_ok() {
            return Err(Error::protocol_mismatch(
                format!("model listing answered HTTP {}", resp.status),
                ErrorContext::new()
                    .with_base_url(base)
                    .with_source("model_cache"),
            ));
        }
        parse_tags(&resp.body)
    }

    /// Drop the entry for one address. Waits for an in-flight refetch of that
    /// address to land first.
    pub async fn invalidate(&self, base: &str) -> bool {
        let slot = self.slots.lock().await.get(base).cloned();
        let removed = match slot {
            Some(slot) => slot.lock().await.take().is_some(),
            None => false,
        };
        if removed {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Drop every entry (configuration epoch change). In-flight refetches
    /// finish into detached slots and are never served.
    pub async fn invalidate_all(&self) {
        let dropped = std::mem::take(&mut *self.slots.lock().await);
        let n = dropped
            .values()
            .filter(|slot| slot.try_lock().map(|e| e.is_some()).unwrap_or(true))
            .count() as u64;
        self.stats.evictions.fetch_add(n, Ordering::Relaxed);
    }

    /// Pick the model to send to `base` for a request of `requested`.
    pub async fn resolve(&self, base: &str, requested: &str) -> ModelChoice {
        let available = self.available_models(base).await;
        let choice = select_model(&available, requested);
        match &choice {
            ModelChoice::Exact(_) => {}
            ModelChoice::Fallback(m) | ModelChoice::FirstAvailable(m) => {
                warn!(base_url = base, requested, using = m.as_str(), "requested model not served, substituting");
            }
            ModelChoice::Requested(_) => {
                warn!(base_url = base, requested, "no models known, using requested model anyway");
            }
        }
        choice
    }

    /// Model identifier to use at `base`.
    pub async fn resolve_model(&self, base: &str, requested: &str) -> String {
        self.resolve(base, requested).await.into_model()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }
}
