//! Get-or-compute access to the key-value cache.
//!
//! Every catalog read goes through [`CacheAside::fetch`]. A hit never touches
//! the relational store; a miss computes, returns, and hands the write to the
//! background scheduler. Store failures degrade to a miss and are never seen
//! by the caller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::repos::RepoError;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::store::KvStore;
use super::tasks::BackgroundScheduler;

const TARGET: &str = "storefront::cache::aside";

const METRIC_CACHE_HIT_TOTAL: &str = "storefront_cache_hit_total";
const METRIC_CACHE_MISS_TOTAL: &str = "storefront_cache_miss_total";
const METRIC_CACHE_DECODE_ERROR_TOTAL: &str = "storefront_cache_decode_error_total";
const METRIC_CACHE_WRITE_ERROR_TOTAL: &str = "storefront_cache_write_error_total";
const METRIC_FETCH_FAILED_TOTAL: &str = "storefront_fetch_failed_total";

/// The relational computation behind a cache miss failed.
#[derive(Debug, Error)]
#[error("failed to fetch `{key}` from the catalog")]
pub struct FetchFailed {
    pub key: String,
    #[source]
    pub source: RepoError,
}

#[derive(Clone)]
pub struct CacheAside {
    config: CacheConfig,
    store: Arc<dyn KvStore>,
    scheduler: Arc<dyn BackgroundScheduler>,
}

impl CacheAside {
    pub fn new(
        config: CacheConfig,
        store: Arc<dyn KvStore>,
        scheduler: Arc<dyn BackgroundScheduler>,
    ) -> Self {
        Self {
            config,
            store,
            scheduler,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Fetch using the TTL tier of `key`.
    pub async fn fetch<T, F, Fut>(&self, key: &CacheKey, compute: F) -> Result<T, FetchFailed>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RepoError>>,
    {
        let ttl = self.config.ttl(key.tier());
        self.fetch_cached(key, ttl, compute).await
    }

    pub async fn fetch_cached<T, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<T, FetchFailed>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RepoError>>,
    {
        let rendered = key.to_string();

        if !self.config.enabled {
            return compute().await.map_err(|source| fetch_failed(rendered, source));
        }

        if let Some(value) = self.lookup::<T>(&rendered).await {
            return Ok(value);
        }

        let value = compute()
            .await
            .map_err(|source| fetch_failed(rendered.clone(), source))?;

        self.populate(rendered, &value, ttl);
        Ok(value)
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    counter!(METRIC_CACHE_HIT_TOTAL).increment(1);
                    debug!(target: TARGET, key, "cache hit");
                    return Some(value);
                }
                Err(err) => {
                    counter!(METRIC_CACHE_DECODE_ERROR_TOTAL).increment(1);
                    warn!(
                        target: TARGET,
                        key,
                        error = %err,
                        "cached value could not be decoded; recomputing"
                    );
                }
            },
            Ok(None) => {}
            Err(err) => {
                warn!(
                    target: TARGET,
                    key,
                    error = %err,
                    "cache read failed; treating as miss"
                );
            }
        }
        counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
        debug!(target: TARGET, key, "cache miss");
        None
    }

    fn populate<T: Serialize>(&self, key: String, value: &T, ttl: Duration) {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(err) => {
                warn!(
                    target: TARGET,
                    key = %key,
                    error = %err,
                    "computed value could not be serialized; skipping cache write"
                );
                return;
            }
        };

        let ttl = if is_empty_result(&json) {
            ttl.min(self.config.empty_result_ttl())
        } else {
            ttl
        };
        let payload = json.to_string();
        let store = Arc::clone(&self.store);

        self.scheduler.schedule(
            async move {
                if let Err(err) = store.put(&key, payload, ttl).await {
                    counter!(METRIC_CACHE_WRITE_ERROR_TOTAL).increment(1);
                    warn!(
                        target: TARGET,
                        key = %key,
                        error = %err,
                        "cache write failed"
                    );
                }
            }
            .boxed(),
        );
    }
}

fn fetch_failed(key: String, source: RepoError) -> FetchFailed {
    counter!(METRIC_FETCH_FAILED_TOTAL).increment(1);
    FetchFailed { key, source }
}

fn is_empty_result(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
