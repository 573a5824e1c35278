//! Cache configuration.
//!
//! TTL tiers and store capacity, resolved from the `[cache]` section of
//! `storefront.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

use super::keys::TtlTier;

const DEFAULT_MAX_ENTRIES: usize = 10_000;
const DEFAULT_HIERARCHY_TTL_SECS: u64 = 12 * 60 * 60;
const DEFAULT_COUNT_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_LISTING_TTL_SECS: u64 = 60 * 60;
const DEFAULT_SEARCH_TTL_SECS: u64 = 60 * 60;
const DEFAULT_EMPTY_RESULT_TTL_SECS: u64 = 5 * 60;

/// Cache configuration from `storefront.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve catalog reads through the key-value cache.
    pub enabled: bool,
    /// Maximum entries held by the in-process key-value store.
    pub max_entries: usize,
    /// TTL for collections and category trees.
    pub hierarchy_ttl_secs: u64,
    /// TTL for product counts.
    pub count_ttl_secs: u64,
    /// TTL for product listings and product detail.
    pub listing_ttl_secs: u64,
    /// TTL for search results.
    pub search_ttl_secs: u64,
    /// Upper bound on the TTL of an empty result.
    pub empty_result_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_MAX_ENTRIES,
            hierarchy_ttl_secs: DEFAULT_HIERARCHY_TTL_SECS,
            count_ttl_secs: DEFAULT_COUNT_TTL_SECS,
            listing_ttl_secs: DEFAULT_LISTING_TTL_SECS,
            search_ttl_secs: DEFAULT_SEARCH_TTL_SECS,
            empty_result_ttl_secs: DEFAULT_EMPTY_RESULT_TTL_SECS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            max_entries: settings.max_entries.get() as usize,
            hierarchy_ttl_secs: settings.hierarchy_ttl.as_secs(),
            count_ttl_secs: settings.count_ttl.as_secs(),
            listing_ttl_secs: settings.listing_ttl.as_secs(),
            search_ttl_secs: settings.search_ttl.as_secs(),
            empty_result_ttl_secs: settings.empty_result_ttl.as_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self, tier: TtlTier) -> Duration {
        let secs = match tier {
            TtlTier::Hierarchy => self.hierarchy_ttl_secs,
            TtlTier::Count => self.count_ttl_secs,
            TtlTier::Listing => self.listing_ttl_secs,
            TtlTier::Search => self.search_ttl_secs,
        };
        Duration::from_secs(secs)
    }

    pub fn empty_result_ttl(&self) -> Duration {
        Duration::from_secs(self.empty_result_ttl_secs)
    }

    /// Returns the store capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }
}
