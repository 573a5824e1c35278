//! Storefront catalog cache
//!
//! Cache-aside reads over a string key-value store:
//!
//! - **Keys**: `kind:selector`, one kind per catalog resource
//! - **TTL tiers**: hierarchy, counts, listings, search
//! - **Writes**: detached tasks, drained on shutdown
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! max_entries = 10000
//! hierarchy_ttl_seconds = 43200
//! # ... see config.rs for all options
//! ```

mod aside;
mod config;
mod keys;
pub(crate) mod lock;
mod store;
mod tasks;

pub use aside::{CacheAside, FetchFailed};
pub use config::CacheConfig;
pub use keys::{CacheKey, TtlTier};
pub use store::{KvError, KvStore, MemoryKvStore};
pub use tasks::{BackgroundScheduler, DetachedTasks};
