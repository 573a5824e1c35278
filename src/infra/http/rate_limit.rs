//! Per-client admission control.
//!
//! Catalog reads, cart reads and cart writes each get their own backend so a
//! burst in one class never spends another class's quota.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap};
use dashmap::DashMap;
use metrics::counter;
use tracing::debug;

use crate::config::{LimiterSettings, RateLimitSettings};

const METRIC_RATE_LIMITED_TOTAL: &str = "storefront_rate_limited_total";

pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimiterClass {
    Catalog,
    CartRead,
    CartWrite,
}

impl LimiterClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimiterClass::Catalog => "catalog",
            LimiterClass::CartRead => "cart_read",
            LimiterClass::CartWrite => "cart_write",
        }
    }
}

impl fmt::Display for LimiterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Originating client address, or the shared `unknown` bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Self::unknown()
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_CLIENT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `cf-connecting-ip`, then the first `x-forwarded-for` hop, then
    /// `x-real-ip`, then the socket peer.
    pub fn from_parts(headers: &HeaderMap, extensions: &Extensions) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        if let Some(ip) = header("cf-connecting-ip") {
            return Self::new(ip);
        }
        if let Some(first) = header("x-forwarded-for")
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            return Self::new(first);
        }
        if let Some(ip) = header("x-real-ip") {
            return Self::new(ip);
        }
        extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| Self::new(addr.ip().to_string()))
            .unwrap_or_else(Self::unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitOutcome {
    pub success: bool,
    pub remaining: u32,
}

/// Counter store behind one limiter class.
#[async_trait]
pub trait RateLimitBackend: Send + Sync {
    async fn limit(&self, key: &str) -> RateLimitOutcome;

    fn retry_after_secs(&self) -> u64;

    /// Drops idle counters; returns how many were removed.
    fn purge_idle(&self) -> usize {
        0
    }
}

#[derive(Debug, Clone)]
pub struct SlidingWindowLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
        }
    }

    pub fn from_settings(settings: &LimiterSettings) -> Self {
        Self::new(
            Duration::from_secs(u64::from(settings.window_seconds.get())),
            settings.max_requests.get(),
        )
    }

    pub fn allow(&self, key: &str) -> (bool, u32) {
        self.allow_at(key, Instant::now())
    }

    fn allow_at(&self, key: &str, now: Instant) -> (bool, u32) {
        let window = self.window;

        let mut entry = self.buckets.entry(key.to_string()).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        let remaining = self.max_requests.saturating_sub(entry.len() as u32);
        if remaining == 0 {
            return (false, 0);
        }

        entry.push(now);
        // after push, one fewer slot remains
        (true, remaining.saturating_sub(1))
    }

    fn purge_idle_at(&self, now: Instant) -> usize {
        let window = self.window;
        let before = self.buckets.len();
        self.buckets.retain(|_, hits| {
            hits.retain(|instant| now.duration_since(*instant) < window);
            !hits.is_empty()
        });
        before.saturating_sub(self.buckets.len())
    }

    pub fn limit_per_window(&self) -> u32 {
        self.max_requests
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

#[async_trait]
impl RateLimitBackend for SlidingWindowLimiter {
    async fn limit(&self, key: &str) -> RateLimitOutcome {
        let (success, remaining) = self.allow(key);
        RateLimitOutcome { success, remaining }
    }

    fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }

    fn purge_idle(&self) -> usize {
        self.purge_idle_at(Instant::now())
    }
}

#[derive(Clone)]
pub struct RateGate {
    catalog: Arc<dyn RateLimitBackend>,
    cart_read: Arc<dyn RateLimitBackend>,
    cart_write: Arc<dyn RateLimitBackend>,
}

impl RateGate {
    pub fn new(
        catalog: Arc<dyn RateLimitBackend>,
        cart_read: Arc<dyn RateLimitBackend>,
        cart_write: Arc<dyn RateLimitBackend>,
    ) -> Self {
        Self {
            catalog,
            cart_read,
            cart_write,
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(
            Arc::new(SlidingWindowLimiter::from_settings(&settings.catalog)),
            Arc::new(SlidingWindowLimiter::from_settings(&settings.cart_read)),
            Arc::new(SlidingWindowLimiter::from_settings(&settings.cart_write)),
        )
    }

    fn backend(&self, class: LimiterClass) -> &dyn RateLimitBackend {
        match class {
            LimiterClass::Catalog => self.catalog.as_ref(),
            LimiterClass::CartRead => self.cart_read.as_ref(),
            LimiterClass::CartWrite => self.cart_write.as_ref(),
        }
    }

    pub async fn admit(&self, class: LimiterClass, client: &ClientIdentity) -> bool {
        let outcome = self.backend(class).limit(client.as_str()).await;
        if !outcome.success {
            counter!(METRIC_RATE_LIMITED_TOTAL, "class" => class.as_str()).increment(1);
            debug!(
                target: "storefront::http::rate_limit",
                class = class.as_str(),
                client = client.as_str(),
                "request denied"
            );
        }
        outcome.success
    }

    pub fn retry_after_secs(&self, class: LimiterClass) -> u64 {
        self.backend(class).retry_after_secs()
    }

    pub fn purge_idle(&self) -> usize {
        [
            LimiterClass::Catalog,
            LimiterClass::CartRead,
            LimiterClass::CartWrite,
        ]
        .into_iter()
        .map(|class| self.backend(class).purge_idle())
        .sum()
    }
}
