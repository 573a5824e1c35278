//! Client side of image prefetching.
//!
//! Hover over a link fetches the eager images of its target at low priority;
//! merely scrolling a link into view only warms the per-href image list once
//! the link has stayed visible for the debounce window.

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::images::PrefetchImage;
use super::seen::{DEFAULT_SEEN_CAPACITY, SeenSet};

const TARGET: &str = "storefront::prefetch";

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);
pub const DEFAULT_LIST_CAPACITY: usize = 256;

const SKIPPED_PREFIX: &str = "/order";

#[derive(Debug, Error)]
pub enum PrefetchError {
    #[error("invalid prefetch url: {0}")]
    Url(#[from] url::ParseError),
    #[error("server answered {status} for `{url}`")]
    Status { url: String, status: u16 },
    #[error("prefetch transport error: {0}")]
    Transport(String),
}

/// Transport used by the prefetcher.
#[async_trait]
pub trait PrefetchClient: Send + Sync {
    /// Images the page at `href` renders.
    async fn list_images(&self, href: &str) -> Result<Vec<PrefetchImage>, PrefetchError>;

    /// Low-priority fetch of one image.
    async fn fetch_image(&self, image: &PrefetchImage) -> Result<(), PrefetchError>;
}

/// Whether a link target is worth prefetching at all.
pub fn should_prefetch(href: &str) -> bool {
    !href.is_empty() && href.starts_with('/') && href != "/" && !href.starts_with(SKIPPED_PREFIX)
}

#[derive(Debug, Clone)]
pub struct PrefetchOptions {
    pub seen_capacity: NonZeroUsize,
    pub list_capacity: NonZeroUsize,
    pub debounce: Duration,
}

impl Default for PrefetchOptions {
    fn default() -> Self {
        Self {
            seen_capacity: NonZeroUsize::new(DEFAULT_SEEN_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            list_capacity: NonZeroUsize::new(DEFAULT_LIST_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl From<&crate::config::PrefetchSettings> for PrefetchOptions {
    fn from(settings: &crate::config::PrefetchSettings) -> Self {
        let capacity = |value: std::num::NonZeroU32| {
            NonZeroUsize::new(value.get() as usize).unwrap_or(NonZeroUsize::MIN)
        };
        Self {
            seen_capacity: capacity(settings.seen_capacity),
            list_capacity: capacity(settings.list_capacity),
            debounce: settings.debounce,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HoverOutcome {
    /// Sources fetched by this hover, in page order.
    pub fetched: Vec<String>,
    pub skipped_lazy: usize,
    pub already_seen: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportOutcome {
    /// The href is never prefetched.
    Skipped,
    /// The link left the viewport before the debounce elapsed.
    Cancelled,
    AlreadyListed,
    Listed { images: usize },
}

pub struct ImagePrefetcher<C> {
    client: C,
    seen: SeenSet,
    image_lists: LruCache<String, Vec<PrefetchImage>>,
    debounce: Duration,
}

impl<C: PrefetchClient> ImagePrefetcher<C> {
    pub fn new(client: C, options: PrefetchOptions) -> Self {
        Self {
            client,
            seen: SeenSet::new(options.seen_capacity),
            image_lists: LruCache::new(options.list_capacity),
            debounce: options.debounce,
        }
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn is_listed(&self, href: &str) -> bool {
        self.image_lists.contains(href)
    }

    /// Image list for `href`, from the local list cache when possible.
    /// Failures yield an empty list and are not cached.
    pub async fn images_for(&mut self, href: &str) -> Vec<PrefetchImage> {
        if !should_prefetch(href) {
            return Vec::new();
        }
        if let Some(images) = self.image_lists.get(href) {
            return images.clone();
        }
        match self.client.list_images(href).await {
            Ok(images) => {
                self.image_lists.put(href.to_string(), images.clone());
                images
            }
            Err(err) => {
                warn!(target: TARGET, href, error = %err, "listing page images failed");
                Vec::new()
            }
        }
    }

    /// Fetches every eager image of `href` that has not been fetched before.
    pub async fn on_hover(&mut self, href: &str) -> HoverOutcome {
        let mut outcome = HoverOutcome::default();
        for image in self.images_for(href).await {
            if image.is_lazy() {
                outcome.skipped_lazy += 1;
                continue;
            }
            if self.seen.is_seen(&image.src) {
                outcome.already_seen += 1;
                continue;
            }
            self.seen.mark_seen(&image.src);
            match self.client.fetch_image(&image).await {
                Ok(()) => {
                    debug!(target: TARGET, src = %image.src, "image prefetched");
                    outcome.fetched.push(image.src);
                }
                Err(err) => {
                    warn!(target: TARGET, src = %image.src, error = %err, "image prefetch failed");
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }

    /// Warms the image list once the link has stayed visible for the
    /// debounce window. Cancelling `left_viewport` first aborts the warm-up.
    pub async fn on_viewport_enter(
        &mut self,
        href: &str,
        left_viewport: &CancellationToken,
    ) -> ViewportOutcome {
        if !should_prefetch(href) {
            return ViewportOutcome::Skipped;
        }

        tokio::select! {
            biased;
            _ = left_viewport.cancelled() => return ViewportOutcome::Cancelled,
            _ = tokio::time::sleep(self.debounce) => {}
        }

        if self.is_listed(href) {
            return ViewportOutcome::AlreadyListed;
        }
        let images = self.images_for(href).await.len();
        ViewportOutcome::Listed { images }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct FakeClient {
        pages: Arc<HashMap<String, Vec<PrefetchImage>>>,
        listed: Arc<Mutex<Vec<String>>>,
        fetched: Arc<Mutex<Vec<String>>>,
        broken_src: Option<String>,
    }

    #[async_trait]
    impl PrefetchClient for FakeClient {
        async fn list_images(&self, href: &str) -> Result<Vec<PrefetchImage>, PrefetchError> {
            self.listed.lock().unwrap().push(href.to_string());
            self.pages
                .get(href)
                .cloned()
                .ok_or_else(|| PrefetchError::Status {
                    url: href.to_string(),
                    status: 404,
                })
        }

        async fn fetch_image(&self, image: &PrefetchImage) -> Result<(), PrefetchError> {
            if self.broken_src.as_deref() == Some(image.src.as_str()) {
                return Err(PrefetchError::Transport("reset".into()));
            }
            self.fetched.lock().unwrap().push(image.src.clone());
            Ok(())
        }
    }

    fn image(src: &str, loading: &str) -> PrefetchImage {
        PrefetchImage {
            src: src.to_string(),
            srcset: None,
            sizes: None,
            alt: String::new(),
            loading: loading.to_string(),
        }
    }

    fn client() -> FakeClient {
        let mut pages = HashMap::new();
        pages.insert(
            "/products/electronics".to_string(),
            vec![
                image("/hero.webp", "eager"),
                image("/below-fold.webp", "lazy"),
                image("/card.webp", "auto"),
            ],
        );
        pages.insert(
            "/products/garden".to_string(),
            vec![image("/hero.webp", "eager"), image("/rake.webp", "auto")],
        );
        FakeClient {
            pages: Arc::new(pages),
            ..Default::default()
        }
    }

    fn options(debounce: Duration) -> PrefetchOptions {
        PrefetchOptions {
            debounce,
            ..Default::default()
        }
    }

    #[test]
    fn skipped_targets() {
        assert!(!should_prefetch(""));
        assert!(!should_prefetch("/"));
        assert!(!should_prefetch("https://elsewhere.test/x"));
        assert!(!should_prefetch("/order"));
        assert!(!should_prefetch("/order/confirm"));
        assert!(should_prefetch("/products/electronics"));
    }

    #[tokio::test]
    async fn hover_fetches_eager_images_once() {
        let client = client();
        let mut prefetcher = ImagePrefetcher::new(client.clone(), options(DEFAULT_DEBOUNCE));

        let first = prefetcher.on_hover("/products/electronics").await;
        assert_eq!(first.fetched, vec!["/hero.webp", "/card.webp"]);
        assert_eq!(first.skipped_lazy, 1);

        let second = prefetcher.on_hover("/products/garden").await;
        assert_eq!(second.fetched, vec!["/rake.webp"]);
        assert_eq!(second.already_seen, 1);

        assert_eq!(client.fetched.lock().unwrap().len(), 3);
        assert!(!prefetcher.seen().is_seen("/below-fold.webp"));
    }

    #[tokio::test]
    async fn image_list_is_requested_once_per_href() {
        let client = client();
        let mut prefetcher = ImagePrefetcher::new(client.clone(), options(DEFAULT_DEBOUNCE));

        prefetcher.on_hover("/products/electronics").await;
        prefetcher.on_hover("/products/electronics").await;

        assert_eq!(client.listed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_still_marks_seen() {
        let client = FakeClient {
            broken_src: Some("/hero.webp".into()),
            ..client()
        };
        let mut prefetcher = ImagePrefetcher::new(client, options(DEFAULT_DEBOUNCE));

        let outcome = prefetcher.on_hover("/products/electronics").await;
        assert_eq!(outcome.failed, 1);
        assert!(prefetcher.seen().is_seen("/hero.webp"));
    }

    #[tokio::test]
    async fn skipped_and_unknown_hrefs_fetch_nothing() {
        let client = client();
        let mut prefetcher = ImagePrefetcher::new(client.clone(), options(DEFAULT_DEBOUNCE));

        assert_eq!(prefetcher.on_hover("/order").await, HoverOutcome::default());
        assert_eq!(prefetcher.on_hover("/missing").await, HoverOutcome::default());
        assert!(!prefetcher.is_listed("/missing"));
        assert_eq!(client.listed.lock().unwrap().as_slice(), ["/missing"]);
    }

    #[tokio::test]
    async fn viewport_warms_list_without_fetching_images() {
        let client = client();
        let mut prefetcher = ImagePrefetcher::new(client.clone(), options(Duration::from_millis(1)));
        let still_visible = CancellationToken::new();

        let outcome = prefetcher
            .on_viewport_enter("/products/electronics", &still_visible)
            .await;
        assert_eq!(outcome, ViewportOutcome::Listed { images: 3 });
        assert!(prefetcher.is_listed("/products/electronics"));
        assert!(client.fetched.lock().unwrap().is_empty());

        let again = prefetcher
            .on_viewport_enter("/products/electronics", &still_visible)
            .await;
        assert_eq!(again, ViewportOutcome::AlreadyListed);
    }

    #[tokio::test]
    async fn leaving_viewport_cancels_warmup() {
        let client = client();
        let mut prefetcher = ImagePrefetcher::new(client.clone(), options(Duration::from_secs(30)));
        let left = CancellationToken::new();
        left.cancel();

        let outcome = prefetcher
            .on_viewport_enter("/products/electronics", &left)
            .await;
        assert_eq!(outcome, ViewportOutcome::Cancelled);
        assert!(client.listed.lock().unwrap().is_empty());
        assert_eq!(
            prefetcher.on_viewport_enter("/order", &left).await,
            ViewportOutcome::Skipped
        );
    }
}
