//! Server side of image prefetching: which images does a page render?

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    application::repos::RepoError,
    cache::{CacheAside, CacheKey, FetchFailed},
};

use super::images::{PageImages, extract_images};

/// Fetches rendered page markup from the storefront origin.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_html(&self, path: &str) -> Result<String, RepoError>;
}

#[derive(Clone)]
pub struct PageImagesService {
    source: Arc<dyn PageSource>,
    cache: CacheAside,
}

impl PageImagesService {
    pub fn new(source: Arc<dyn PageSource>, cache: CacheAside) -> Self {
        Self { source, cache }
    }

    /// Images on the page at `path` (with or without the leading slash).
    pub async fn images(&self, path: &str) -> Result<PageImages, FetchFailed> {
        let path = format!("/{}", path.trim_start_matches('/'));
        if !is_site_path(&path) {
            return Err(FetchFailed {
                key: CacheKey::PageImages(path.clone()).to_string(),
                source: RepoError::InvalidInput {
                    message: format!("`{path}` is not a page on this site"),
                },
            });
        }
        self.cache
            .fetch(&CacheKey::PageImages(path.clone()), || async {
                let html = self.source.fetch_html(&path).await?;
                let images = extract_images(&html).map_err(|err| RepoError::InvalidInput {
                    message: err.to_string(),
                })?;
                Ok::<_, RepoError>(PageImages { images })
            })
            .await
    }
}

/// A backslash reads as `/` in http URLs and could turn the path into a
/// network-path reference to another host.
fn is_site_path(path: &str) -> bool {
    !path.contains('\\') && !path.chars().any(char::is_control)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::cache::{CacheConfig, DetachedTasks, MemoryKvStore};

    #[derive(Default)]
    struct StaticPages {
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PageSource for StaticPages {
        async fn fetch_html(&self, path: &str) -> Result<String, RepoError> {
            self.requested.lock().unwrap().push(path.to_string());
            match path {
                "/products/electronics" => {
                    Ok(r#"<img src="/a.webp" alt="A"><img src="/b.webp" loading="lazy">"#.into())
                }
                _ => Err(RepoError::NotFound),
            }
        }
    }

    fn service(source: Arc<StaticPages>, tasks: &DetachedTasks) -> PageImagesService {
        let config = CacheConfig::default();
        let cache = CacheAside::new(
            config.clone(),
            Arc::new(MemoryKvStore::new(&config)),
            Arc::new(tasks.clone()),
        );
        PageImagesService::new(source, cache)
    }

    #[tokio::test]
    async fn images_are_cached_per_path() {
        let source = Arc::new(StaticPages::default());
        let tasks = DetachedTasks::new();
        let service = service(Arc::clone(&source), &tasks);

        let first = service.images("products/electronics").await.unwrap();
        assert!(tasks.drain(Duration::from_secs(1)).await);
        let second = service.images("/products/electronics").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.images.len(), 2);
        assert_eq!(source.requested.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_page_surfaces_not_found() {
        let source = Arc::new(StaticPages::default());
        let tasks = DetachedTasks::new();
        let service = service(source, &tasks);

        let err = service.images("nowhere").await.unwrap_err();
        assert_eq!(err.key, "page-images:%2Fnowhere");
        assert!(matches!(err.source, RepoError::NotFound));
    }

    #[tokio::test]
    async fn backslash_paths_never_reach_the_source() {
        let source = Arc::new(StaticPages::default());
        let tasks = DetachedTasks::new();
        let service = service(Arc::clone(&source), &tasks);

        for path in ["\\evil.example/steal", "/\\evil.example", "products/..\\x"] {
            let err = service.images(path).await.unwrap_err();
            assert!(matches!(err.source, RepoError::InvalidInput { .. }), "{path}");
        }
        assert!(source.requested.lock().unwrap().is_empty());
    }
}
