#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, header},
};
use http_body_util::BodyExt;
use storefront::{
    application::{
        cart::CartService,
        catalog::CatalogService,
        repos::{CatalogRepo, RepoError, SearchQuery},
    },
    cache::{CacheAside, CacheConfig, DetachedTasks, MemoryKvStore},
    domain::entities::{
        CatalogProduct, CategoryRecord, CategoryTree, CollectionRecord, CollectionWithCategories,
        ProductRecord, SearchHit, SubcategoryRecord, SubcollectionRecord,
        SubcollectionWithSubcategories,
    },
    infra::{
        error::InfraError,
        http::{
            CartCookieSettings, HealthProbe, HttpState, RateGate, SlidingWindowLimiter,
            build_router,
        },
    },
    prefetch::{PageImagesService, PageSource},
};
use tower::ServiceExt;

pub const PRODUCTS_PAGE: &str = r#"
<main>
  <img src="/images/usb-cable.webp" alt="USB cable" srcset="/images/usb-cable@2x.webp 2x">
  <img src="/images/hdmi-cable.webp" alt="HDMI cable" loading="lazy">
</main>
"#;

fn product(slug: &str, name: &str, subcategory: &str, category: &str) -> CatalogProduct {
    CatalogProduct {
        product: ProductRecord {
            slug: slug.to_string(),
            name: name.to_string(),
            description: format!("{name} description"),
            price: "9.99".to_string(),
            subcategory_slug: subcategory.to_string(),
            image_url: Some(format!("/images/{slug}.webp")),
        },
        category_slug: category.to_string(),
    }
}

/// In-memory catalog counting every repository call.
pub struct FakeCatalog {
    products: Vec<CatalogProduct>,
    calls: AtomicUsize,
    offline: AtomicBool,
}

impl FakeCatalog {
    pub fn seeded() -> Self {
        Self {
            products: vec![
                product("sku-1", "USB Cable", "cables", "electronics"),
                product("sku-2", "HDMI Cable", "cables", "electronics"),
                product("sku-3", "Desk Lamp", "lamps", "home"),
            ],
            calls: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn enter(&self) -> Result<(), RepoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepoError::Persistence("catalog offline".into()));
        }
        Ok(())
    }

    fn collections(&self) -> Vec<CollectionWithCategories> {
        vec![CollectionWithCategories {
            collection: CollectionRecord {
                id: 1,
                name: "Everything".into(),
                slug: "everything".into(),
            },
            categories: vec![CategoryRecord {
                slug: "electronics".into(),
                name: "Electronics".into(),
                collection_id: 1,
                image_url: None,
            }],
        }]
    }
}

#[async_trait]
impl CatalogRepo for FakeCatalog {
    async fn list_collections(&self) -> Result<Vec<CollectionWithCategories>, RepoError> {
        self.enter()?;
        Ok(self.collections())
    }

    async fn find_collection(
        &self,
        slug: &str,
    ) -> Result<Vec<CollectionWithCategories>, RepoError> {
        self.enter()?;
        Ok(self
            .collections()
            .into_iter()
            .filter(|item| item.collection.slug == slug)
            .collect())
    }

    async fn find_category_tree(&self, slug: &str) -> Result<Option<CategoryTree>, RepoError> {
        self.enter()?;
        if slug != "electronics" {
            return Ok(None);
        }
        Ok(Some(CategoryTree {
            category: CategoryRecord {
                slug: "electronics".into(),
                name: "Electronics".into(),
                collection_id: 1,
                image_url: None,
            },
            subcollections: vec![SubcollectionWithSubcategories {
                subcollection: SubcollectionRecord {
                    id: 10,
                    name: "Connectivity".into(),
                    category_slug: "electronics".into(),
                },
                subcategories: vec![SubcategoryRecord {
                    slug: "cables".into(),
                    name: "Cables".into(),
                    subcollection_id: 10,
                    image_url: None,
                }],
            }],
        }))
    }

    async fn count_products_in_category(&self, slug: &str) -> Result<u64, RepoError> {
        self.enter()?;
        Ok(self
            .products
            .iter()
            .filter(|item| item.category_slug == slug)
            .count() as u64)
    }

    async fn list_products_in_subcategory(
        &self,
        slug: &str,
    ) -> Result<Vec<ProductRecord>, RepoError> {
        self.enter()?;
        Ok(self
            .products
            .iter()
            .filter(|item| item.product.subcategory_slug == slug)
            .map(|item| item.product.clone())
            .collect())
    }

    async fn count_products_in_subcategory(&self, slug: &str) -> Result<u64, RepoError> {
        self.enter()?;
        Ok(self
            .products
            .iter()
            .filter(|item| item.product.subcategory_slug == slug)
            .count() as u64)
    }

    async fn find_product(&self, slug: &str) -> Result<Option<ProductRecord>, RepoError> {
        self.enter()?;
        Ok(self
            .products
            .iter()
            .find(|item| item.product.slug == slug)
            .map(|item| item.product.clone()))
    }

    async fn count_products(&self) -> Result<u64, RepoError> {
        self.enter()?;
        Ok(self.products.len() as u64)
    }

    async fn search_products(
        &self,
        query: &SearchQuery,
        limit: u32,
    ) -> Result<Vec<SearchHit>, RepoError> {
        self.enter()?;
        let mut hits: Vec<SearchHit> = self
            .products
            .iter()
            .filter(|item| {
                let name = item.product.name.to_lowercase();
                match query {
                    SearchQuery::Prefix(term) => name.starts_with(term.as_str()),
                    SearchQuery::AnyWord(words) => {
                        words.iter().any(|word| name.contains(word.as_str()))
                    }
                }
            })
            .map(|item| SearchHit {
                product: item.product.clone(),
                href: item.href(),
            })
            .collect();
        hits.sort_by(|a, b| a.product.name.cmp(&b.product.name));
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn find_products_by_slugs(
        &self,
        slugs: &[String],
    ) -> Result<Vec<CatalogProduct>, RepoError> {
        self.enter()?;
        Ok(self
            .products
            .iter()
            .filter(|item| slugs.contains(&item.product.slug))
            .cloned()
            .collect())
    }
}

/// Serves one rendered products page; everything else is missing.
#[derive(Default)]
pub struct StaticPages {
    fetches: AtomicUsize,
}

impl StaticPages {
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for StaticPages {
    async fn fetch_html(&self, path: &str) -> Result<String, RepoError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match path {
            "/products/electronics" => Ok(PRODUCTS_PAGE.to_string()),
            _ => Err(RepoError::NotFound),
        }
    }
}

pub struct Healthy;

#[async_trait]
impl HealthProbe for Healthy {
    async fn check(&self) -> Result<(), InfraError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Quotas {
    pub catalog: u32,
    pub cart_read: u32,
    pub cart_write: u32,
}

impl Default for Quotas {
    fn default() -> Self {
        Self {
            catalog: 1_000,
            cart_read: 1_000,
            cart_write: 1_000,
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<FakeCatalog>,
    pub pages: Arc<StaticPages>,
    pub tasks: DetachedTasks,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_quotas(Quotas::default())
    }

    pub fn with_quotas(quotas: Quotas) -> Self {
        let repo = Arc::new(FakeCatalog::seeded());
        let pages = Arc::new(StaticPages::default());
        let tasks = DetachedTasks::new();

        let config = CacheConfig::default();
        let cache = CacheAside::new(
            config.clone(),
            Arc::new(MemoryKvStore::new(&config)),
            Arc::new(tasks.clone()),
        );

        let limiter =
            |max: u32| Arc::new(SlidingWindowLimiter::new(Duration::from_secs(60), max));
        let gate = RateGate::new(
            limiter(quotas.catalog),
            limiter(quotas.cart_read),
            limiter(quotas.cart_write),
        );

        let catalog_repo: Arc<dyn CatalogRepo> = repo.clone();
        let state = HttpState {
            catalog: Arc::new(CatalogService::new(catalog_repo.clone(), cache.clone())),
            carts: Arc::new(CartService::new(catalog_repo)),
            page_images: Arc::new(PageImagesService::new(pages.clone(), cache)),
            rate_gate: Arc::new(gate),
            cart_cookie: CartCookieSettings::default(),
            health: Arc::new(Healthy),
        };

        Self {
            router: build_router(state),
            repo,
            pages,
            tasks,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Waits for detached cache writes so the next read can hit.
    pub async fn settle(&self) {
        assert!(self.tasks.drain(Duration::from_secs(1)).await);
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}

pub fn get_with_cookie(uri: &str, cart: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(cart) = cart {
        builder = builder.header(header::COOKIE, format!("cart={cart}"));
    }
    builder.body(Body::empty()).expect("valid request")
}

pub fn json_request(
    method: Method,
    uri: &str,
    body: serde_json::Value,
    cart: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cart) = cart {
        builder = builder.header(header::COOKIE, format!("cart={cart}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("readable body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

/// Value and raw header of the `cart` cookie set by a response, if any.
pub fn set_cart_cookie(response: &Response<Body>) -> Option<(String, String)> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("cart="))
        .map(|raw| {
            let value = raw
                .trim_start_matches("cart=")
                .split(';')
                .next()
                .unwrap_or_default()
                .to_string();
            (value, raw.to_string())
        })
}
