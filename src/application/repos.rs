//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{
    CatalogProduct, CategoryTree, CollectionWithCategories, ProductRecord, SearchHit,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Normalized product-name search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Case-insensitive prefix match on the whole term.
    Prefix(String),
    /// Case-insensitive substring match on any of the words.
    AnyWord(Vec<String>),
}

pub const SEARCH_RESULT_LIMIT: u32 = 5;

/// Read-only access to the catalog hierarchy.
#[async_trait]
pub trait CatalogRepo: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<CollectionWithCategories>, RepoError>;

    async fn find_collection(
        &self,
        slug: &str,
    ) -> Result<Vec<CollectionWithCategories>, RepoError>;

    async fn find_category_tree(&self, slug: &str) -> Result<Option<CategoryTree>, RepoError>;

    async fn count_products_in_category(&self, slug: &str) -> Result<u64, RepoError>;

    async fn list_products_in_subcategory(
        &self,
        slug: &str,
    ) -> Result<Vec<ProductRecord>, RepoError>;

    async fn count_products_in_subcategory(&self, slug: &str) -> Result<u64, RepoError>;

    async fn find_product(&self, slug: &str) -> Result<Option<ProductRecord>, RepoError>;

    async fn count_products(&self) -> Result<u64, RepoError>;

    async fn search_products(
        &self,
        query: &SearchQuery,
        limit: u32,
    ) -> Result<Vec<SearchHit>, RepoError>;

    /// Batched lookup used by the cart view; unknown slugs are simply absent.
    async fn find_products_by_slugs(
        &self,
        slugs: &[String],
    ) -> Result<Vec<CatalogProduct>, RepoError>;
}
