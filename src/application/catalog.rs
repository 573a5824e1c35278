//! Cached catalog reads.
//!
//! Each operation owns one cache key kind and delegates to [`CatalogRepo`] on
//! a miss. The TTL follows the key's tier.

use std::sync::Arc;

use crate::{
    application::repos::{CatalogRepo, RepoError, SEARCH_RESULT_LIMIT, SearchQuery},
    cache::{CacheAside, CacheKey, FetchFailed},
    domain::entities::{
        CategoryTree, CollectionWithCategories, ProductCount, ProductRecord, SearchHit,
    },
};

const MIN_SEARCH_CHARS: usize = 2;

#[derive(Clone)]
pub struct CatalogService {
    repo: Arc<dyn CatalogRepo>,
    cache: CacheAside,
}

impl CatalogService {
    pub fn new(repo: Arc<dyn CatalogRepo>, cache: CacheAside) -> Self {
        Self { repo, cache }
    }

    /// All collections with their categories, ordered by name.
    pub async fn collections(&self) -> Result<Vec<CollectionWithCategories>, FetchFailed> {
        self.cache
            .fetch(&CacheKey::Collections, || self.repo.list_collections())
            .await
    }

    pub async fn collection_details(
        &self,
        slug: &str,
    ) -> Result<Vec<CollectionWithCategories>, FetchFailed> {
        self.cache
            .fetch(&CacheKey::Collection(slug.to_string()), || {
                self.repo.find_collection(slug)
            })
            .await
    }

    pub async fn category(&self, slug: &str) -> Result<Option<CategoryTree>, FetchFailed> {
        self.cache
            .fetch(&CacheKey::Category(slug.to_string()), || {
                self.repo.find_category_tree(slug)
            })
            .await
    }

    pub async fn category_product_count(&self, slug: &str) -> Result<ProductCount, FetchFailed> {
        self.cache
            .fetch(&CacheKey::CategoryProductCount(slug.to_string()), || async {
                let count = self.repo.count_products_in_category(slug).await?;
                Ok::<_, RepoError>(ProductCount { count })
            })
            .await
    }

    /// Products of one subcategory, ordered by slug.
    pub async fn subcategory_products(
        &self,
        slug: &str,
    ) -> Result<Vec<ProductRecord>, FetchFailed> {
        self.cache
            .fetch(&CacheKey::SubcategoryProducts(slug.to_string()), || {
                self.repo.list_products_in_subcategory(slug)
            })
            .await
    }

    pub async fn subcategory_product_count(
        &self,
        slug: &str,
    ) -> Result<ProductCount, FetchFailed> {
        self.cache
            .fetch(
                &CacheKey::SubcategoryProductCount(slug.to_string()),
                || async {
                    let count = self.repo.count_products_in_subcategory(slug).await?;
                    Ok::<_, RepoError>(ProductCount { count })
                },
            )
            .await
    }

    pub async fn product(&self, slug: &str) -> Result<Option<ProductRecord>, FetchFailed> {
        self.cache
            .fetch(&CacheKey::Product(slug.to_string()), || {
                self.repo.find_product(slug)
            })
            .await
    }

    pub async fn product_count(&self) -> Result<ProductCount, FetchFailed> {
        self.cache
            .fetch(&CacheKey::ProductCount, || async {
                let count = self.repo.count_products().await?;
                Ok::<_, RepoError>(ProductCount { count })
            })
            .await
    }

    /// Product-name search. Terms shorter than two characters return nothing
    /// without touching either store.
    pub async fn search(&self, raw: &str) -> Result<Vec<SearchHit>, FetchFailed> {
        let Some((normalized, query)) = normalize_search(raw) else {
            return Ok(Vec::new());
        };
        self.cache
            .fetch(&CacheKey::Search(normalized), || {
                self.repo.search_products(&query, SEARCH_RESULT_LIMIT)
            })
            .await
    }
}

/// Lowercases and collapses whitespace, then picks the match strategy.
pub fn normalize_search(raw: &str) -> Option<(String, SearchQuery)> {
    let words: Vec<String> = raw.split_whitespace().map(str::to_lowercase).collect();
    let normalized = words.join(" ");
    let len = normalized.chars().count();
    if len < MIN_SEARCH_CHARS {
        return None;
    }
    let query = if len == MIN_SEARCH_CHARS {
        SearchQuery::Prefix(normalized.clone())
    } else {
        SearchQuery::AnyWord(words)
    };
    Some((normalized, query))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_queries_are_rejected() {
        assert_eq!(normalize_search(""), None);
        assert_eq!(normalize_search("   "), None);
        assert_eq!(normalize_search(" a "), None);
    }

    #[test]
    fn two_characters_match_by_prefix() {
        assert_eq!(
            normalize_search(" Ca "),
            Some(("ca".into(), SearchQuery::Prefix("ca".into())))
        );
    }

    #[test]
    fn longer_queries_match_any_word() {
        assert_eq!(
            normalize_search("USB   Cable"),
            Some((
                "usb cable".into(),
                SearchQuery::AnyWord(vec!["usb".into(), "cable".into()])
            ))
        );
    }
}
