//! Cache key definitions.
//!
//! A key renders as `kind` or `kind:selector`. Kinds are a fixed, prefix-free
//! set and selectors are form-urlencoded, so a selector can never contain the
//! `:` separator and distinct queries cannot collide.

use std::fmt;

use url::form_urlencoded;

/// How long a resource may be served stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TtlTier {
    /// Collections and category trees; change only on reseeding.
    Hierarchy,
    /// Product counts.
    Count,
    /// Product listings and product detail; follow catalog edits.
    Listing,
    /// Search results.
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Collections,
    Collection(String),
    Category(String),
    CategoryProductCount(String),
    SubcategoryProducts(String),
    SubcategoryProductCount(String),
    Product(String),
    ProductCount,
    Search(String),
    PageImages(String),
}

impl CacheKey {
    pub fn kind(&self) -> &'static str {
        match self {
            CacheKey::Collections => "collections",
            CacheKey::Collection(_) => "collection",
            CacheKey::Category(_) => "category",
            CacheKey::CategoryProductCount(_) => "category-product-count",
            CacheKey::SubcategoryProducts(_) => "subcategory-products",
            CacheKey::SubcategoryProductCount(_) => "subcategory-product-count",
            CacheKey::Product(_) => "product",
            CacheKey::ProductCount => "product-count",
            CacheKey::Search(_) => "search",
            CacheKey::PageImages(_) => "page-images",
        }
    }

    pub fn selector(&self) -> Option<&str> {
        match self {
            CacheKey::Collections | CacheKey::ProductCount => None,
            CacheKey::Collection(value)
            | CacheKey::Category(value)
            | CacheKey::CategoryProductCount(value)
            | CacheKey::SubcategoryProducts(value)
            | CacheKey::SubcategoryProductCount(value)
            | CacheKey::Product(value)
            | CacheKey::Search(value)
            | CacheKey::PageImages(value) => Some(value.as_str()),
        }
    }

    pub fn tier(&self) -> TtlTier {
        match self {
            CacheKey::Collections | CacheKey::Collection(_) | CacheKey::Category(_) => {
                TtlTier::Hierarchy
            }
            CacheKey::CategoryProductCount(_)
            | CacheKey::SubcategoryProductCount(_)
            | CacheKey::ProductCount => TtlTier::Count,
            CacheKey::SubcategoryProducts(_) | CacheKey::Product(_) | CacheKey::PageImages(_) => {
                TtlTier::Listing
            }
            CacheKey::Search(_) => TtlTier::Search,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())?;
        if let Some(selector) = self.selector() {
            f.write_str(":")?;
            for chunk in form_urlencoded::byte_serialize(selector.as_bytes()) {
                f.write_str(chunk)?;
            }
        }
        Ok(())
    }
}
