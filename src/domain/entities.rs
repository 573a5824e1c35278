//! Catalog entities mirrored from persistent storage.
//!
//! Every read model here is also a cache payload, so each type round-trips
//! through `serde_json` with camelCase field names.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRecord {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRecord {
    pub slug: String,
    pub name: String,
    pub collection_id: i32,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcollectionRecord {
    pub id: i32,
    pub name: String,
    pub category_slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryRecord {
    pub slug: String,
    pub name: String,
    pub subcollection_id: i32,
    pub image_url: Option<String>,
}

/// A product row. `price` stays textual to preserve decimal precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub subcategory_slug: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionWithCategories {
    #[serde(flatten)]
    pub collection: CollectionRecord,
    pub categories: Vec<CategoryRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcollectionWithSubcategories {
    #[serde(flatten)]
    pub subcollection: SubcollectionRecord,
    pub subcategories: Vec<SubcategoryRecord>,
}

/// A category with its full navigation subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTree {
    #[serde(flatten)]
    pub category: CategoryRecord,
    pub subcollections: Vec<SubcollectionWithSubcategories>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCount {
    pub count: u64,
}

/// A search result with a ready-to-follow product link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    #[serde(flatten)]
    pub product: ProductRecord,
    pub href: String,
}

/// A product joined with the category it lives under, as needed by the cart view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    #[serde(flatten)]
    pub product: ProductRecord,
    pub category_slug: String,
}

impl CatalogProduct {
    pub fn href(&self) -> String {
        product_href(
            &self.category_slug,
            &self.product.subcategory_slug,
            &self.product.slug,
        )
    }
}

pub fn product_href(category: &str, subcategory: &str, product: &str) -> String {
    format!("/products/{category}/{subcategory}/{product}")
}
