//! Cart view assembly.
//!
//! The cookie only carries slugs and quantities; the detailed view joins them
//! with catalog rows in a single batched lookup.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    application::repos::CatalogRepo,
    cache::FetchFailed,
    domain::{
        cart::{Cart, CartState},
        entities::CatalogProduct,
    },
};

const CART_PRODUCTS_RESOURCE: &str = "cart-products";

/// One cart line resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartProduct {
    #[serde(flatten)]
    pub product: CatalogProduct,
    pub quantity: u32,
    pub href: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedCart {
    pub products: Vec<CartProduct>,
    pub total_quantity: u64,
}

#[derive(Clone)]
pub struct CartService {
    repo: Arc<dyn CatalogRepo>,
}

impl CartService {
    pub fn new(repo: Arc<dyn CatalogRepo>) -> Self {
        Self { repo }
    }

    /// Resolves every line in one lookup. Slugs the catalog no longer knows
    /// are dropped; the remaining lines keep cart order.
    pub async fn detailed(&self, cart: &Cart) -> Result<DetailedCart, FetchFailed> {
        if let CartState::Empty = cart.state() {
            return Ok(DetailedCart::default());
        }

        let found = self
            .repo
            .find_products_by_slugs(&cart.slugs())
            .await
            .map_err(|source| FetchFailed {
                key: CART_PRODUCTS_RESOURCE.to_string(),
                source,
            })?;

        Ok(join_lines(cart, found))
    }
}

fn join_lines(cart: &Cart, found: Vec<CatalogProduct>) -> DetailedCart {
    let mut by_slug: HashMap<String, CatalogProduct> = found
        .into_iter()
        .map(|product| (product.product.slug.clone(), product))
        .collect();

    let products: Vec<CartProduct> = cart
        .lines()
        .iter()
        .filter_map(|line| {
            by_slug.remove(&line.product_slug).map(|product| CartProduct {
                href: product.href(),
                product,
                quantity: line.quantity,
            })
        })
        .collect();
    let total_quantity = products.iter().map(|item| u64::from(item.quantity)).sum();

    DetailedCart {
        products,
        total_quantity,
    }
}
