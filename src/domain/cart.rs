//! Cookie-held cart state and its transitions.
//!
//! The cart is a plain value: every mutation is a pure function from the
//! current cart to the next one plus an outcome the caller can report. Nothing
//! here knows about requests or cookies beyond the encoded string form.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::form_urlencoded;

use super::error::DomainError;

/// Name of the cookie carrying the encoded cart.
pub const CART_COOKIE: &str = "cart";

/// A validated, non-empty product slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductSlug(String);

impl ProductSlug {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("product slug must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_slug: String,
    pub quantity: u32,
}

/// Ordered cart lines, unique by product slug.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartState<'a> {
    Empty,
    NonEmpty(&'a [CartLine]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartMutation {
    Add(ProductSlug),
    Remove(ProductSlug),
    Increase(ProductSlug),
    Decrease(ProductSlug),
}

impl CartMutation {
    pub fn slug(&self) -> &ProductSlug {
        match self {
            CartMutation::Add(slug)
            | CartMutation::Remove(slug)
            | CartMutation::Increase(slug)
            | CartMutation::Decrease(slug) => slug,
        }
    }
}

/// What a mutation did. `NotFound` is a regular result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Added { quantity: u32 },
    Removed,
    Updated { quantity: u32 },
    NotFound,
}

impl MutationOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, MutationOutcome::NotFound)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub cart: Cart,
    pub outcome: MutationOutcome,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from decoded lines, enforcing the line invariants.
    pub fn from_lines(lines: Vec<CartLine>) -> Result<Self, CartCodecError> {
        let mut seen = HashSet::with_capacity(lines.len());
        for (index, line) in lines.iter().enumerate() {
            if line.product_slug.trim().is_empty() {
                return Err(CartCodecError::EmptySlug { index });
            }
            if line.quantity == 0 {
                return Err(CartCodecError::ZeroQuantity {
                    slug: line.product_slug.clone(),
                });
            }
            if !seen.insert(line.product_slug.as_str()) {
                return Err(CartCodecError::DuplicateSlug {
                    slug: line.product_slug.clone(),
                });
            }
        }
        Ok(Self { lines })
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn state(&self) -> CartState<'_> {
        if self.lines.is_empty() {
            CartState::Empty
        } else {
            CartState::NonEmpty(&self.lines)
        }
    }

    pub fn quantity_of(&self, slug: &str) -> Option<u32> {
        self.position(slug).map(|idx| self.lines[idx].quantity)
    }

    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    pub fn slugs(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(|line| line.product_slug.clone())
            .collect()
    }

    /// Apply one mutation, producing the next cart and what happened.
    pub fn apply(&self, mutation: &CartMutation) -> Transition {
        let slug = mutation.slug().as_str();
        let mut lines = self.lines.clone();
        let position = self.position(slug);

        let outcome = match (mutation, position) {
            (CartMutation::Add(_), Some(idx)) => {
                let line = &mut lines[idx];
                line.quantity = line.quantity.saturating_add(1);
                MutationOutcome::Added {
                    quantity: line.quantity,
                }
            }
            (CartMutation::Add(_), None) => {
                lines.push(CartLine {
                    product_slug: slug.to_string(),
                    quantity: 1,
                });
                MutationOutcome::Added { quantity: 1 }
            }
            (CartMutation::Remove(_), Some(idx)) => {
                lines.remove(idx);
                MutationOutcome::Removed
            }
            (CartMutation::Increase(_), Some(idx)) => {
                let line = &mut lines[idx];
                line.quantity = line.quantity.saturating_add(1);
                MutationOutcome::Updated {
                    quantity: line.quantity,
                }
            }
            (CartMutation::Decrease(_), Some(idx)) => {
                // Floors at one; only an explicit remove drops a line.
                let line = &mut lines[idx];
                line.quantity = line.quantity.saturating_sub(1).max(1);
                MutationOutcome::Updated {
                    quantity: line.quantity,
                }
            }
            (
                CartMutation::Remove(_) | CartMutation::Increase(_) | CartMutation::Decrease(_),
                None,
            ) => MutationOutcome::NotFound,
        };

        Transition {
            cart: Cart { lines },
            outcome,
        }
    }

    pub fn add(&self, slug: &ProductSlug) -> Transition {
        self.apply(&CartMutation::Add(slug.clone()))
    }

    pub fn remove(&self, slug: &ProductSlug) -> Transition {
        self.apply(&CartMutation::Remove(slug.clone()))
    }

    pub fn increase(&self, slug: &ProductSlug) -> Transition {
        self.apply(&CartMutation::Increase(slug.clone()))
    }

    pub fn decrease(&self, slug: &ProductSlug) -> Transition {
        self.apply(&CartMutation::Decrease(slug.clone()))
    }

    fn position(&self, slug: &str) -> Option<usize> {
        self.lines.iter().position(|line| line.product_slug == slug)
    }
}

#[derive(Debug, Error)]
pub enum CartCodecError {
    #[error("cart value is not valid url encoding")]
    Encoding,
    #[error("cart value is not a JSON line array: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cart line {index} has an empty product slug")]
    EmptySlug { index: usize },
    #[error("cart line `{slug}` has quantity zero")]
    ZeroQuantity { slug: String },
    #[error("cart lists `{slug}` more than once")]
    DuplicateSlug { slug: String },
}

/// Encode a cart as URL-encoded JSON, the form stored in the cookie.
pub fn encode(cart: &Cart) -> String {
    // Serializing plain strings and integers cannot fail.
    let json = serde_json::to_string(&cart.lines).unwrap_or_else(|_| "[]".to_string());
    form_urlencoded::byte_serialize(json.as_bytes()).collect()
}

/// Decode a cookie value produced by [`encode`] or by a browser's `encodeURIComponent`.
pub fn decode(raw: &str) -> Result<Cart, CartCodecError> {
    let json = url_decode(raw)?;
    let lines: Vec<CartLine> = serde_json::from_str(&json)?;
    Cart::from_lines(lines)
}

fn url_decode(raw: &str) -> Result<String, CartCodecError> {
    // An encoded value never carries a bare separator.
    if raw.contains(['&', '=']) {
        return Err(CartCodecError::Encoding);
    }
    match form_urlencoded::parse(raw.as_bytes()).next() {
        Some((decoded, _)) => Ok(decoded.into_owned()),
        None => Ok(String::new()),
    }
}
