//! `/order`: the cookie-held cart.
//!
//! Every handler decodes the `cart` cookie, applies one transition and writes
//! the next value back. A cookie that fails to decode is treated as an empty
//! cart.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::cart::{self, CART_COOKIE, Cart, CartMutation, MutationOutcome, ProductSlug};

use super::HttpState;
use super::error::ApiError;

const DEFAULT_CART_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 7;

/// Attributes written on every cart cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartCookieSettings {
    pub secure: bool,
    pub max_age_seconds: i64,
}

impl Default for CartCookieSettings {
    fn default() -> Self {
        Self {
            secure: true,
            max_age_seconds: DEFAULT_CART_MAX_AGE_SECS,
        }
    }
}

impl CartCookieSettings {
    pub fn cookie(&self, cart: &Cart) -> Cookie<'static> {
        Cookie::build((CART_COOKIE, cart::encode(cart)))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .max_age(time::Duration::seconds(self.max_age_seconds))
            .build()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub product_slug: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityAction {
    Increase,
    Decrease,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityRequest {
    pub product_slug: String,
    pub action: QuantityAction,
}

#[derive(Debug, Serialize)]
pub struct AddedResponse {
    pub success: bool,
    pub message: &'static str,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub success: bool,
    pub message: &'static str,
    pub removed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityResponse {
    pub success: bool,
    pub message: &'static str,
    pub new_quantity: u32,
}

pub(super) fn read_cart(jar: &CookieJar) -> Cart {
    let Some(cookie) = jar.get(CART_COOKIE) else {
        return Cart::new();
    };
    match cart::decode(cookie.value()) {
        Ok(cart) => cart,
        Err(err) => {
            warn!(
                target: "storefront::http::order",
                error = %err,
                "discarding malformed cart cookie"
            );
            Cart::new()
        }
    }
}

fn parse_slug(raw: &str) -> Result<ProductSlug, ApiError> {
    ProductSlug::parse(raw)
        .map_err(|err| ApiError::bad_request("Invalid request body", Some(err.to_string())))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| {
            ApiError::bad_request("Invalid request body", Some(rejection.body_text()))
        })
}

pub async fn get_cart(
    State(state): State<HttpState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let cart = read_cart(&jar);
    let detailed = state.carts.detailed(&cart).await?;
    Ok(Json(detailed))
}

pub async fn add_item(
    State(state): State<HttpState>,
    jar: CookieJar,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body(payload)?;
    let slug = parse_slug(&request.product_slug)?;

    let transition = read_cart(&jar).apply(&CartMutation::Add(slug));
    let quantity = match transition.outcome {
        MutationOutcome::Added { quantity } | MutationOutcome::Updated { quantity } => quantity,
        MutationOutcome::Removed | MutationOutcome::NotFound => 0,
    };
    let jar = jar.add(state.cart_cookie.cookie(&transition.cart));

    Ok((
        jar,
        Json(AddedResponse {
            success: true,
            message: "Items added to cart",
            quantity,
        }),
    ))
}

pub async fn remove_item(
    State(state): State<HttpState>,
    jar: CookieJar,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body(payload)?;
    let slug = parse_slug(&request.product_slug)?;

    let transition = read_cart(&jar).apply(&CartMutation::Remove(slug));
    if !transition.outcome.changed() {
        return Ok((
            jar,
            Json(RemovedResponse {
                success: true,
                message: "Item not in cart",
                removed: false,
            }),
        ));
    }

    let jar = jar.add(state.cart_cookie.cookie(&transition.cart));
    Ok((
        jar,
        Json(RemovedResponse {
            success: true,
            message: "Item removed from cart",
            removed: true,
        }),
    ))
}

pub async fn update_quantity(
    State(state): State<HttpState>,
    jar: CookieJar,
    payload: Result<Json<QuantityRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body(payload)?;
    let slug = parse_slug(&request.product_slug)?;

    let (mutation, message) = match request.action {
        QuantityAction::Increase => (CartMutation::Increase(slug), "Item quantity increased"),
        QuantityAction::Decrease => (CartMutation::Decrease(slug), "Item quantity decreased"),
    };

    let transition = read_cart(&jar).apply(&mutation);
    let MutationOutcome::Updated { quantity } = transition.outcome else {
        return Err(ApiError::not_found("Item not found in cart"));
    };

    let jar = jar.add(state.cart_cookie.cookie(&transition.cart));
    Ok((
        jar,
        Json(QuantityResponse {
            success: true,
            message,
            new_quantity: quantity,
        }),
    ))
}
