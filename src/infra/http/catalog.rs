//! Read-only catalog endpoints. Every response comes through the cache.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use super::HttpState;
use super::error::ApiError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub q: String,
}

pub async fn list_collections(
    State(state): State<HttpState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.catalog.collections().await?))
}

pub async fn collection_details(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.catalog.collection_details(&slug).await?))
}

pub async fn category(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .catalog
        .category(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Category not found"))
}

pub async fn category_product_count(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.catalog.category_product_count(&slug).await?))
}

pub async fn subcategory_products(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.catalog.subcategory_products(&slug).await?))
}

pub async fn subcategory_product_count(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.catalog.subcategory_product_count(&slug).await?))
}

pub async fn product(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .catalog
        .product(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Product not found"))
}

pub async fn product_count(State(state): State<HttpState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.catalog.product_count().await?))
}

pub async fn search(
    State(state): State<HttpState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.catalog.search(&params.q).await?))
}
