use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderValue, header::CACHE_CONTROL},
    response::{IntoResponse, Response},
};

use super::HttpState;
use super::error::ApiError;

const IMAGES_CACHE_CONTROL: &str = "public, max-age=3600";

pub async fn page_images(
    State(state): State<HttpState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    if path.trim_matches('/').is_empty() {
        return Err(missing_path());
    }

    let images = state.page_images.images(&path).await?;
    let mut response = Json(images).into_response();
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static(IMAGES_CACHE_CONTROL));
    Ok(response)
}

pub async fn page_images_without_path() -> ApiError {
    missing_path()
}

fn missing_path() -> ApiError {
    ApiError::bad_request("Missing path parameter", None)
}
