mod catalog;
pub mod error;
mod middleware;
mod order;
mod prefetch;
pub mod rate_limit;

pub use error::ApiError;
pub use middleware::{GateState, RequestContext};
pub use order::CartCookieSettings;
pub use rate_limit::{
    ClientIdentity, LimiterClass, RateGate, RateLimitBackend, RateLimitOutcome,
    SlidingWindowLimiter,
};

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{MethodRouter, get, post},
};

use crate::{
    application::{cart::CartService, catalog::CatalogService, error::ErrorReport},
    infra::{db::PostgresRepositories, error::InfraError},
    prefetch::PageImagesService,
};

use self::middleware::{log_responses, rate_gate, set_request_context};

/// Liveness of the relational store behind `/_health/db`.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> Result<(), InfraError>;
}

#[async_trait]
impl HealthProbe for PostgresRepositories {
    async fn check(&self) -> Result<(), InfraError> {
        self.health_check().await.map_err(InfraError::from)
    }
}

#[derive(Clone)]
pub struct HttpState {
    pub catalog: Arc<CatalogService>,
    pub carts: Arc<CartService>,
    pub page_images: Arc<PageImagesService>,
    pub rate_gate: Arc<RateGate>,
    pub cart_cookie: CartCookieSettings,
    pub health: Arc<dyn HealthProbe>,
}

fn gated(
    route: MethodRouter<HttpState>,
    gate: &Arc<RateGate>,
    class: LimiterClass,
) -> MethodRouter<HttpState> {
    route.route_layer(axum_middleware::from_fn_with_state(
        GateState::new(gate.clone(), class),
        rate_gate,
    ))
}

pub fn build_router(state: HttpState) -> Router {
    let gate = state.rate_gate.clone();
    let limited = |route: MethodRouter<HttpState>| gated(route, &gate, LimiterClass::Catalog);

    let catalog_routes = Router::new()
        .route("/api/collections", limited(get(catalog::list_collections)))
        .route(
            "/api/collections/{slug}",
            limited(get(catalog::collection_details)),
        )
        .route("/api/categories/{slug}", limited(get(catalog::category)))
        .route(
            "/api/categories/{slug}/product-count",
            limited(get(catalog::category_product_count)),
        )
        .route(
            "/api/subcategories/{slug}/products",
            limited(get(catalog::subcategory_products)),
        )
        .route(
            "/api/subcategories/{slug}/product-count",
            limited(get(catalog::subcategory_product_count)),
        )
        .route("/api/products/count", limited(get(catalog::product_count)))
        .route("/api/products/{slug}", limited(get(catalog::product)))
        .route("/search", limited(get(catalog::search)))
        .route(
            "/api/prefetch-images/{*path}",
            limited(get(prefetch::page_images)),
        )
        .route(
            "/api/prefetch-images",
            limited(get(prefetch::page_images_without_path)),
        )
        .route(
            "/api/prefetch-images/",
            limited(get(prefetch::page_images_without_path)),
        );

    let order_read = gated(get(order::get_cart), &gate, LimiterClass::CartRead);
    let order_write = gated(
        post(order::add_item)
            .put(order::remove_item)
            .patch(order::update_quantity),
        &gate,
        LimiterClass::CartWrite,
    );

    catalog_routes
        .route("/order", order_read.merge(order_write))
        .route("/_health/db", get(db_health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.check().await)
}

fn db_health_response(result: Result<(), InfraError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
