mod support;

use axum::http::{Method, StatusCode, header};
use serde_json::json;
use storefront::domain::cart::{self, Cart, ProductSlug};

use support::{Quotas, TestApp, body_json, get_with_cookie, json_request, set_cart_cookie};

fn encoded_cart(lines: &[(&str, u32)]) -> String {
    let mut cart = Cart::new();
    for (slug, quantity) in lines {
        let slug = ProductSlug::parse(slug).unwrap();
        for _ in 0..*quantity {
            cart = cart.add(&slug).cart;
        }
    }
    cart::encode(&cart)
}

#[tokio::test]
async fn add_add_decrease_remove_walks_the_cart() {
    let app = TestApp::new();

    let response = app
        .send(json_request(
            Method::POST,
            "/order",
            json!({"productSlug": "sku-1"}),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let (cookie, raw) = set_cart_cookie(&response).expect("cart cookie");
    for attribute in ["HttpOnly", "Secure", "SameSite=Strict", "Max-Age=604800", "Path=/"] {
        assert!(raw.contains(attribute), "missing {attribute} in {raw}");
    }
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Items added to cart");
    assert_eq!(body["quantity"], 1);

    let response = app
        .send(json_request(
            Method::POST,
            "/order",
            json!({"productSlug": "sku-1"}),
            Some(&cookie),
        ))
        .await;
    let (cookie, _) = set_cart_cookie(&response).expect("cart cookie");
    assert_eq!(body_json(response).await["quantity"], 2);

    let response = app
        .send(json_request(
            Method::PATCH,
            "/order",
            json!({"productSlug": "sku-1", "action": "decrease"}),
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let (cookie, _) = set_cart_cookie(&response).expect("cart cookie");
    let body = body_json(response).await;
    assert_eq!(body["message"], "Item quantity decreased");
    assert_eq!(body["newQuantity"], 1);

    let response = app
        .send(json_request(
            Method::PUT,
            "/order",
            json!({"productSlug": "sku-1"}),
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let (cookie, _) = set_cart_cookie(&response).expect("cart cookie");
    let body = body_json(response).await;
    assert_eq!(body["removed"], true);
    assert_eq!(body["message"], "Item removed from cart");

    let response = app.send(get_with_cookie("/order", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["products"], json!([]));
}

#[tokio::test]
async fn decrease_floors_at_one() {
    let app = TestApp::new();
    let cookie = encoded_cart(&[("sku-1", 1)]);

    let response = app
        .send(json_request(
            Method::PATCH,
            "/order",
            json!({"productSlug": "sku-1", "action": "decrease"}),
            Some(&cookie),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["newQuantity"], 1);
}

#[tokio::test]
async fn quantity_change_on_missing_item_is_not_found() {
    let app = TestApp::new();
    let cookie = encoded_cart(&[("sku-2", 1)]);

    let response = app
        .send(json_request(
            Method::PATCH,
            "/order",
            json!({"productSlug": "sku-1", "action": "increase"}),
            Some(&cookie),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(set_cart_cookie(&response).is_none());
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "Item not found in cart");
}

#[tokio::test]
async fn removing_missing_item_reports_nothing_removed() {
    let app = TestApp::new();

    let response = app
        .send(json_request(
            Method::PUT,
            "/order",
            json!({"productSlug": "sku-9"}),
            None,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cart_cookie(&response).is_none());
    assert_eq!(body_json(response).await["removed"], false);
}

#[tokio::test]
async fn invalid_bodies_are_rejected() {
    let app = TestApp::new();

    let response = app
        .send(json_request(
            Method::PATCH,
            "/order",
            json!({"productSlug": "sku-1", "action": "explode"}),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(json_request(
            Method::POST,
            "/order",
            json!({"productSlug": "   "}),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn detailed_cart_joins_catalog_and_drops_unknown_slugs() {
    let app = TestApp::new();
    let cookie = encoded_cart(&[("sku-2", 2), ("retired", 1), ("sku-3", 1)]);

    let response = app.send(get_with_cookie("/order", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let products = body["products"].as_array().expect("products array");
    assert_eq!(products.len(), 2);
    assert_eq!(products[0]["slug"], "sku-2");
    assert_eq!(products[0]["quantity"], 2);
    assert_eq!(products[0]["href"], "/products/electronics/cables/sku-2");
    assert_eq!(products[1]["slug"], "sku-3");
    assert_eq!(body["totalQuantity"], 3);
    assert_eq!(app.repo.calls(), 1);
}

#[tokio::test]
async fn malformed_cookie_reads_as_empty_cart() {
    let app = TestApp::new();

    let response = app
        .send(get_with_cookie("/order", Some("definitely-not-a-cart")))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["products"], json!([]));
    assert_eq!(app.repo.calls(), 0);
}

#[tokio::test]
async fn catalog_outage_surfaces_as_unavailable() {
    let app = TestApp::new();
    app.repo.set_offline(true);
    let cookie = encoded_cart(&[("sku-1", 1)]);

    let response = app.send(get_with_cookie("/order", Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn cart_writes_are_rate_limited_before_mutating() {
    let app = TestApp::with_quotas(Quotas {
        cart_write: 2,
        ..Quotas::default()
    });
    let add = || {
        json_request(
            Method::POST,
            "/order",
            json!({"productSlug": "sku-1"}),
            None,
        )
    };

    assert_eq!(app.send(add()).await.status(), StatusCode::OK);
    assert_eq!(app.send(add()).await.status(), StatusCode::OK);

    let denied = app.send(add()).await;
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(denied.headers().get(header::RETRY_AFTER).unwrap(), "60");
    assert!(set_cart_cookie(&denied).is_none());
    let body = body_json(denied).await;
    assert_eq!(body["error"]["code"], "rate_limited");

    let read = app.send(get_with_cookie("/order", None)).await;
    assert_eq!(read.status(), StatusCode::OK);
}
