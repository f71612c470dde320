use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use models::{HttpErrorInfo, Product, ProductAggregate, Recommendation};
use serde_json::json;
use tower::ServiceExt;

use server::routes::build_router;
use server::state::AppState;
use service::integration::mock::{MockProductClient, MockRecommendationClient, MockReviewClient, Op};
use service::{CompositeConfig, ProductCompositeService, ServiceError};

struct TestApp {
    router: Router,
    products: Arc<MockProductClient>,
    recommendations: Arc<MockRecommendationClient>,
    reviews: Arc<MockReviewClient>,
}

fn app() -> TestApp {
    let products = Arc::new(MockProductClient::new("product:7001"));
    let recommendations = Arc::new(MockRecommendationClient::new("recommendation:7002"));
    let reviews = Arc::new(MockReviewClient::new("review:7003"));
    let composite = ProductCompositeService::new(
        products.clone(),
        recommendations.clone(),
        reviews.clone(),
        CompositeConfig { service_address: "composite:8080".into(), ..Default::default() },
    );
    TestApp { router: build_router(AppState::new(composite)), products, recommendations, reviews }
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, Vec<u8>) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = router.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

fn envelope(bytes: &[u8]) -> HttpErrorInfo {
    serde_json::from_slice(bytes).expect("error envelope")
}

fn composite_body(product_id: i32) -> serde_json::Value {
    json!({
        "productId": product_id,
        "name": "name",
        "weight": 1,
        "recommendations": [
            {"recommendationId": 1, "author": "a", "rate": 1, "content": "c"},
            {"recommendationId": 2, "author": "a", "rate": 2, "content": "c"}
        ],
        "reviews": [
            {"reviewId": 1, "author": "a", "subject": "s", "content": "c"}
        ]
    })
}

#[tokio::test]
async fn health_endpoint_works() {
    let app = app();
    let (status, body) = send(&app.router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<serde_json::Value>(&body).unwrap(), json!({"status": "ok"}));
}

#[tokio::test]
async fn metrics_endpoint_exposes_text_format() {
    let app = app();
    // one composite call so the operation histogram has a sample
    let _ = send(&app.router, Method::GET, "/product-composite/1", None).await;
    let (status, body) = send(&app.router, Method::GET, "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("product_composite_operation_duration_seconds"));
}

#[tokio::test]
async fn create_then_read_then_delete() {
    let app = app();

    let (status, body) = send(&app.router, Method::POST, "/product-composite", Some(composite_body(1))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());

    let (status, body) = send(&app.router, Method::GET, "/product-composite/1", None).await;
    assert_eq!(status, StatusCode::OK);
    let agg: ProductAggregate = serde_json::from_slice(&body).unwrap();
    assert_eq!(agg.product_id, 1);
    assert_eq!(agg.recommendations.len(), 2);
    assert_eq!(agg.reviews.len(), 1);
    assert_eq!(agg.service_addresses.composite_product, "composite:8080");
    assert_eq!(agg.service_addresses.product, "product:7001");

    for _ in 0..2 {
        let (status, body) = send(&app.router, Method::DELETE, "/product-composite/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }
    assert!(!app.products.contains(1));
    assert_eq!(app.recommendations.count_for(1), 0);
    assert_eq!(app.reviews.count_for(1), 0);
}

#[tokio::test]
async fn missing_product_is_404_with_request_path() {
    let app = app();
    let (status, body) = send(&app.router, Method::GET, "/product-composite/13", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let info = envelope(&body);
    assert_eq!(info.status, 404);
    assert_eq!(info.message, "No product found for productId: 13");
    assert_eq!(info.path, "/product-composite/13");
}

#[tokio::test]
async fn non_positive_id_is_422_without_backend_calls() {
    let app = app();
    let (status, body) = send(&app.router, Method::GET, "/product-composite/-1", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(envelope(&body), HttpErrorInfo::new(422, "Invalid productId: -1", "/product-composite/-1"));

    let (status, _) = send(&app.router, Method::DELETE, "/product-composite/0", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.products.total_calls() + app.recommendations.total_calls() + app.reviews.total_calls(), 0);
}

#[tokio::test]
async fn non_integer_id_is_type_mismatch() {
    let app = app();
    let (status, body) = send(&app.router, Method::GET, "/product-composite/no-integer", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        envelope(&body),
        HttpErrorInfo::new(400, "Type mismatch.", "/product-composite/no-integer")
    );
    assert_eq!(app.products.total_calls(), 0);
}

#[tokio::test]
async fn malformed_body_is_400() {
    let app = app();
    let (status, body) =
        send(&app.router, Method::POST, "/product-composite", Some(json!({"productId": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let info = envelope(&body);
    assert_eq!(info.status, 400);
    assert_eq!(info.path, "/product-composite");
    assert_eq!(app.products.total_calls(), 0);
}

#[tokio::test]
async fn duplicate_create_is_422() {
    let app = app();
    app.products.insert(Product::new(1, "existing", 1));
    let (status, body) = send(&app.router, Method::POST, "/product-composite", Some(composite_body(1))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(envelope(&body).message, "Duplicate key, Product Id: 1");
    assert_eq!(app.recommendations.calls(Op::Create), 0);
}

#[tokio::test]
async fn unavailable_backend_is_503() {
    let app = app();
    app.products.insert(Product::new(1, "p", 1));
    app.reviews.fail_always(Op::Get, ServiceError::Unavailable("review: backend unreachable".into()));

    let (status, body) = send(&app.router, Method::GET, "/product-composite/1", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let info = envelope(&body);
    assert_eq!(info.status, 503);
    assert_eq!(info.message, "review: backend unreachable");
}

#[tokio::test]
async fn unexpected_backend_error_is_generic_500() {
    let app = app();
    app.products.insert(Product::new(1, "p", 1));
    app.recommendations.insert(Recommendation {
        product_id: 1,
        recommendation_id: 1,
        author: "a".into(),
        rate: 1,
        content: "c".into(),
        service_address: None,
    });
    app.recommendations.fail_always(
        Op::Get,
        ServiceError::UnexpectedBackend { status: 500, message: "NullPointerException at Foo.java:42".into() },
    );

    let (status, body) = send(&app.router, Method::GET, "/product-composite/1", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(envelope(&body), HttpErrorInfo::new(500, "Unexpected backend error", "/product-composite/1"));
}

#[tokio::test]
async fn backend_bad_request_surfaces_as_400() {
    let app = app();
    app.products.fail_always(Op::Get, ServiceError::type_mismatch());

    let (status, body) = send(&app.router, Method::GET, "/product-composite/5", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(envelope(&body), HttpErrorInfo::new(400, "Type mismatch.", "/product-composite/5"));
}
