//! Integration tests for GET /api/images against a mocked image provider

use axum::{body::Body, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http::{Request, StatusCode};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::Value;
use sslcz_relay::api::{build_router, AppState};
use sslcz_relay::config::{
    ImageProviderConfig, RedirectConfig, SecurityConfig, ServerConfig, SslCommerzConfig,
};
use sslcz_relay::database::InMemoryOrderRepository;
use sslcz_relay::health::HealthChecker;
use sslcz_relay::payments::providers::SslCommerzProvider;
use sslcz_relay::services::image_proxy::PLACEHOLDER_IMAGE;
use sslcz_relay::services::{ImageProxyService, PaymentFlowService};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::util::ServiceExt;

fn build_app(image_url: String, api_key: Option<&str>) -> Router {
    build_paced_app(image_url, api_key, 0, 1)
}

fn build_paced_app(
    image_url: String,
    api_key: Option<&str>,
    pacing_ms: u64,
    max_concurrency: usize,
) -> Router {
    let images = ImageProxyService::new(&ImageProviderConfig {
        api_key: api_key.map(str::to_string),
        base_url: image_url,
        timeout_secs: 5,
        pacing_ms,
        max_concurrency,
        max_count: 10,
    })
    .expect("image service");

    let gateway = SslCommerzProvider::new(SslCommerzConfig {
        sandbox: true,
        store_id: "teststore".to_string(),
        store_password: "teststore@ssl".to_string(),
        base_url: Some("http://127.0.0.1:9".to_string()),
        timeout_secs: 1,
    })
    .expect("provider");
    let orders = Arc::new(InMemoryOrderRepository::new());

    let state = AppState {
        payments: Arc::new(PaymentFlowService::new(
            Arc::new(gateway),
            orders.clone(),
            RedirectConfig::default(),
        )),
        images: Arc::new(images),
        health_checker: HealthChecker::new(orders, "sslcommerz", true),
        security: SecurityConfig::default(),
    };
    let server = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 5000,
        cors_allowed_origins: vec!["*".to_string()],
    };
    build_router(state, &server)
}

async fn fetch(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn mock_image(
    server: &mut ServerGuard,
    seed: &str,
    status: usize,
    content_type: &str,
    body: &[u8],
) -> Mock {
    server
        .mock("GET", "/prompt/fox")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("nologo".into(), "true".into()),
            Matcher::UrlEncoded("seed".into(), seed.into()),
        ]))
        .with_status(status)
        .with_header("content-type", content_type)
        .with_body(body)
        .create_async()
        .await
}

#[tokio::test]
async fn three_images_use_consecutive_seeds_in_order() {
    let mut server = Server::new_async().await;
    let first = mock_image(&mut server, "42", 200, "image/png", b"img-42").await;
    let second = mock_image(&mut server, "43", 200, "image/jpeg", b"img-43").await;
    let third = mock_image(&mut server, "44", 200, "image/gif", b"img-44").await;
    let app = build_app(server.url(), None);

    let (status, body) = fetch(&app, "/api/images?prompt=fox&numImages=3").await;

    assert_eq!(status, StatusCode::OK);
    let urls: Vec<&str> = body["imageUrls"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(
        urls,
        vec![
            format!("data:image/png;base64,{}", STANDARD.encode(b"img-42")),
            format!("data:image/jpeg;base64,{}", STANDARD.encode(b"img-43")),
            format!("data:image/gif;base64,{}", STANDARD.encode(b"img-44")),
        ]
    );
    first.assert_async().await;
    second.assert_async().await;
    third.assert_async().await;
}

async fn assert_paced_batch(max_concurrency: usize) {
    let mut server = Server::new_async().await;
    let _first = mock_image(&mut server, "42", 200, "image/png", b"a").await;
    let _second = mock_image(&mut server, "43", 200, "image/png", b"b").await;
    let _third = mock_image(&mut server, "44", 200, "image/png", b"c").await;
    let app = build_paced_app(server.url(), None, 50, max_concurrency);

    let started = Instant::now();
    let (status, body) = fetch(&app, "/api/images?prompt=fox&numImages=3").await;
    let elapsed = started.elapsed();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imageUrls"].as_array().unwrap().len(), 3);
    assert!(
        elapsed >= Duration::from_millis(100),
        "concurrency {} finished in {:?}",
        max_concurrency,
        elapsed
    );
}

#[tokio::test]
async fn sequential_batch_waits_between_requests() {
    assert_paced_batch(1).await;
}

#[tokio::test]
async fn concurrent_batch_still_spaces_requests() {
    assert_paced_batch(2).await;
}

#[tokio::test]
async fn custom_seed_width_and_api_key_are_forwarded() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/prompt/fox")
        .match_header("authorization", "Bearer key-123")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("seed".into(), "7".into()),
            Matcher::UrlEncoded("width".into(), "512".into()),
            Matcher::UrlEncoded("height".into(), "256".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "image/jpeg")
        .with_body("jpg")
        .create_async()
        .await;
    let app = build_app(server.url(), Some("key-123"));

    let (status, body) =
        fetch(&app, "/api/images?prompt=fox&seed=7&width=512&height=256").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imageUrls"].as_array().unwrap().len(), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn failed_image_becomes_placeholder() {
    let mut server = Server::new_async().await;
    let _broken = mock_image(&mut server, "42", 500, "text/plain", b"oops").await;
    let _ok = mock_image(&mut server, "43", 200, "image/png", b"img-43").await;
    let app = build_app(server.url(), None);

    let (status, body) = fetch(&app, "/api/images?prompt=fox&numImages=2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imageUrls"][0], PLACEHOLDER_IMAGE);
    assert!(body["imageUrls"][1]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn auth_failure_aborts_the_batch() {
    let mut server = Server::new_async().await;
    let _denied = mock_image(&mut server, "42", 401, "application/json", b"{}").await;
    let never = server
        .mock("GET", "/prompt/fox")
        .match_query(Matcher::UrlEncoded("seed".into(), "43".into()))
        .expect(0)
        .create_async()
        .await;
    let app = build_app(server.url(), Some("bad-key"));

    let (status, body) = fetch(&app, "/api/images?prompt=fox&numImages=3").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication failed or invalid API key.");
    never.assert_async().await;
}

#[tokio::test]
async fn rate_limit_is_propagated() {
    let mut server = Server::new_async().await;
    let _ok = mock_image(&mut server, "42", 200, "image/png", b"img").await;
    let _limited = mock_image(&mut server, "43", 429, "text/plain", b"slow down").await;
    let app = build_app(server.url(), None);

    let (status, body) = fetch(&app, "/api/images?prompt=fox&numImages=2").await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body["error"],
        "Rate limit exceeded for Pollinations.AI. Please try again later."
    );
}

#[tokio::test]
async fn no_successful_image_is_500() {
    let mut server = Server::new_async().await;
    let _broken = mock_image(&mut server, "42", 502, "text/plain", b"down").await;
    let app = build_app(server.url(), None);

    let (status, body) = fetch(&app, "/api/images?prompt=fox").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "No images could be generated.");
}

#[tokio::test]
async fn bad_parameters_are_400() {
    let server = Server::new_async().await;
    let app = build_app(server.url(), None);

    let (status, body) = fetch(&app, "/api/images?numImages=2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Prompt is required");

    let (status, _) = fetch(&app, "/api/images?prompt=fox&numImages=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = fetch(&app, "/api/images?prompt=fox&numImages=11").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = fetch(&app, "/api/images?prompt=fox&seed=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid seed: abc");

    let (status, body) = fetch(
        &app,
        "/api/images?prompt=fox&seed=9223372036854775807&numImages=2",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid seed: 9223372036854775807");
}

#[tokio::test]
async fn negative_seed_is_forwarded() {
    let mut server = Server::new_async().await;
    let first = mock_image(&mut server, "-1", 200, "image/png", b"neg").await;
    let second = mock_image(&mut server, "0", 200, "image/png", b"zero").await;
    let app = build_app(server.url(), None);

    let (status, body) = fetch(&app, "/api/images?prompt=fox&seed=-1&numImages=2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imageUrls"].as_array().unwrap().len(), 2);
    first.assert_async().await;
    second.assert_async().await;
}
