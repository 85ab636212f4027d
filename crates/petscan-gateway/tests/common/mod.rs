//! Shared helpers for router tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use petscan_core::TokenService;
use petscan_gateway::{
    create_router, AppState, AuthService, GatewayConfig, MemoryStore, PasswordHasher,
};
use petscan_worker::{ImageAnalyzer, MockAnalyzer};

pub const KEY: [u8; 32] = [42u8; 32];
pub const BOUNDARY: &str = "petscan-test-boundary";
pub const PASSWORD: &str = "password123";

pub fn config() -> GatewayConfig {
    GatewayConfig::new(STANDARD.encode(KEY))
}

pub fn token_service() -> TokenService {
    TokenService::from_key_bytes(&KEY, 3_600_000).unwrap()
}

pub fn app_with(analyzer: Arc<dyn ImageAnalyzer>) -> Router {
    let config = config();
    let tokens = TokenService::new(&config.jwt_secret, config.jwt_expiration_ms).unwrap();
    let state = Arc::new(AppState {
        auth: AuthService::new(
            Arc::new(MemoryStore::new()),
            PasswordHasher::with_params(4096, 1, 1).unwrap(),
            tokens,
        ),
        analyzer,
        config,
    });
    create_router(state)
}

pub fn app() -> (Router, Arc<MockAnalyzer>) {
    let analyzer = Arc::new(MockAnalyzer::classifying("cat"));
    (app_with(analyzer.clone()), analyzer)
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Register an account and return its token
pub async fn register(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/api/auth/register",
            serde_json::json!({ "email": email, "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

/// A multipart body with a single part
pub fn multipart_body(field: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"pet.jpg\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn analyze_request(authorization: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/pets/analyze")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn image_upload(token: &str) -> Request<Body> {
    analyze_request(
        Some(&format!("Bearer {}", token)),
        multipart_body("image", "image/jpeg", b"\xff\xd8\xff\xe0JFIF"),
    )
}
