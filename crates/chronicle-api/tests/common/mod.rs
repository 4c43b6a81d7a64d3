//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chronicle_core::cancel::CancelSignal;
use chronicle_core::codec::CodecOptions;
use chronicle_core::repository::AggregateRepository;
use chronicle_core::store::EventStore;
use chronicle_event_store::pg_event_store::PgEventStore;
use chronicle_test_support::FixedClock;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use chronicle_api::app;
use chronicle_api::state::AppState;

/// Build the full app router over any event store with a fixed clock. Uses
/// the same route structure as `main.rs`.
pub fn build_app_with_store(store: Arc<dyn EventStore>) -> Router {
    let codec = app::build_codec(CodecOptions::default()).unwrap();
    let repository = AggregateRepository::new(store, codec, Arc::new(FixedClock::default()));
    app::build_router(AppState::new(repository, CancelSignal::never()))
}

/// Build the full app router with a real `PgEventStore`.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app_with_store(Arc::new(PgEventStore::new(pool)))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Send a DELETE request and return the response.
pub async fn delete_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}
