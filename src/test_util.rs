//! Helpers shared by the handler tests.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use crate::state::AppState;
use crate::store::NewUser;

/// Drive one request through the router and decode the JSON body (or `Null`
/// for empty bodies).
pub async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    let req = match body {
        Some(v) => builder.body(Body::from(v.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Fake state with one user ("Ana", id 1) and three tags
/// (1 Trabalho, 2 Estudo, 3 Pessoal).
pub async fn seeded_state() -> AppState {
    let state = AppState::fake();
    state
        .store
        .create_user(NewUser {
            name: "Ana".into(),
            email: "ana@example.com".into(),
            password_hash: "irrelevant".into(),
        })
        .await
        .unwrap();
    for name in ["Trabalho", "Estudo", "Pessoal"] {
        state.store.create_tag(name).await.unwrap();
    }
    state
}
