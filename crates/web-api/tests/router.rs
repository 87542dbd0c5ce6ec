mod support;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use web_api::router;

use support::memory_state;

fn app() -> Router {
    let (state, _) = memory_state();
    router(state)
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_responds_without_auth() {
    let (status, _) = call(app(), Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_bearer_is_rejected_with_error_body() {
    let (status, body) = call(
        app(),
        Request::get("/api/users/profile").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert_eq!(body["error"], "No token provided or invalid format");

    let request = Request::get("/api/chats")
        .header(header::AUTHORIZATION, "Basic abc")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(app(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_json_is_invalid_argument() {
    let request = Request::post("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = call(app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");
    assert_eq!(body["error"], "Invalid request body");
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn blank_signup_field_names_the_field() {
    let (status, body) = call(
        app(),
        post_json(
            "/api/auth/signup",
            json!({ "email": "a@example.com", "phone": "+2348100000001", "password": "" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email, phone and password are required");
    assert_eq!(body["details"], "password");
}

#[tokio::test]
async fn signup_token_is_accepted_by_verify_endpoint() {
    let app = app();
    let (status, body) = call(
        app.clone(),
        post_json(
            "/api/auth/signup",
            json!({ "email": "dana@example.com", "phone": "+2348100000009", "password": "secret123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["isNewUser"], true);
    let token = body["token"].as_str().unwrap();

    let request = Request::get("/api/auth/verify-token")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["isNewUser"], true);
}

#[tokio::test]
async fn responses_are_gzipped_when_client_accepts_it() {
    let signup = json!({
        "email": "erin@example.com",
        "phone": "+2348100000011",
        "password": "secret123"
    });
    let request = Request::post("/api/auth/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::from(signup.to_string()))
        .unwrap();
    let app = app();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_ENCODING).unwrap(),
        "gzip"
    );

    // 未声明支持压缩的客户端拿到明文
    let (status, body) = call(
        app,
        post_json(
            "/api/auth/login",
            json!({ "email": "erin@example.com", "password": "secret123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["token"].is_string());
}
