use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::compression::CompressionLayer;
use validator::Validate;

use application::services::{LoginRequest, SignupRequest};

use crate::{
    auth::{AuthUser, LoginResponse},
    chat_routes::chat_routes,
    error::ApiError,
    extract::{validate_payload, ApiJson},
    payment_routes::payment_routes,
    post_routes::post_routes,
    state::AppState,
    user_routes::user_routes,
    websocket::websocket_upgrade,
};

#[derive(Debug, Deserialize, Validate)]
struct SignupPayload {
    #[validate(length(min = 1, message = "Email, phone and password are required"))]
    email: String,
    #[validate(length(min = 1, message = "Email, phone and password are required"))]
    phone: String,
    #[validate(length(min = 1, message = "Email, phone and password are required"))]
    password: String,
}

/// `email` 字段也接受手机号。
#[derive(Debug, Deserialize, Validate)]
struct LoginPayload {
    #[serde(alias = "identifier", alias = "phone")]
    #[validate(length(min = 1, message = "Email or phone and password are required"))]
    email: String,
    #[validate(length(min = 1, message = "Email or phone and password are required"))]
    password: String,
}

#[derive(Debug, Deserialize)]
struct FederatedPayload {
    credential: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyTokenResponse {
    valid: bool,
    is_new_user: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
        .nest("/api", api_routes(state.upload_body_limit))
        .layer(CompressionLayer::new())
        .with_state(state)
}

fn api_routes(upload_body_limit: usize) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/users", user_routes(upload_body_limit))
        .nest("/posts", post_routes())
        .nest("/chats", chat_routes())
        .nest("/payments", payment_routes(upload_body_limit))
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/federated", post(federated))
        .route("/google", post(federated))
        .route("/verify-token", get(verify_token).post(verify_token))
}

/// 给上传路由放宽请求体上限。
pub(crate) fn with_upload_limit(router: Router<AppState>, limit: usize) -> Router<AppState> {
    router.layer(DefaultBodyLimit::max(limit))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn signup(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignupPayload>,
) -> Result<Json<LoginResponse>, ApiError> {
    validate_payload(&payload)?;
    let authenticated = state
        .auth_service
        .signup(SignupRequest {
            email: payload.email,
            phone: payload.phone,
            password: payload.password,
        })
        .await?;

    let token = state.jwt_service.generate_token(&authenticated.user)?;
    Ok(Json(LoginResponse {
        token,
        is_new_user: authenticated.is_new_user,
    }))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginPayload>,
) -> Result<Json<LoginResponse>, ApiError> {
    validate_payload(&payload)?;
    let authenticated = state
        .auth_service
        .login(LoginRequest {
            identifier: payload.email,
            password: payload.password,
        })
        .await?;

    let token = state.jwt_service.generate_token(&authenticated.user)?;
    Ok(Json(LoginResponse {
        token,
        is_new_user: authenticated.is_new_user,
    }))
}

async fn federated(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<FederatedPayload>,
) -> Result<Json<LoginResponse>, ApiError> {
    let authenticated = state.auth_service.federated(&payload.credential).await?;

    let token = state.jwt_service.generate_token(&authenticated.user)?;
    Ok(Json(LoginResponse {
        token,
        is_new_user: authenticated.is_new_user,
    }))
}

async fn verify_token(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<VerifyTokenResponse>, ApiError> {
    let authenticated = state.auth_service.verify(user_id).await?;
    Ok(Json(VerifyTokenResponse {
        valid: true,
        is_new_user: authenticated.is_new_user,
    }))
}
