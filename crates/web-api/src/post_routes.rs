use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use application::{
    dto::{AcceptanceOutcome, PostView},
    services::{AcceptPostRequest, CreatePostRequest, ExtendPostRequest},
};
use domain::{DomainError, PaymentId, PostId, PostType, UserId};

use crate::{
    auth::AuthUser,
    error::ApiError,
    extract::{parse_id, ApiJson},
    state::AppState,
};

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route("/user/{id}", get(list_user_posts))
        .route("/extend", post(extend_post))
        .route("/accept", post(accept_request))
}

/// 帖子类型可以直接给出，也可以只给天数。
fn resolve_post_type(
    post_type: Option<&str>,
    duration: Option<u32>,
) -> Result<Option<PostType>, DomainError> {
    match (post_type, duration) {
        (Some(name), _) => PostType::parse(name).map(Some),
        (None, Some(days)) => PostType::from_duration_days(days).map(Some),
        (None, None) => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostPayload {
    content: String,
    #[serde(default)]
    sponsored: bool,
    post_type: Option<String>,
    duration: Option<u32>,
    image: Option<String>,
    payment_proof: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtendPostPayload {
    post_id: String,
    post_type: Option<String>,
    duration: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcceptPayload {
    post_id: String,
    payment_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct PostResponse {
    message: &'static str,
    post: PostView,
}

#[derive(Debug, Serialize)]
struct AcceptResponse {
    message: &'static str,
    #[serde(flatten)]
    outcome: AcceptanceOutcome,
}

async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<PostView>>, ApiError> {
    Ok(Json(state.post_service.list_active().await?))
}

async fn list_user_posts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PostView>>, ApiError> {
    let owner: UserId = parse_id(&id)?;
    Ok(Json(state.post_service.list_by_owner(owner).await?))
}

async fn create_post(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    ApiJson(payload): ApiJson<CreatePostPayload>,
) -> Result<Json<PostResponse>, ApiError> {
    let post_type = resolve_post_type(payload.post_type.as_deref(), payload.duration)?
        .unwrap_or(PostType::Quick);

    let post = state
        .post_service
        .create_post(CreatePostRequest {
            owner,
            content: payload.content,
            sponsored: payload.sponsored,
            post_type,
            image_url: payload.image,
            payment_proof_url: payload.payment_proof,
        })
        .await?;

    Ok(Json(PostResponse {
        message: "Post created",
        post,
    }))
}

async fn extend_post(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(payload): ApiJson<ExtendPostPayload>,
) -> Result<Json<PostResponse>, ApiError> {
    let post_id: PostId = parse_id(&payload.post_id)?;
    let post_type = resolve_post_type(payload.post_type.as_deref(), payload.duration)?
        .ok_or_else(|| DomainError::invalid_argument("duration", "is required"))?;

    let post = state
        .post_service
        .extend_post(ExtendPostRequest {
            actor,
            post_id,
            post_type,
        })
        .await?;

    Ok(Json(PostResponse {
        message: "Post extended",
        post,
    }))
}

async fn accept_request(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<AcceptPayload>,
) -> Result<Json<AcceptResponse>, ApiError> {
    let post_id: PostId = parse_id(&payload.post_id)?;
    let payment_id = payload
        .payment_id
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(parse_id::<PaymentId>)
        .transpose()?;

    let outcome = state
        .post_service
        .accept_request(AcceptPostRequest {
            post_id,
            user,
            payment_id,
        })
        .await?;

    Ok(Json(AcceptResponse {
        message: "Request accepted",
        outcome,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_type_comes_from_name_or_duration() {
        assert_eq!(
            resolve_post_type(Some("extended-7"), Some(30)).unwrap(),
            Some(PostType::Extended7)
        );
        assert_eq!(
            resolve_post_type(None, Some(30)).unwrap(),
            Some(PostType::Extended30)
        );
        assert_eq!(resolve_post_type(None, None).unwrap(), None);
        assert!(resolve_post_type(None, Some(3)).is_err());
        assert!(resolve_post_type(Some("forever"), None).is_err());
    }
}
