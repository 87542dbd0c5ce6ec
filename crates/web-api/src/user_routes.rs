use axum::{
    extract::{Multipart, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use application::{
    dto::{ProfileView, UploadedMedia, UserCardView},
    services::AccountDetails,
};
use domain::{DomainError, Gender, PhoneNumber, ProfilePatch, UserEmail, UserId, UserRole};

use crate::{
    auth::AuthUser,
    error::ApiError,
    extract::{parse_id, validate_payload, ApiJson},
    routes::with_upload_limit,
    state::AppState,
    upload::read_multipart,
};

pub fn user_routes(upload_body_limit: usize) -> Router<AppState> {
    let uploads = with_upload_limit(
        Router::new().route("/upload", post(upload_media)),
        upload_body_limit,
    );

    Router::new()
        .route(
            "/profile",
            post(create_profile).put(update_profile).get(get_profile),
        )
        .route("/current", get(get_profile))
        .route("/account-details", get(account_details))
        .route("/nearby", get(nearby))
        .route("/{id}", get(get_user))
        .route("/{id}/rate", post(rate_user))
        .merge(uploads)
}

/// 资料的部分更新，缺省字段保持不变。
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfilePayload {
    full_name: Option<String>,
    age: Option<i64>,
    gender: Option<String>,
    location: Option<String>,
    role: Option<String>,
    bio: Option<String>,
    #[serde(alias = "profilePicture")]
    avatar: Option<String>,
    images: Option<Vec<String>>,
    email: Option<String>,
    phone: Option<String>,
}

impl TryFrom<ProfilePayload> for ProfilePatch {
    type Error = DomainError;

    fn try_from(payload: ProfilePayload) -> Result<Self, Self::Error> {
        let age = payload
            .age
            .map(|age| {
                u8::try_from(age)
                    .map_err(|_| DomainError::invalid_argument("age", "must be between 18 and 99"))
            })
            .transpose()?;

        Ok(ProfilePatch {
            full_name: payload.full_name,
            age,
            gender: payload.gender.as_deref().map(Gender::parse).transpose()?,
            location: payload.location,
            role: payload.role.as_deref().map(UserRole::parse).transpose()?,
            bio: payload.bio,
            avatar: payload.avatar,
            images: payload.images,
            email: payload.email.map(UserEmail::parse).transpose()?,
            phone: payload.phone.map(PhoneNumber::parse).transpose()?,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
struct RatePayload {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    rating: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RateResponse {
    message: &'static str,
    average_rating: f64,
}

async fn create_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<ProfilePayload>,
) -> Result<Json<ProfileView>, ApiError> {
    let patch = ProfilePatch::try_from(payload)?;
    let profile = state.user_service.create_profile(user_id, patch).await?;
    Ok(Json(profile))
}

async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<ProfilePayload>,
) -> Result<Json<ProfileView>, ApiError> {
    let patch = ProfilePatch::try_from(payload)?;
    let profile = state.user_service.update_profile(user_id, patch).await?;
    Ok(Json(profile))
}

async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileView>, ApiError> {
    Ok(Json(state.user_service.get_profile(user_id).await?))
}

async fn account_details(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
) -> Json<AccountDetails> {
    Json(state.payment_service.account_details())
}

async fn nearby(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<UserCardView>>, ApiError> {
    Ok(Json(state.user_service.nearby(user_id).await?))
}

async fn get_user(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UserCardView>, ApiError> {
    let id: UserId = parse_id(&id)?;
    Ok(Json(state.user_service.get_user(id).await?))
}

async fn rate_user(
    State(state): State<AppState>,
    AuthUser(rater): AuthUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<RatePayload>,
) -> Result<Json<RateResponse>, ApiError> {
    validate_payload(&payload)?;
    let target: UserId = parse_id(&id)?;
    let value = u8::try_from(payload.rating)
        .map_err(|_| ApiError::bad_request("Rating must be between 1 and 5"))?;

    let average_rating = state.user_service.rate(rater, target, value).await?;
    Ok(Json(RateResponse {
        message: "Rating submitted successfully",
        average_rating,
    }))
}

async fn upload_media(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    multipart: Multipart,
) -> Result<Json<UploadedMedia>, ApiError> {
    let form = read_multipart(multipart).await?;
    let media = state.user_service.upload_media(user_id, form.files).await?;
    Ok(Json(media))
}
