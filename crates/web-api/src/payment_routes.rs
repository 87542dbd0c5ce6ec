use axum::{
    extract::{Multipart, Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;

use application::{dto::PaymentView, services::SubmitProofRequest};
use domain::{DomainError, PaymentId, PaymentPurpose, PostId};

use crate::{
    auth::AuthUser,
    error::ApiError,
    extract::parse_id,
    routes::with_upload_limit,
    state::AppState,
    upload::read_multipart,
};

pub const PROOF_FIELD: &str = "proof";

pub fn payment_routes(upload_body_limit: usize) -> Router<AppState> {
    let uploads = with_upload_limit(
        Router::new().route("/upload", post(upload_proof)),
        upload_body_limit,
    );

    Router::new()
        .route("/pending", get(list_pending))
        .route("/{id}/verify", put(verify_payment))
        .route("/{id}/reject", put(reject_payment))
        .merge(uploads)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadProofResponse {
    message: &'static str,
    payment_id: PaymentId,
    payment: PaymentView,
}

#[derive(Debug, Serialize)]
struct DecisionResponse {
    message: &'static str,
    payment: PaymentView,
}

async fn upload_proof(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    multipart: Multipart,
) -> Result<Json<UploadProofResponse>, ApiError> {
    let mut form = read_multipart(multipart).await?;

    let proof = form
        .take_file(PROOF_FIELD)
        .ok_or_else(|| ApiError::bad_request("No payment proof uploaded").with_details(PROOF_FIELD))?;
    let purpose = form
        .field("purpose")
        .ok_or_else(|| DomainError::invalid_argument("purpose", "is required"))
        .and_then(PaymentPurpose::parse)?;
    let post_id = form.field("postId").map(parse_id::<PostId>).transpose()?;
    let amount = form
        .field("amount")
        .ok_or_else(|| DomainError::invalid_argument("amount", "is required"))?
        .trim()
        .parse::<f64>()
        .map_err(|_| DomainError::invalid_argument("amount", "must be a number"))?;

    let payment = state
        .payment_service
        .submit_proof(SubmitProofRequest {
            owner,
            purpose,
            post_id,
            amount,
            proof,
        })
        .await?;

    Ok(Json(UploadProofResponse {
        message: "Payment proof uploaded, pending verification",
        payment_id: payment.id,
        payment,
    }))
}

async fn list_pending(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<Vec<PaymentView>>, ApiError> {
    Ok(Json(state.payment_service.list_pending(actor).await?))
}

async fn verify_payment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let id: PaymentId = parse_id(&id)?;
    let payment = state.payment_service.verify(actor, id).await?;
    Ok(Json(DecisionResponse {
        message: "Payment verified successfully",
        payment,
    }))
}

async fn reject_payment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let id: PaymentId = parse_id(&id)?;
    let payment = state.payment_service.reject(actor, id).await?;
    Ok(Json(DecisionResponse {
        message: "Payment rejected",
        payment,
    }))
}
