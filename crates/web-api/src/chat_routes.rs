use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use application::{
    dto::{ChatMessagesView, ChatView, MessageView},
    services::{SendMessageRequest, StartChatRequest},
};
use domain::{ChatId, PostId, UserId};

use crate::{
    auth::AuthUser,
    error::ApiError,
    extract::{parse_id, ApiJson},
    state::AppState,
};

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_chats).post(start_chat))
        .route("/{id}", get(get_chat))
        .route("/{id}/messages", get(get_messages).post(send_message))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartChatPayload {
    #[serde(alias = "recipientId")]
    recipient: String,
    post_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendMessagePayload {
    #[serde(default)]
    text: String,
}

async fn start_chat(
    State(state): State<AppState>,
    AuthUser(initiator): AuthUser,
    ApiJson(payload): ApiJson<StartChatPayload>,
) -> Result<Json<ChatView>, ApiError> {
    let recipient: UserId = parse_id(&payload.recipient)?;
    let post_id = payload
        .post_id
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(parse_id::<PostId>)
        .transpose()?;

    let chat = state
        .chat_service
        .start_or_get_chat(StartChatRequest {
            initiator,
            recipient,
            post_id,
        })
        .await?;
    Ok(Json(chat))
}

async fn list_chats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<ChatView>>, ApiError> {
    Ok(Json(state.chat_service.list_chats(user).await?))
}

async fn get_chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ChatView>, ApiError> {
    let chat_id: ChatId = parse_id(&id)?;
    Ok(Json(state.chat_service.get_chat(chat_id, user).await?))
}

async fn get_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ChatMessagesView>, ApiError> {
    let chat_id: ChatId = parse_id(&id)?;
    Ok(Json(state.chat_service.get_messages(chat_id, user).await?))
}

async fn send_message(
    State(state): State<AppState>,
    AuthUser(sender): AuthUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<SendMessagePayload>,
) -> Result<Json<MessageView>, ApiError> {
    let chat_id: ChatId = parse_id(&id)?;
    let message = state
        .chat_service
        .send_message(SendMessageRequest {
            chat_id,
            sender,
            text: payload.text,
        })
        .await?;
    Ok(Json(message))
}
