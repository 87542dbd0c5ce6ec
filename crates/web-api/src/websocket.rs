//! 推送通道
//!
//! 客户端通过 `/ws?token=...` 建立 WebSocket 连接。连接建立后登记到
//! 在线状态表，服务端事件以 `{"event": ..., "data": {...}}` 文本帧推送；
//! 连接断开时从在线状态表移除。

use application::{ConnectOutcome, ConnectionHandle, PushEvent};
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// 升级前先校验 token，失败直接返回 401。
pub async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = query
        .token
        .ok_or_else(|| ApiError::unauthorized("No token provided"))?;
    let claims = state.jwt_service.verify_token(&token)?;

    Ok(ws.on_upgrade(move |socket| run_connection(socket, state, claims.sub)))
}

async fn run_connection(socket: WebSocket, state: AppState, raw_user_id: String) {
    let (handle, events) = ConnectionHandle::channel();
    let connection_id = handle.id();

    match state.presence.connect_raw(&raw_user_id, handle).await {
        ConnectOutcome::Ignored => {
            tracing::warn!(raw_user_id, "token 中的用户ID无效，关闭连接");
            return;
        }
        ConnectOutcome::Online(user_id) | ConnectOutcome::Replaced(user_id) => {
            tracing::info!(user_id = %user_id, connection_id = %connection_id, "WebSocket 连接已建立");
        }
    }

    pump(socket, events).await;

    if let Some(user_id) = state.presence.disconnect(connection_id).await {
        tracing::info!(user_id = %user_id, connection_id = %connection_id, "WebSocket 连接已关闭");
    } else {
        tracing::debug!(connection_id = %connection_id, "旧连接关闭，已被新连接替换");
    }
}

/// 在连接存活期间转发推送事件，任一方向结束即返回。
async fn pump(socket: WebSocket, mut events: mpsc::UnboundedReceiver<PushEvent>) {
    let (mut sender, mut incoming) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    tracing::warn!(error = %err, event = event.name(), "推送事件序列化失败");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                tracing::debug!("WebSocket 发送失败，结束发送任务");
                break;
            }
        }
        // 连接被替换后发送端已丢弃，主动关闭旧连接
        let _ = sender.send(WsMessage::Close(None)).await;
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = incoming.next().await {
            if matches!(message, WsMessage::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!("WebSocket 发送任务结束");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            tracing::debug!("WebSocket 接收任务结束");
            send_task.abort();
        }
    }
}
