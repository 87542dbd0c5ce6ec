//! 推送事件与投递。
//!
//! 服务在写操作过程中把事件暂存到 [`Outbox`]，写入提交后再交给
//! [`NotificationDispatcher`] 投递。投递是尽力而为的，失败只记录日志。

use std::sync::Arc;

use domain::{ChatId, PostId, PublicProfile, Timestamp, UserId};
use serde::Serialize;

use crate::dto::MessageView;
use crate::presence::PresenceTracker;

/// 推送给客户端的事件，序列化为 `{"event": ..., "data": {...}}`。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum PushEvent {
    UserStatusUpdate(UserStatusPayload),
    NewChat(NewChatPayload),
    NewMessage(NewMessagePayload),
    PostAccepted(PostAcceptedPayload),
}

impl PushEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::UserStatusUpdate(_) => "user-status-update",
            PushEvent::NewChat(_) => "new-chat",
            PushEvent::NewMessage(_) => "new-message",
            PushEvent::PostAccepted(_) => "post-accepted",
        }
    }

    pub fn status(user_id: UserId, is_online: bool) -> Self {
        PushEvent::UserStatusUpdate(UserStatusPayload { user_id, is_online })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusPayload {
    pub user_id: UserId,
    pub is_online: bool,
}

/// `user` 是接收方看到的对方。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChatPayload {
    #[serde(rename = "_id")]
    pub id: ChatId,
    pub user: PublicProfile,
    pub last_message: String,
    pub updated_at: Timestamp,
    pub post_id: Option<PostId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessagePayload {
    pub chat_id: ChatId,
    pub message: MessageView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAcceptedPayload {
    pub post_id: PostId,
}

#[derive(Debug, Clone, PartialEq)]
enum Delivery {
    User(UserId, PushEvent),
    Everyone(PushEvent),
}

/// 待提交后投递的事件。
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<Delivery>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_user(&mut self, user: UserId, event: PushEvent) {
        self.pending.push(Delivery::User(user, event));
    }

    pub fn to_everyone(&mut self, event: PushEvent) {
        self.pending.push(Delivery::Everyone(event));
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    presence: Arc<PresenceTracker>,
}

impl NotificationDispatcher {
    pub fn new(presence: Arc<PresenceTracker>) -> Self {
        Self { presence }
    }

    /// 用户不在线或连接已关闭时返回 `false`。
    pub async fn emit_to_user(&self, user: UserId, event: &PushEvent) -> bool {
        match self.presence.lookup(user).await {
            Some(handle) => {
                let delivered = handle.send(event.clone());
                if !delivered {
                    tracing::debug!(user_id = %user, event = event.name(), "推送失败，连接已关闭");
                }
                delivered
            }
            None => {
                tracing::debug!(user_id = %user, event = event.name(), "用户不在线，跳过推送");
                false
            }
        }
    }

    /// 发给所有在线连接，返回成功投递的数量。
    pub async fn broadcast(&self, event: &PushEvent) -> usize {
        self.presence.broadcast(event).await
    }

    pub async fn flush(&self, outbox: Outbox) {
        for delivery in outbox.pending {
            match delivery {
                Delivery::User(user, event) => {
                    self.emit_to_user(user, &event).await;
                }
                Delivery::Everyone(event) => {
                    self.broadcast(&event).await;
                }
            }
        }
    }
}
