//! 服务返回给接口层的视图对象，字段名与客户端约定一致。

use domain::{
    Acceptance, Chat, ChatId, ChatMessage, Payment, PaymentId, PaymentPurpose, PaymentStatus,
    Post, PostId, PostStatus, PostType, PublicProfile, Timestamp, User, UserId,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub text: String,
    pub is_sent: bool,
    pub created_at: Timestamp,
}

impl MessageView {
    /// `is_sent` 以 `viewer` 的视角计算。
    pub fn for_viewer(message: &ChatMessage, viewer: UserId) -> Self {
        Self {
            text: message.text.as_str().to_owned(),
            is_sent: message.sender == viewer,
            created_at: message.created_at,
        }
    }
}

/// 会话摘要，`recipient` 为查看者的对方。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    #[serde(rename = "_id")]
    pub id: ChatId,
    pub recipient: PublicProfile,
    pub last_message: String,
    pub updated_at: Timestamp,
    pub post_id: Option<PostId>,
}

impl ChatView {
    pub fn new(chat: &Chat, recipient: PublicProfile) -> Self {
        Self {
            id: chat.id,
            recipient,
            last_message: chat.last_message.clone(),
            updated_at: chat.updated_at,
            post_id: chat.post_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagesView {
    pub messages: Vec<MessageView>,
    pub recipient: PublicProfile,
    pub post_id: Option<PostId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostOwnerView {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptanceView {
    pub user: UserId,
    pub accepted_at: Timestamp,
}

impl From<&Acceptance> for AcceptanceView {
    fn from(value: &Acceptance) -> Self {
        Self {
            user: value.user_id,
            accepted_at: value.accepted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(rename = "_id")]
    pub id: PostId,
    pub user: PostOwnerView,
    pub content: String,
    pub sponsored: bool,
    pub post_type: PostType,
    pub duration: u32,
    pub expire_at: Timestamp,
    pub payment_proof: Option<String>,
    pub image: Option<String>,
    pub status: PostStatus,
    pub acceptances: Vec<AcceptanceView>,
    pub created_at: Timestamp,
}

impl PostView {
    /// 发帖人已不存在时只保留 id。
    pub fn new(post: &Post, owner: Option<&User>) -> Self {
        Self {
            id: post.id,
            user: PostOwnerView {
                id: post.owner_id,
                full_name: owner.and_then(|u| u.profile.full_name.clone()),
                avatar: owner.and_then(|u| u.profile.avatar.clone()),
            },
            content: post.content.as_str().to_owned(),
            sponsored: post.sponsored,
            post_type: post.post_type,
            duration: post.duration_days,
            expire_at: post.expires_at,
            payment_proof: post.payment_proof_url.clone(),
            image: post.image_url.clone(),
            status: post.status,
            acceptances: post.acceptances.iter().map(AcceptanceView::from).collect(),
            created_at: post.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptanceOutcome {
    pub post: PostView,
    pub chat_id: ChatId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    #[serde(rename = "_id")]
    pub id: PaymentId,
    pub user: UserId,
    pub post: Option<PostId>,
    pub purpose: PaymentPurpose,
    pub proof_path: String,
    pub status: PaymentStatus,
    pub amount: f64,
    pub reference: String,
    pub created_at: Timestamp,
}

impl From<&Payment> for PaymentView {
    fn from(value: &Payment) -> Self {
        Self {
            id: value.id,
            user: value.owner_id,
            post: value.post_id,
            purpose: value.purpose,
            proof_path: value.proof_url.clone(),
            status: value.status,
            amount: value.amount,
            reference: value.reference.clone(),
            created_at: value.created_at,
        }
    }
}

/// 完整资料，只返回给本人。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub age: Option<u8>,
    pub gender: Option<domain::Gender>,
    pub location: Option<String>,
    pub role: Option<domain::UserRole>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub images: Vec<String>,
    pub verified: bool,
    pub is_online: bool,
    pub is_admin: bool,
    pub connections: usize,
    pub rating: f64,
    pub rating_count: u32,
    pub created_at: Timestamp,
}

impl From<&User> for ProfileView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.as_ref().map(|e| e.as_str().to_owned()),
            phone: user.phone.as_ref().map(|p| p.as_str().to_owned()),
            full_name: user.profile.full_name.clone(),
            age: user.profile.age,
            gender: user.profile.gender,
            location: user.profile.location.clone(),
            role: user.profile.role,
            bio: user.profile.bio.clone(),
            avatar: user.profile.avatar.clone(),
            images: user.profile.images.clone(),
            verified: user.verified,
            is_online: user.is_online,
            is_admin: user.is_admin,
            connections: user.connections.len(),
            rating: user.rating.average,
            rating_count: user.rating.count,
            created_at: user.created_at,
        }
    }
}

/// 他人可见的资料，不含联系方式。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCardView {
    pub id: UserId,
    pub name: Option<String>,
    pub age: Option<u8>,
    pub gender: Option<domain::Gender>,
    pub location: Option<String>,
    pub role: Option<domain::UserRole>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub images: Vec<String>,
    pub is_online: bool,
    pub joined: String,
    pub connections: usize,
    pub rating: f64,
}

impl From<&User> for UserCardView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.profile.full_name.clone(),
            age: user.profile.age,
            gender: user.profile.gender,
            location: user.profile.location.clone(),
            role: user.profile.role,
            bio: user.profile.bio.clone(),
            avatar: user.profile.avatar.clone(),
            images: user.profile.images.clone(),
            is_online: user.is_online,
            joined: user.created_at.format("%Y-%m-%d").to_string(),
            connections: user.connections.len(),
            rating: user.rating.average,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedMedia {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub image_urls: Vec<String>,
}
