use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{PostContent, PostId, Timestamp, UserId};

/// 帖子类型，决定展示时长。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostType {
    #[serde(rename = "quick")]
    Quick,
    #[serde(rename = "extended-7")]
    Extended7,
    #[serde(rename = "extended-30")]
    Extended30,
}

impl PostType {
    pub fn duration_days(&self) -> u32 {
        match self {
            PostType::Quick => 1,
            PostType::Extended7 => 7,
            PostType::Extended30 => 30,
        }
    }

    /// 从 `now` 起算的到期时间。
    pub fn expires_at(&self, now: Timestamp) -> Timestamp {
        now + Duration::days(i64::from(self.duration_days()))
    }

    pub fn from_duration_days(days: u32) -> Result<Self, DomainError> {
        match days {
            1 => Ok(PostType::Quick),
            7 => Ok(PostType::Extended7),
            30 => Ok(PostType::Extended30),
            _ => Err(DomainError::invalid_argument(
                "duration",
                "must be one of 1, 7 or 30 days",
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Quick => "quick",
            PostType::Extended7 => "extended-7",
            PostType::Extended30 => "extended-30",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "quick" => Ok(PostType::Quick),
            "extended-7" => Ok(PostType::Extended7),
            "extended-30" => Ok(PostType::Extended30),
            _ => Err(DomainError::invalid_argument("postType", "unknown post type")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Active,
    Accepted,
    Expired,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Active => "active",
            PostStatus::Accepted => "accepted",
            PostStatus::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "active" => Ok(PostStatus::Active),
            "accepted" => Ok(PostStatus::Accepted),
            "expired" => Ok(PostStatus::Expired),
            _ => Err(DomainError::invalid_argument("status", "unknown post status")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acceptance {
    pub user_id: UserId,
    pub accepted_at: Timestamp,
}

/// 创建帖子所需的输入。
#[derive(Debug, Clone)]
pub struct NewPost {
    pub owner_id: UserId,
    pub content: PostContent,
    pub sponsored: bool,
    pub post_type: PostType,
    pub image_url: Option<String>,
    pub payment_proof_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub owner_id: UserId,
    pub content: PostContent,
    pub sponsored: bool,
    pub image_url: Option<String>,
    pub payment_proof_url: Option<String>,
    pub post_type: PostType,
    pub duration_days: u32,
    pub expires_at: Timestamp,
    pub status: PostStatus,
    pub acceptances: Vec<Acceptance>,
    pub created_at: Timestamp,
}

impl Post {
    pub fn new(id: PostId, input: NewPost, now: Timestamp) -> Self {
        let duration_days = input.post_type.duration_days();
        Self {
            id,
            owner_id: input.owner_id,
            content: input.content,
            sponsored: input.sponsored,
            image_url: input.image_url,
            payment_proof_url: input.payment_proof_url,
            post_type: input.post_type,
            duration_days,
            expires_at: input.post_type.expires_at(now),
            status: PostStatus::Active,
            acceptances: Vec::new(),
            created_at: now,
        }
    }

    /// 处于 active 且尚未到期。
    pub fn is_open(&self, now: Timestamp) -> bool {
        self.status == PostStatus::Active && self.expires_at > now
    }

    pub fn ensure_open(&self, now: Timestamp) -> Result<(), DomainError> {
        if self.is_open(now) {
            Ok(())
        } else {
            Err(DomainError::PostNotActive)
        }
    }

    pub fn has_accepted(&self, user_id: UserId) -> bool {
        self.acceptances.iter().any(|a| a.user_id == user_id)
    }

    /// 幂等记录接受。返回是否新增了记录。
    ///
    /// 只要存在非发帖人的接受记录，帖子就转为 accepted。
    pub fn record_acceptance(&mut self, user_id: UserId, now: Timestamp) -> bool {
        let inserted = if self.has_accepted(user_id) {
            false
        } else {
            self.acceptances.push(Acceptance {
                user_id,
                accepted_at: now,
            });
            true
        };
        if self.status == PostStatus::Active
            && self.acceptances.iter().any(|a| a.user_id != self.owner_id)
        {
            self.status = PostStatus::Accepted;
        }
        inserted
    }

    /// 延长展示时间，从当前时刻重新计算到期时间。
    pub fn extend(
        &mut self,
        actor: UserId,
        post_type: PostType,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        if actor != self.owner_id {
            return Err(DomainError::OperationNotAllowed);
        }
        self.ensure_open(now)?;
        self.post_type = post_type;
        self.duration_days = post_type.duration_days();
        self.expires_at = post_type.expires_at(now);
        Ok(())
    }

    pub fn is_due(&self, now: Timestamp) -> bool {
        self.status == PostStatus::Active && self.expires_at <= now
    }

    pub fn expire(&mut self, now: Timestamp) -> bool {
        if self.is_due(now) {
            self.status = PostStatus::Expired;
            true
        } else {
            false
        }
    }
}
