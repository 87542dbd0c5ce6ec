use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{PaymentId, PostId, Timestamp, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    PostCreation,
    PostExtension,
    UnlockAcceptances,
}

impl PaymentPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPurpose::PostCreation => "post_creation",
            PaymentPurpose::PostExtension => "post_extension",
            PaymentPurpose::UnlockAcceptances => "unlock_acceptances",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "post_creation" => Ok(PaymentPurpose::PostCreation),
            "post_extension" => Ok(PaymentPurpose::PostExtension),
            "unlock_acceptances" => Ok(PaymentPurpose::UnlockAcceptances),
            _ => Err(DomainError::invalid_argument("purpose", "unknown payment purpose")),
        }
    }

    pub fn requires_post(&self) -> bool {
        matches!(
            self,
            PaymentPurpose::PostCreation | PaymentPurpose::PostExtension
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Verified,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Verified => "verified",
            PaymentStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "pending" => Ok(PaymentStatus::Pending),
            "verified" => Ok(PaymentStatus::Verified),
            "rejected" => Ok(PaymentStatus::Rejected),
            _ => Err(DomainError::invalid_argument("status", "unknown payment status")),
        }
    }
}

/// 付款参考号：`PAY-<毫秒时间戳>`。
pub fn payment_reference(now: Timestamp) -> String {
    format!("PAY-{}", now.timestamp_millis())
}

/// 要求付费解锁时返回给客户端的参考号。
pub fn acceptance_reference(now: Timestamp) -> String {
    format!("ACCEPT-{}", now.timestamp_millis())
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub owner_id: UserId,
    pub post_id: Option<PostId>,
    pub purpose: PaymentPurpose,
    pub amount: f64,
    pub proof_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub owner_id: UserId,
    pub post_id: Option<PostId>,
    pub purpose: PaymentPurpose,
    pub proof_url: String,
    pub status: PaymentStatus,
    pub amount: f64,
    pub reference: String,
    pub created_at: Timestamp,
}

impl Payment {
    pub fn submit(id: PaymentId, input: NewPayment, now: Timestamp) -> Result<Self, DomainError> {
        if input.purpose.requires_post() && input.post_id.is_none() {
            return Err(DomainError::invalid_argument(
                "postId",
                "required for post payments",
            ));
        }
        if !input.amount.is_finite() || input.amount <= 0.0 {
            return Err(DomainError::invalid_argument("amount", "must be positive"));
        }
        if input.proof_url.trim().is_empty() {
            return Err(DomainError::invalid_argument("proof", "cannot be empty"));
        }
        Ok(Self {
            id,
            owner_id: input.owner_id,
            post_id: input.post_id,
            purpose: input.purpose,
            proof_url: input.proof_url,
            status: PaymentStatus::Pending,
            amount: input.amount,
            reference: payment_reference(now),
            created_at: now,
        })
    }

    fn decide(&mut self, status: PaymentStatus) -> Result<(), DomainError> {
        if self.status != PaymentStatus::Pending {
            return Err(DomainError::PaymentAlreadyDecided {
                status: self.status.as_str().to_owned(),
            });
        }
        self.status = status;
        Ok(())
    }

    pub fn verify(&mut self) -> Result<(), DomainError> {
        self.decide(PaymentStatus::Verified)
    }

    pub fn reject(&mut self) -> Result<(), DomainError> {
        self.decide(PaymentStatus::Rejected)
    }

    /// 检查该付款能否为 `user` 解锁额外的接受名额。
    pub fn check_unlocks_acceptances(&self, user: UserId) -> Result<(), DomainError> {
        if self.owner_id != user || self.purpose != PaymentPurpose::UnlockAcceptances {
            return Err(DomainError::PaymentInvalid);
        }
        match self.status {
            PaymentStatus::Verified => Ok(()),
            PaymentStatus::Pending => Err(DomainError::PaymentPending),
            PaymentStatus::Rejected => Err(DomainError::PaymentInvalid),
        }
    }
}
