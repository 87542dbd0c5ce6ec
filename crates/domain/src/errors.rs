//! 领域模型错误定义

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    #[error("user not found")]
    UserNotFound,

    #[error("post not found")]
    PostNotFound,

    #[error("chat not found")]
    ChatNotFound,

    #[error("payment not found")]
    PaymentNotFound,

    /// 帖子已被接受或已过期
    #[error("post is no longer active")]
    PostNotActive,

    #[error("payment has already been {status}")]
    PaymentAlreadyDecided { status: String },

    #[error("not a participant of this chat")]
    NotChatParticipant,

    #[error("operation not allowed")]
    OperationNotAllowed,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Phone number already registered")]
    PhoneTaken,

    #[error("federated identity already linked")]
    FederatedIdTaken,

    #[error("Invalid or missing payment")]
    PaymentInvalid,

    #[error("Payment verification pending")]
    PaymentPending,
}

impl DomainError {
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 持久层错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,

    /// 唯一约束冲突，`constraint` 为冲突的约束或字段名
    #[error("unique constraint violated: {constraint}")]
    Conflict { constraint: String },

    #[error("storage failure: {message}")]
    Storage { message: String },

    #[error("storage call timed out")]
    Timeout,
}

impl RepositoryError {
    pub fn conflict(constraint: impl Into<String>) -> Self {
        Self::Conflict {
            constraint: constraint.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
