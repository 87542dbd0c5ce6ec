//! 社交平台核心领域模型
//!
//! 包含用户、帖子、私聊会话、付款凭证等实体，以及相关的业务规则。

pub mod chat;
pub mod errors;
pub mod payment;
pub mod post;
pub mod user;
pub mod value_objects;

// 重新导出常用类型
pub use chat::{seed_text, Chat, ChatMessage, ParticipantPair, CHAT_STARTED};
pub use errors::{DomainError, DomainResult, RepositoryError};
pub use payment::{
    acceptance_reference, payment_reference, NewPayment, Payment, PaymentPurpose, PaymentStatus,
};
pub use post::{Acceptance, NewPost, Post, PostStatus, PostType};
pub use user::{Gender, Profile, ProfilePatch, PublicProfile, Rating, RatingEntry, User, UserRole};
pub use value_objects::{
    ChatId, MessageId, MessageText, PasswordHash, PaymentId, PhoneNumber, PostContent, PostId,
    Timestamp, UserEmail, UserId,
};
