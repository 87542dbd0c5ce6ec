//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务，处理输入校验、事务边界、
//! 以及对外部适配器（例如密码哈希、文件存储、推送投递）的抽象。

pub mod blob;
pub mod clock;
pub mod dto;
pub mod error;
pub mod identity;
pub mod memory;
pub mod notifier;
pub mod presence;
pub mod repository;
pub mod services;

pub use blob::{validate_image, BlobStore, BlobStoreError, ImageFormat, ImageUpload, UploadedFile};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ApplicationError, PaymentInstructions};
pub use identity::{CredentialError, FederatedIdentity, FederatedIdentityVerifier, PasswordHasher};
pub use memory::MemoryStore;
pub use notifier::{NotificationDispatcher, Outbox, PushEvent};
pub use presence::{ConnectOutcome, ConnectionHandle, PresenceTracker};
pub use repository::{
    ChatRepository, PaymentRepository, PostRepository, RecordedAcceptance, UserRepository,
};
pub use services::{
    AuthService, AuthServiceDependencies, ChatService, ChatServiceDependencies, PaymentService,
    PaymentServiceDependencies, PostService, PostServiceDependencies, UserService,
    UserServiceDependencies,
};
