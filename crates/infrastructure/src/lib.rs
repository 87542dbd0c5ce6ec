//! 基础设施层实现。
//!
//! 提供 PostgreSQL 仓储、密码哈希、本地文件存储和第三方身份校验等适配器，
//! 实现应用层定义的接口。

pub mod blob;
pub mod builder;
pub mod federated;
pub mod migrations;
pub mod password;
pub mod repository;

pub use blob::LocalBlobStore;
pub use builder::{Infrastructure, InfrastructureError};
pub use federated::GoogleTokenVerifier;
pub use migrations::MIGRATOR;
pub use password::BcryptPasswordHasher;
pub use repository::{
    create_pg_pool, PgChatRepository, PgPaymentRepository, PgPostRepository, PgStorage,
    PgUserRepository,
};
