//! PostgreSQL 仓储实现。
//!
//! 每次数据库调用都带有超时；唯一约束冲突翻译为 `RepositoryError::Conflict`，
//! 其余错误统一为 `RepositoryError::Storage`。

mod chat;
mod payment;
mod post;
mod user;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use domain::RepositoryError;
use sqlx::{postgres::PgPoolOptions, PgPool};

pub use chat::PgChatRepository;
pub use payment::PgPaymentRepository;
pub use post::PgPostRepository;
pub use user::PgUserRepository;

pub(crate) fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::PoolTimedOut => RepositoryError::Timeout,
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::conflict(db.constraint().unwrap_or("unique"))
        }
        _ => RepositoryError::storage(err.to_string()),
    }
}

pub(crate) fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

/// 连接池加上单次调用的超时。
#[derive(Clone)]
pub(crate) struct Db {
    pub(crate) pool: PgPool,
    timeout: Duration,
}

impl Db {
    pub(crate) fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub(crate) async fn run<T, F>(&self, fut: F) -> Result<T, RepositoryError>
    where
        F: Future<Output = Result<T, RepositoryError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "数据库调用超时");
                Err(RepositoryError::Timeout)
            }
        }
    }
}

#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
    pub user_repository: Arc<PgUserRepository>,
    pub post_repository: Arc<PgPostRepository>,
    pub chat_repository: Arc<PgChatRepository>,
    pub payment_repository: Arc<PgPaymentRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        let db = Db::new(pool.clone(), statement_timeout);
        Self {
            user_repository: Arc::new(PgUserRepository::new(db.clone())),
            post_repository: Arc::new(PgPostRepository::new(db.clone())),
            chat_repository: Arc::new(PgChatRepository::new(db.clone())),
            payment_repository: Arc::new(PgPaymentRepository::new(db)),
            pool,
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
