use std::sync::Arc;
use std::time::Duration;

use application::{BlobStoreError, CredentialError};
use config::AppConfig;
use thiserror::Error;

use crate::{
    blob::LocalBlobStore,
    federated::GoogleTokenVerifier,
    migrations::MIGRATOR,
    password::BcryptPasswordHasher,
    repository::{create_pg_pool, PgStorage},
};

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("upload storage error: {0}")]
    Blob(#[from] BlobStoreError),
    #[error("identity provider error: {0}")]
    Credential(#[from] CredentialError),
}

/// 已连接并完成迁移的全部外部适配器。
#[derive(Clone)]
pub struct Infrastructure {
    pub storage: PgStorage,
    pub password_hasher: Arc<BcryptPasswordHasher>,
    pub blob_store: Arc<LocalBlobStore>,
    pub federated_verifier: Arc<GoogleTokenVerifier>,
}

impl Infrastructure {
    pub async fn connect(config: &AppConfig) -> Result<Self, InfrastructureError> {
        let pool = create_pg_pool(&config.database.url, config.database.max_connections).await?;
        MIGRATOR.run(&pool).await?;
        tracing::info!("数据库迁移完成");

        let storage = PgStorage::new(
            pool,
            Duration::from_millis(config.database.statement_timeout_ms),
        );
        let password_hasher = Arc::new(BcryptPasswordHasher::new(config.server.bcrypt_cost));
        let blob_store = Arc::new(
            LocalBlobStore::new(
                &config.storage.upload_dir,
                &config.storage.public_base_url,
                config.storage.max_upload_bytes,
            )
            .await?,
        );
        let federated_verifier = Arc::new(GoogleTokenVerifier::new(
            &config.federated.tokeninfo_url,
            config.federated.client_id.clone(),
        )?);
        if config.federated.client_id.is_none() {
            tracing::warn!("未配置第三方登录 client_id，第三方登录不可用");
        }

        Ok(Self {
            storage,
            password_hasher,
            blob_store,
            federated_verifier,
        })
    }
}
