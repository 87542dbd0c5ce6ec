//! 凭证校验相关的外部适配器抽象：密码哈希与第三方身份。

use async_trait::async_trait;
use domain::PasswordHash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    Hashing(String),
    /// 第三方凭证无效（签名、受众或过期）
    #[error("credential rejected: {0}")]
    Rejected(String),
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, CredentialError>;
    async fn verify(&self, plaintext: &str, hashed: &PasswordHash)
        -> Result<bool, CredentialError>;
}

/// 第三方身份提供方校验后的声明。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[async_trait]
pub trait FederatedIdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<FederatedIdentity, CredentialError>;
}
