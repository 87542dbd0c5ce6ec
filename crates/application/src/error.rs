use domain::{DomainError, RepositoryError};
use serde::Serialize;
use thiserror::Error;

use crate::blob::BlobStoreError;
use crate::identity::CredentialError;

/// 超出免费额度时返回给客户端的收款信息。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInstructions {
    pub bank: String,
    pub account_number: String,
    pub account_name: String,
    pub reference: String,
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(RepositoryError),
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
    #[error("blob store error: {0}")]
    Blob(#[from] BlobStoreError),
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
    #[error("authentication failed")]
    Authentication,
    #[error("authorization failed")]
    Authorization,
    #[error("You can only accept up to 5 requests. Pay to unlock more.")]
    PaymentRequired(PaymentInstructions),
}

impl ApplicationError {
    pub fn infrastructure(message: impl Into<String>) -> Self {
        ApplicationError::Infrastructure(message.into())
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Repository(value)
    }
}
