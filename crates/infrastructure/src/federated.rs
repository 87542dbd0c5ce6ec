//! Google ID token 校验，调用 tokeninfo 接口并检查受众。

use std::time::Duration;

use application::{CredentialError, FederatedIdentity, FederatedIdentityVerifier};
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    #[serde(default)]
    email: Option<String>,
    /// tokeninfo 以字符串形式返回布尔值
    #[serde(default)]
    email_verified: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GoogleTokenVerifier {
    client: reqwest::Client,
    tokeninfo_url: String,
    client_id: Option<String>,
}

impl GoogleTokenVerifier {
    pub fn new(
        tokeninfo_url: impl Into<String>,
        client_id: Option<String>,
    ) -> Result<Self, CredentialError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| CredentialError::Unavailable(err.to_string()))?;
        Ok(Self {
            client,
            tokeninfo_url: tokeninfo_url.into(),
            client_id,
        })
    }
}

#[async_trait]
impl FederatedIdentityVerifier for GoogleTokenVerifier {
    async fn verify(&self, credential: &str) -> Result<FederatedIdentity, CredentialError> {
        let Some(client_id) = self.client_id.as_deref() else {
            return Err(CredentialError::Unavailable(
                "federated login is not configured".to_string(),
            ));
        };

        let response = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", credential)])
            .send()
            .await
            .map_err(|err| CredentialError::Unavailable(err.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(CredentialError::Rejected(format!("tokeninfo returned {status}")));
        }
        if !status.is_success() {
            return Err(CredentialError::Unavailable(format!(
                "tokeninfo returned {status}"
            )));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|err| CredentialError::Rejected(format!("malformed tokeninfo: {err}")))?;

        if info.aud != client_id {
            tracing::warn!(aud = %info.aud, "ID token 受众不匹配");
            return Err(CredentialError::Rejected("audience mismatch".to_string()));
        }

        // 未验证的邮箱不能用于关联已有账号
        let email = match info.email_verified.as_deref() {
            Some("true") => info.email,
            _ => None,
        };

        Ok(FederatedIdentity {
            subject: info.sub,
            email,
            name: info.name,
            picture: info.picture,
        })
    }
}
