use application::{CredentialError, PasswordHasher};
use async_trait::async_trait;
use bcrypt::{hash, verify, DEFAULT_COST};
use domain::PasswordHash;

/// bcrypt 哈希，计算放在阻塞线程池中执行。
#[derive(Clone)]
pub struct BcryptPasswordHasher {
    cost: u32,
}

impl BcryptPasswordHasher {
    pub fn new(cost: Option<u32>) -> Self {
        Self {
            cost: cost.unwrap_or(DEFAULT_COST),
        }
    }
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl PasswordHasher for BcryptPasswordHasher {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, CredentialError> {
        let cost = self.cost;
        let plaintext = plaintext.to_owned();
        let hashed = tokio::task::spawn_blocking(move || hash(plaintext, cost))
            .await
            .map_err(|err| CredentialError::Hashing(err.to_string()))?
            .map_err(|err| CredentialError::Hashing(err.to_string()))?;

        PasswordHash::new(hashed).map_err(|err| CredentialError::Hashing(err.to_string()))
    }

    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, CredentialError> {
        let plaintext = plaintext.to_owned();
        let hashed = hashed.as_str().to_owned();
        let outcome = tokio::task::spawn_blocking(move || verify(plaintext, &hashed))
            .await
            .map_err(|err| CredentialError::Hashing(err.to_string()))?;
        match outcome {
            Ok(valid) => Ok(valid),
            // 存储的哈希格式损坏时按校验失败处理
            Err(err) => {
                tracing::warn!(error = %err, "无法解析存储的密码哈希");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hasher = BcryptPasswordHasher::new(Some(4));
        let hashed = hasher.hash("hunter22").await.unwrap();
        assert_ne!(hashed.as_str(), "hunter22");
        assert!(hasher.verify("hunter22", &hashed).await.unwrap());
        assert!(!hasher.verify("hunter23", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_hash_does_not_verify() {
        let hasher = BcryptPasswordHasher::new(Some(4));
        let bogus = PasswordHash::new("not-a-bcrypt-hash").unwrap();
        assert!(!hasher.verify("anything", &bogus).await.unwrap());
    }
}
