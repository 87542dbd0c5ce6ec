use std::sync::Arc;

use domain::{DomainError, PhoneNumber, User, UserEmail, UserId};

use crate::{
    clock::Clock,
    error::ApplicationError,
    identity::{CredentialError, FederatedIdentityVerifier, PasswordHasher},
    repository::UserRepository,
    services::user_service::map_user_conflict,
};

const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub email: String,
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    /// 邮箱或手机号
    pub identifier: String,
    pub password: String,
}

/// 登录成功后的结果，`is_new_user` 表示资料尚未完善。
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub is_new_user: bool,
}

pub struct AuthServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub federated_verifier: Arc<dyn FederatedIdentityVerifier>,
    pub clock: Arc<dyn Clock>,
}

pub struct AuthService {
    deps: AuthServiceDependencies,
}

impl AuthService {
    pub fn new(deps: AuthServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn signup(&self, request: SignupRequest) -> Result<AuthenticatedUser, ApplicationError> {
        if request.email.trim().is_empty()
            || request.phone.trim().is_empty()
            || request.password.is_empty()
        {
            return Err(DomainError::invalid_argument(
                "credentials",
                "Email, phone, and password are required",
            )
            .into());
        }
        if request.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(DomainError::invalid_argument(
                "password",
                "must be at least 6 characters",
            )
            .into());
        }

        let email = UserEmail::parse(request.email)?;
        let phone = PhoneNumber::parse(request.phone)?;

        if self.deps.user_repository.find_by_email(&email).await?.is_some() {
            return Err(DomainError::EmailTaken.into());
        }
        if self.deps.user_repository.find_by_phone(&phone).await?.is_some() {
            return Err(DomainError::PhoneTaken.into());
        }

        let password = self.deps.password_hasher.hash(&request.password).await?;
        let user = User::signup(UserId::generate(), email, phone, password, self.deps.clock.now());
        let user = self
            .deps
            .user_repository
            .create(user)
            .await
            .map_err(map_user_conflict)?;

        tracing::info!(user_id = %user.id, "新用户注册");
        Ok(AuthenticatedUser {
            user,
            is_new_user: true,
        })
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, ApplicationError> {
        if let Ok(email) = UserEmail::parse(identifier) {
            if let Some(user) = self.deps.user_repository.find_by_email(&email).await? {
                return Ok(Some(user));
            }
        }
        match PhoneNumber::parse(identifier) {
            Ok(phone) => Ok(self.deps.user_repository.find_by_phone(&phone).await?),
            Err(_) => Ok(None),
        }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthenticatedUser, ApplicationError> {
        if request.identifier.trim().is_empty() || request.password.is_empty() {
            return Err(DomainError::invalid_argument(
                "credentials",
                "Email and password are required",
            )
            .into());
        }

        let user = self
            .find_by_identifier(&request.identifier)
            .await?
            .ok_or(ApplicationError::Authentication)?;
        let hash = user
            .password
            .as_ref()
            .ok_or(ApplicationError::Authentication)?;

        let valid = self
            .deps
            .password_hasher
            .verify(&request.password, hash)
            .await?;
        if !valid {
            tracing::debug!(user_id = %user.id, "密码错误");
            return Err(ApplicationError::Authentication);
        }

        tracing::info!(user_id = %user.id, "用户登录");
        Ok(AuthenticatedUser {
            user,
            is_new_user: false,
        })
    }

    /// 第三方登录：按第三方 id 或邮箱查找，找到则关联，否则新建。
    pub async fn federated(&self, credential: &str) -> Result<AuthenticatedUser, ApplicationError> {
        if credential.trim().is_empty() {
            return Err(DomainError::invalid_argument(
                "credential",
                "No credential token provided",
            )
            .into());
        }

        let identity = match self.deps.federated_verifier.verify(credential).await {
            Ok(identity) => identity,
            Err(CredentialError::Rejected(reason)) => {
                tracing::info!(%reason, "第三方凭证无效");
                return Err(ApplicationError::Authentication);
            }
            Err(err) => return Err(err.into()),
        };

        let email = identity
            .email
            .as_deref()
            .map(UserEmail::parse)
            .transpose()?;
        let now = self.deps.clock.now();

        let mut existing = self
            .deps
            .user_repository
            .find_by_federated_id(&identity.subject)
            .await?;
        if existing.is_none() {
            if let Some(email) = &email {
                existing = self.deps.user_repository.find_by_email(email).await?;
            }
        }

        match existing {
            Some(mut user) => {
                user.link_federated(identity.subject, now);
                if let Some(name) = identity.name {
                    user.profile.full_name = Some(name);
                }
                if let Some(picture) = identity.picture {
                    user.profile.avatar = Some(picture);
                }
                let user = self
                    .deps
                    .user_repository
                    .update(user)
                    .await
                    .map_err(map_user_conflict)?;
                tracing::info!(user_id = %user.id, "第三方登录");
                Ok(AuthenticatedUser {
                    user,
                    is_new_user: false,
                })
            }
            None => {
                let user = User::federated(
                    UserId::generate(),
                    identity.subject,
                    email,
                    identity.name,
                    identity.picture,
                    now,
                );
                let user = self
                    .deps
                    .user_repository
                    .create(user)
                    .await
                    .map_err(map_user_conflict)?;
                tracing::info!(user_id = %user.id, "第三方登录创建新用户");
                Ok(AuthenticatedUser {
                    user,
                    is_new_user: true,
                })
            }
        }
    }

    /// 令牌对应的用户仍然存在时返回其状态。
    pub async fn verify(&self, user_id: UserId) -> Result<AuthenticatedUser, ApplicationError> {
        let user = self
            .deps
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or(ApplicationError::Authentication)?;
        let is_new_user = user.profile_incomplete();
        Ok(AuthenticatedUser { user, is_new_user })
    }
}
