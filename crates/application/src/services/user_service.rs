use std::sync::Arc;

use domain::{DomainError, ProfilePatch, RepositoryError, User, UserId};

use crate::{
    blob::{validate_image, BlobStore, UploadedFile},
    clock::Clock,
    dto::{ProfileView, UploadedMedia, UserCardView},
    error::ApplicationError,
    repository::UserRepository,
};

pub const AVATAR_FIELD: &str = "avatar";
pub const IMAGES_FIELD: &str = "images";

/// 把唯一约束冲突翻译成具体的领域错误。
pub(crate) fn map_user_conflict(err: RepositoryError) -> ApplicationError {
    if let RepositoryError::Conflict { constraint } = &err {
        if constraint.contains("email") {
            return DomainError::EmailTaken.into();
        }
        if constraint.contains("phone") {
            return DomainError::PhoneTaken.into();
        }
        if constraint.contains("federated") {
            return DomainError::FederatedIdTaken.into();
        }
    }
    err.into()
}

pub struct UserServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub blob_store: Arc<dyn BlobStore>,
    pub clock: Arc<dyn Clock>,
    pub max_upload_bytes: usize,
}

pub struct UserService {
    deps: UserServiceDependencies,
}

impl UserService {
    pub fn new(deps: UserServiceDependencies) -> Self {
        Self { deps }
    }

    async fn load(&self, id: UserId) -> Result<User, ApplicationError> {
        self.deps
            .user_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::UserNotFound.into())
    }

    /// 首次完善资料，必须包含姓名。
    pub async fn create_profile(
        &self,
        user_id: UserId,
        patch: ProfilePatch,
    ) -> Result<ProfileView, ApplicationError> {
        let has_name = patch
            .full_name
            .as_deref()
            .map(|name| !name.trim().is_empty())
            .unwrap_or(false);
        if !has_name {
            return Err(DomainError::invalid_argument("fullName", "Full name is required").into());
        }
        self.update_profile(user_id, patch).await
    }

    pub async fn update_profile(
        &self,
        user_id: UserId,
        patch: ProfilePatch,
    ) -> Result<ProfileView, ApplicationError> {
        let mut user = self.load(user_id).await?;

        if let Some(email) = &patch.email {
            if let Some(other) = self.deps.user_repository.find_by_email(email).await? {
                if other.id != user_id {
                    return Err(DomainError::EmailTaken.into());
                }
            }
        }
        if let Some(phone) = &patch.phone {
            if let Some(other) = self.deps.user_repository.find_by_phone(phone).await? {
                if other.id != user_id {
                    return Err(DomainError::PhoneTaken.into());
                }
            }
        }

        user.apply_patch(patch, self.deps.clock.now())?;
        let user = self
            .deps
            .user_repository
            .update(user)
            .await
            .map_err(map_user_conflict)?;
        tracing::info!(user_id = %user.id, "资料已更新");
        Ok(ProfileView::from(&user))
    }

    pub async fn get_profile(&self, user_id: UserId) -> Result<ProfileView, ApplicationError> {
        let user = self.load(user_id).await?;
        Ok(ProfileView::from(&user))
    }

    pub async fn get_user(&self, user_id: UserId) -> Result<UserCardView, ApplicationError> {
        let user = self.load(user_id).await?;
        Ok(UserCardView::from(&user))
    }

    /// 与当前用户位于同一地点的其他用户；未填写地点时为空。
    pub async fn nearby(&self, user_id: UserId) -> Result<Vec<UserCardView>, ApplicationError> {
        let user = self.load(user_id).await?;
        let Some(location) = user.profile.location.as_deref() else {
            return Ok(Vec::new());
        };
        let users = self
            .deps
            .user_repository
            .list_by_location(location, user_id)
            .await?;
        Ok(users.iter().map(UserCardView::from).collect())
    }

    pub async fn rate(
        &self,
        rater: UserId,
        target: UserId,
        value: u8,
    ) -> Result<f64, ApplicationError> {
        let mut user = self.load(target).await?;
        let average = user.rate(rater, value, self.deps.clock.now())?;
        self.deps.user_repository.update(user).await?;
        tracing::info!(user_id = %target, rater = %rater, value, "用户评分");
        Ok(average)
    }

    /// 保存头像或相册图片，返回可访问的 URL。
    pub async fn upload_media(
        &self,
        user_id: UserId,
        files: Vec<UploadedFile>,
    ) -> Result<UploadedMedia, ApplicationError> {
        if files.is_empty() {
            return Err(DomainError::invalid_argument("file", "No files uploaded").into());
        }
        self.load(user_id).await?;

        let mut images = Vec::with_capacity(files.len());
        for file in files {
            let field = file.field.clone();
            if field != AVATAR_FIELD && field != IMAGES_FIELD {
                return Err(DomainError::invalid_argument(field, "unexpected file field").into());
            }
            images.push((field, validate_image(file, self.deps.max_upload_bytes)?));
        }

        let mut media = UploadedMedia::default();
        for (field, image) in images {
            let url = self.deps.blob_store.put(&image).await?;
            if field == AVATAR_FIELD {
                media.avatar_url = Some(url);
            } else {
                media.image_urls.push(url);
            }
        }
        tracing::info!(
            user_id = %user_id,
            avatar = media.avatar_url.is_some(),
            images = media.image_urls.len(),
            "上传资料图片"
        );
        Ok(media)
    }
}
