use std::collections::HashMap;
use std::sync::Arc;

use config::PaymentsConfig;
use domain::{
    acceptance_reference, DomainError, NewPost, PaymentId, Post, PostContent, PostId, PostType,
    RepositoryError, User, UserId,
};

use crate::{
    clock::Clock,
    dto::{AcceptanceOutcome, PostView},
    error::{ApplicationError, PaymentInstructions},
    notifier::{NotificationDispatcher, Outbox, PostAcceptedPayload, PushEvent},
    repository::{PaymentRepository, PostRepository, RecordedAcceptance, UserRepository},
    services::chat_service::{stage_new_chat, ChatService},
};

/// 无需付费即可接受的帖子数量。
pub const FREE_ACCEPTANCE_QUOTA: u64 = 5;

#[derive(Debug, Clone)]
pub struct CreatePostRequest {
    pub owner: UserId,
    pub content: String,
    pub sponsored: bool,
    pub post_type: PostType,
    pub image_url: Option<String>,
    pub payment_proof_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExtendPostRequest {
    pub actor: UserId,
    pub post_id: PostId,
    pub post_type: PostType,
}

#[derive(Debug, Clone)]
pub struct AcceptPostRequest {
    pub post_id: PostId,
    pub user: UserId,
    pub payment_id: Option<PaymentId>,
}

pub struct PostServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub post_repository: Arc<dyn PostRepository>,
    pub payment_repository: Arc<dyn PaymentRepository>,
    pub chat_service: Arc<ChatService>,
    pub clock: Arc<dyn Clock>,
    pub dispatcher: NotificationDispatcher,
    pub payments: PaymentsConfig,
}

pub struct PostService {
    deps: PostServiceDependencies,
}

impl PostService {
    pub fn new(deps: PostServiceDependencies) -> Self {
        Self { deps }
    }

    async fn load_user(&self, id: UserId) -> Result<User, ApplicationError> {
        self.deps
            .user_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::UserNotFound.into())
    }

    async fn load_post(&self, id: PostId) -> Result<Post, ApplicationError> {
        self.deps
            .post_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::PostNotFound.into())
    }

    /// 给一组帖子附上发帖人的姓名和头像。
    async fn attach_owners(&self, posts: Vec<Post>) -> Result<Vec<PostView>, ApplicationError> {
        let mut owners: HashMap<UserId, Option<User>> = HashMap::new();
        for post in &posts {
            if !owners.contains_key(&post.owner_id) {
                let owner = self.deps.user_repository.find_by_id(post.owner_id).await?;
                owners.insert(post.owner_id, owner);
            }
        }
        Ok(posts
            .iter()
            .map(|post| {
                let owner = owners.get(&post.owner_id).and_then(Option::as_ref);
                PostView::new(post, owner)
            })
            .collect())
    }

    pub async fn list_active(&self) -> Result<Vec<PostView>, ApplicationError> {
        let posts = self
            .deps
            .post_repository
            .list_active(self.deps.clock.now())
            .await?;
        self.attach_owners(posts).await
    }

    pub async fn list_by_owner(&self, owner: UserId) -> Result<Vec<PostView>, ApplicationError> {
        let posts = self.deps.post_repository.list_by_owner(owner).await?;
        self.attach_owners(posts).await
    }

    pub async fn create_post(&self, request: CreatePostRequest) -> Result<PostView, ApplicationError> {
        let owner = self.load_user(request.owner).await?;
        let content = PostContent::new(request.content)?;
        let post = Post::new(
            PostId::generate(),
            NewPost {
                owner_id: owner.id,
                content,
                sponsored: request.sponsored,
                post_type: request.post_type,
                image_url: request.image_url,
                payment_proof_url: request.payment_proof_url,
            },
            self.deps.clock.now(),
        );
        let post = self.deps.post_repository.create(post).await?;
        tracing::info!(post_id = %post.id, owner_id = %owner.id, post_type = post.post_type.as_str(), "创建帖子");
        Ok(PostView::new(&post, Some(&owner)))
    }

    /// 延长帖子展示时间。
    ///
    /// 先按读到的快照校验权限和状态，再由仓储在同一次写入中复核，
    /// 其间被接受或过期的帖子返回 `PostNotActive`。
    pub async fn extend_post(&self, request: ExtendPostRequest) -> Result<PostView, ApplicationError> {
        let now = self.deps.clock.now();
        let mut snapshot = self.load_post(request.post_id).await?;
        snapshot.extend(request.actor, request.post_type, now)?;
        let post = self
            .deps
            .post_repository
            .extend(snapshot.id, request.actor, request.post_type, now)
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound => ApplicationError::from(DomainError::PostNotFound),
                other => other.into(),
            })?
            .ok_or(DomainError::PostNotActive)?;
        let owner = self.deps.user_repository.find_by_id(post.owner_id).await?;
        tracing::info!(post_id = %post.id, expires_at = %post.expires_at, "帖子已延期");
        Ok(PostView::new(&post, owner.as_ref()))
    }

    fn payment_instructions(&self) -> PaymentInstructions {
        PaymentInstructions {
            bank: self.deps.payments.bank_name.clone(),
            account_number: self.deps.payments.account_number.clone(),
            account_name: self.deps.payments.account_name.clone(),
            reference: acceptance_reference(self.deps.clock.now()),
        }
    }

    /// 接受帖子。
    ///
    /// 超过免费额度需要提供已审核的解锁付款；提供了付款 id 时总是校验。
    /// 帖子被接受后不再可接受，之后的重复提交返回 `PostNotActive`。
    /// 同一用户的两个请求并发通过状态检查时只插入一条记录，后到的一方
    /// 返回同一会话且不推送事件。
    /// 额度检查与插入之间没有加锁，并发下允许少量超出。
    pub async fn accept_request(
        &self,
        request: AcceptPostRequest,
    ) -> Result<AcceptanceOutcome, ApplicationError> {
        let now = self.deps.clock.now();
        let post = self.load_post(request.post_id).await?;
        post.ensure_open(now)?;
        if post.owner_id == request.user {
            return Err(DomainError::invalid_argument(
                "postId",
                "You cannot accept your own post",
            )
            .into());
        }

        let accepted = self
            .deps
            .post_repository
            .count_acceptances_by(request.user)
            .await?;

        match request.payment_id {
            Some(payment_id) => {
                let payment = self
                    .deps
                    .payment_repository
                    .find_by_id(payment_id)
                    .await?
                    .ok_or(DomainError::PaymentInvalid)?;
                payment.check_unlocks_acceptances(request.user)?;
            }
            None if accepted >= FREE_ACCEPTANCE_QUOTA => {
                tracing::info!(user_id = %request.user, accepted, "超出免费接受额度");
                return Err(ApplicationError::PaymentRequired(self.payment_instructions()));
            }
            None => {}
        }

        let accepter = self.load_user(request.user).await?;
        let owner = self.load_user(post.owner_id).await?;

        let recorded = self
            .deps
            .post_repository
            .record_acceptance(post.id, accepter.id, now)
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound => ApplicationError::from(DomainError::PostNotFound),
                other => other.into(),
            })?;
        let (post, inserted) = match recorded {
            RecordedAcceptance::Inserted(post) => (post, true),
            // 同一用户的并发请求已先写入
            RecordedAcceptance::Duplicate(post) => (post, false),
            RecordedAcceptance::Closed => return Err(DomainError::PostNotActive.into()),
        };

        let opened = self
            .deps
            .chat_service
            .open_chat(&accepter, &owner, Some(&post))
            .await?;

        if inserted {
            tracing::info!(
                post_id = %post.id,
                user_id = %accepter.id,
                chat_id = %opened.chat.id,
                status = post.status.as_str(),
                "帖子被接受"
            );
            let mut outbox = Outbox::new();
            stage_new_chat(&mut outbox, &opened.chat, &accepter, &owner);
            outbox.to_everyone(PushEvent::PostAccepted(PostAcceptedPayload { post_id: post.id }));
            self.deps.dispatcher.flush(outbox).await;
        } else {
            tracing::debug!(post_id = %post.id, user_id = %accepter.id, "重复接受，不再推送");
        }

        Ok(AcceptanceOutcome {
            post: PostView::new(&post, Some(&owner)),
            chat_id: opened.chat.id,
        })
    }

    /// 把到期的帖子标记为 expired，由后台任务周期调用。
    pub async fn expire_due(&self) -> Result<usize, ApplicationError> {
        let expired = self
            .deps
            .post_repository
            .expire_due(self.deps.clock.now())
            .await?;
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "帖子已过期");
        }
        Ok(expired.len())
    }
}
