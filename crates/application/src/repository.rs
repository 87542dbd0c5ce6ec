use async_trait::async_trait;
use domain::{
    Chat, ChatId, ChatMessage, ParticipantPair, Payment, PaymentId, PaymentStatus, PhoneNumber,
    Post, PostContent, PostId, PostType, RepositoryError, Timestamp, User, UserEmail, UserId,
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 邮箱、手机号、第三方 id 冲突时返回 `RepositoryError::Conflict`。
    async fn create(&self, user: User) -> Result<User, RepositoryError>;
    async fn update(&self, user: User) -> Result<User, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_email(&self, email: &UserEmail) -> Result<Option<User>, RepositoryError>;
    async fn find_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, RepositoryError>;
    async fn find_by_federated_id(&self, subject: &str)
        -> Result<Option<User>, RepositoryError>;
    async fn list_by_location(
        &self,
        location: &str,
        exclude: UserId,
    ) -> Result<Vec<User>, RepositoryError>;
    async fn set_online(&self, id: UserId, online: bool) -> Result<(), RepositoryError>;
    /// 进程启动时把所有残留的在线标记清零，返回受影响的行数。
    async fn reset_presence(&self) -> Result<u64, RepositoryError>;
}

/// `PostRepository::record_acceptance` 的结果。
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedAcceptance {
    /// 新插入了接受记录
    Inserted(Post),
    /// 该用户已接受过，未做修改
    Duplicate(Post),
    /// 帖子已不可接受，未写入
    Closed,
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: Post) -> Result<Post, RepositoryError>;
    /// 以 `post_type` 从 `now` 起重新计算到期时间。帖子不属于 `owner`、
    /// 不是 active 或已到期时不做修改并返回 `None`。
    async fn extend(
        &self,
        id: PostId,
        owner: UserId,
        post_type: PostType,
        now: Timestamp,
    ) -> Result<Option<Post>, RepositoryError>;
    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, RepositoryError>;
    async fn list_active(&self, now: Timestamp) -> Result<Vec<Post>, RepositoryError>;
    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Post>, RepositoryError>;
    /// 用户在所有帖子上的接受次数。
    async fn count_acceptances_by(&self, user: UserId) -> Result<u64, RepositoryError>;
    /// 原子地插入接受记录，并在存在非发帖人的接受时把 active 帖子转为 accepted。
    /// 已有该用户的记录时返回 `Duplicate`，不检查状态；
    /// 否则帖子在 `at` 时不可接受则返回 `Closed`。
    async fn record_acceptance(
        &self,
        post: PostId,
        user: UserId,
        at: Timestamp,
    ) -> Result<RecordedAcceptance, RepositoryError>;
    /// 把到期的 active 帖子标记为 expired，返回被处理的帖子。
    async fn expire_due(&self, now: Timestamp) -> Result<Vec<PostId>, RepositoryError>;
}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// 同一参与者二元组已存在会话时返回 `RepositoryError::Conflict`。
    async fn create(&self, chat: Chat) -> Result<Chat, RepositoryError>;
    async fn find_by_id(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError>;
    async fn find_by_pair(&self, pair: ParticipantPair) -> Result<Option<Chat>, RepositoryError>;
    /// 列表场景只需要摘要，返回的会话不含消息记录。
    async fn list_for_user(&self, user: UserId) -> Result<Vec<Chat>, RepositoryError>;
    /// 仅当会话尚未关联帖子时写入帖子、开场摘要和更新时间。返回当前会话。
    async fn backfill_post(
        &self,
        id: ChatId,
        post: PostId,
        content: &PostContent,
        at: Timestamp,
    ) -> Result<Chat, RepositoryError>;
    /// 原子地追加消息并更新 `last_message` / `updated_at`。
    async fn append_message(&self, id: ChatId, message: ChatMessage)
        -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: Payment) -> Result<Payment, RepositoryError>;
    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError>;
    async fn list_pending(&self) -> Result<Vec<Payment>, RepositoryError>;
    /// 只有 pending 状态的付款会被更新；状态已被改变时返回 `None`。
    async fn decide(
        &self,
        id: PaymentId,
        status: PaymentStatus,
    ) -> Result<Option<Payment>, RepositoryError>;
}
