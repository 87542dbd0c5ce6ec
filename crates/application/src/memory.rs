//! 进程内存储，实现全部仓储接口。用于测试和无数据库的本地运行。
//!
//! 每个写操作都在一次加锁内完成，对应数据库实现中的单条原子语句。

use std::collections::HashMap;

use async_trait::async_trait;
use domain::{
    Chat, ChatId, ChatMessage, ParticipantPair, Payment, PaymentId, PaymentStatus, PhoneNumber,
    Post, PostContent, PostId, PostType, RepositoryError, Timestamp, User, UserEmail, UserId,
};
use tokio::sync::RwLock;

use crate::repository::{
    ChatRepository, PaymentRepository, PostRepository, RecordedAcceptance, UserRepository,
};

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<UserId, User>>,
    posts: RwLock<HashMap<PostId, Post>>,
    chats: RwLock<HashMap<ChatId, Chat>>,
    payments: RwLock<HashMap<PaymentId, Payment>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn user_conflict(existing: &HashMap<UserId, User>, user: &User) -> Option<RepositoryError> {
    existing
        .values()
        .filter(|other| other.id != user.id)
        .find_map(|other| {
            if user.email.is_some() && other.email == user.email {
                Some(RepositoryError::conflict("users_email_key"))
            } else if user.phone.is_some() && other.phone == user.phone {
                Some(RepositoryError::conflict("users_phone_key"))
            } else if user.federated_id.is_some() && other.federated_id == user.federated_id {
                Some(RepositoryError::conflict("users_federated_id_key"))
            } else {
                None
            }
        })
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(RepositoryError::conflict("users_pkey"));
        }
        if let Some(conflict) = user_conflict(&users, &user) {
            return Err(conflict);
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, user: User) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(RepositoryError::NotFound);
        }
        if let Some(conflict) = user_conflict(&users, &user) {
            return Err(conflict);
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &UserEmail) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.email.as_ref() == Some(email))
            .cloned())
    }

    async fn find_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.phone.as_ref() == Some(phone))
            .cloned())
    }

    async fn find_by_federated_id(
        &self,
        subject: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.federated_id.as_deref() == Some(subject))
            .cloned())
    }

    async fn list_by_location(
        &self,
        location: &str,
        exclude: UserId,
    ) -> Result<Vec<User>, RepositoryError> {
        let users = self.users.read().await;
        let mut nearby: Vec<User> = users
            .values()
            .filter(|u| u.id != exclude && u.profile.location.as_deref() == Some(location))
            .cloned()
            .collect();
        nearby.sort_by_key(|u| u.created_at);
        Ok(nearby)
    }

    async fn set_online(&self, id: UserId, online: bool) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        user.is_online = online;
        Ok(())
    }

    async fn reset_presence(&self) -> Result<u64, RepositoryError> {
        let mut users = self.users.write().await;
        let mut reset = 0;
        for user in users.values_mut().filter(|u| u.is_online) {
            user.is_online = false;
            reset += 1;
        }
        Ok(reset)
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn create(&self, post: Post) -> Result<Post, RepositoryError> {
        let mut posts = self.posts.write().await;
        if posts.contains_key(&post.id) {
            return Err(RepositoryError::conflict("posts_pkey"));
        }
        posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn extend(
        &self,
        id: PostId,
        owner: UserId,
        post_type: PostType,
        now: Timestamp,
    ) -> Result<Option<Post>, RepositoryError> {
        let mut posts = self.posts.write().await;
        let post = posts.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        Ok(post
            .extend(owner, post_type, now)
            .is_ok()
            .then(|| post.clone()))
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, RepositoryError> {
        Ok(self.posts.read().await.get(&id).cloned())
    }

    async fn list_active(&self, now: Timestamp) -> Result<Vec<Post>, RepositoryError> {
        let posts = self.posts.read().await;
        let mut active: Vec<Post> = posts.values().filter(|p| p.is_open(now)).cloned().collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(active)
    }

    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Post>, RepositoryError> {
        let posts = self.posts.read().await;
        let mut owned: Vec<Post> = posts
            .values()
            .filter(|p| p.owner_id == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn count_acceptances_by(&self, user: UserId) -> Result<u64, RepositoryError> {
        let posts = self.posts.read().await;
        Ok(posts.values().filter(|p| p.has_accepted(user)).count() as u64)
    }

    async fn record_acceptance(
        &self,
        post: PostId,
        user: UserId,
        at: Timestamp,
    ) -> Result<RecordedAcceptance, RepositoryError> {
        let mut posts = self.posts.write().await;
        let post = posts.get_mut(&post).ok_or(RepositoryError::NotFound)?;
        if post.has_accepted(user) {
            return Ok(RecordedAcceptance::Duplicate(post.clone()));
        }
        if !post.is_open(at) {
            return Ok(RecordedAcceptance::Closed);
        }
        post.record_acceptance(user, at);
        Ok(RecordedAcceptance::Inserted(post.clone()))
    }

    async fn expire_due(&self, now: Timestamp) -> Result<Vec<PostId>, RepositoryError> {
        let mut posts = self.posts.write().await;
        Ok(posts
            .values_mut()
            .filter_map(|p| p.expire(now).then_some(p.id))
            .collect())
    }
}

#[async_trait]
impl ChatRepository for MemoryStore {
    async fn create(&self, chat: Chat) -> Result<Chat, RepositoryError> {
        let mut chats = self.chats.write().await;
        if chats.values().any(|c| c.participants == chat.participants) {
            return Err(RepositoryError::conflict("chats_pair_key"));
        }
        chats.insert(chat.id, chat.clone());
        Ok(chat)
    }

    async fn find_by_id(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError> {
        Ok(self.chats.read().await.get(&id).cloned())
    }

    async fn find_by_pair(&self, pair: ParticipantPair) -> Result<Option<Chat>, RepositoryError> {
        let chats = self.chats.read().await;
        Ok(chats.values().find(|c| c.participants == pair).cloned())
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Chat>, RepositoryError> {
        let chats = self.chats.read().await;
        Ok(chats
            .values()
            .filter(|c| c.is_participant(user))
            .map(|c| Chat {
                messages: Vec::new(),
                ..c.clone()
            })
            .collect())
    }

    async fn backfill_post(
        &self,
        id: ChatId,
        post: PostId,
        content: &PostContent,
        at: Timestamp,
    ) -> Result<Chat, RepositoryError> {
        let mut chats = self.chats.write().await;
        let chat = chats.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        chat.backfill_post(post, content, at);
        Ok(chat.clone())
    }

    async fn append_message(
        &self,
        id: ChatId,
        message: ChatMessage,
    ) -> Result<(), RepositoryError> {
        let mut chats = self.chats.write().await;
        let chat = chats.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        chat.append(message);
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn create(&self, payment: Payment) -> Result<Payment, RepositoryError> {
        let mut payments = self.payments.write().await;
        if payments.contains_key(&payment.id) {
            return Err(RepositoryError::conflict("payments_pkey"));
        }
        payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        Ok(self.payments.read().await.get(&id).cloned())
    }

    async fn list_pending(&self) -> Result<Vec<Payment>, RepositoryError> {
        let payments = self.payments.read().await;
        let mut pending: Vec<Payment> = payments
            .values()
            .filter(|p| p.status == PaymentStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|p| p.created_at);
        Ok(pending)
    }

    async fn decide(
        &self,
        id: PaymentId,
        status: PaymentStatus,
    ) -> Result<Option<Payment>, RepositoryError> {
        let mut payments = self.payments.write().await;
        let payment = payments.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if payment.status != PaymentStatus::Pending {
            return Ok(None);
        }
        payment.status = status;
        Ok(Some(payment.clone()))
    }
}
