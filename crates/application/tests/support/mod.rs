//! 测试辅助：基于内存存储组装全部服务。
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use application::dto::{PaymentView, PostView};
use application::services::{CreatePostRequest, SubmitProofRequest};
use application::{
    BlobStore, BlobStoreError, ChatRepository, ChatService, ChatServiceDependencies, ConnectionHandle,
    ImageUpload, ManualClock, MemoryStore, NotificationDispatcher, PaymentService,
    PaymentServiceDependencies, PostRepository, PostService, PostServiceDependencies,
    PresenceTracker, PushEvent,
    UploadedFile, UserRepository, UserService, UserServiceDependencies,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use config::PaymentsConfig;
use domain::{PasswordHash, PaymentPurpose, PhoneNumber, PostType, User, UserEmail, UserId};
use tokio::sync::mpsc::UnboundedReceiver;

/// 记录上传次数的 blob 存储。
#[derive(Default)]
pub struct RecordingBlobStore {
    count: AtomicUsize,
}

impl RecordingBlobStore {
    pub fn stored(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for RecordingBlobStore {
    async fn put(&self, image: &ImageUpload) -> Result<String, BlobStoreError> {
        let n = self.count.fetch_add(1, Ordering::SeqCst);
        Ok(format!("memory://uploads/{n}.{}", image.format.extension()))
    }
}

/// 一个合法的 PNG 上传文件。
pub fn png(field: &str) -> UploadedFile {
    UploadedFile {
        field: field.to_string(),
        file_name: "photo.png".to_string(),
        content_type: "image/png".to_string(),
        bytes: vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a],
    }
}

pub fn payments_config() -> PaymentsConfig {
    PaymentsConfig {
        bank_name: "Test Bank".to_string(),
        account_number: "0001112223".to_string(),
        account_name: "Meetup Ltd".to_string(),
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub presence: Arc<PresenceTracker>,
    pub dispatcher: NotificationDispatcher,
    pub blobs: Arc<RecordingBlobStore>,
    pub chats: Arc<ChatService>,
    pub posts: PostService,
    pub payments: PaymentService,
    pub users: UserService,
    counter: AtomicUsize,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::build(store.clone(), store.clone(), store)
    }

    /// 帖子和会话仓储可以替换为包装过的实现，其余仓储仍使用 `store`。
    pub fn build(
        store: Arc<MemoryStore>,
        post_repository: Arc<dyn PostRepository>,
        chat_repository: Arc<dyn ChatRepository>,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        let presence = Arc::new(PresenceTracker::new(store.clone()));
        let dispatcher = NotificationDispatcher::new(presence.clone());
        let blobs = Arc::new(RecordingBlobStore::default());

        let chats = Arc::new(ChatService::new(ChatServiceDependencies {
            user_repository: store.clone(),
            post_repository: post_repository.clone(),
            chat_repository,
            clock: clock.clone(),
            dispatcher: dispatcher.clone(),
        }));
        let posts = PostService::new(PostServiceDependencies {
            user_repository: store.clone(),
            post_repository: post_repository.clone(),
            payment_repository: store.clone(),
            chat_service: chats.clone(),
            clock: clock.clone(),
            dispatcher: dispatcher.clone(),
            payments: payments_config(),
        });
        let payments = PaymentService::new(PaymentServiceDependencies {
            user_repository: store.clone(),
            post_repository,
            payment_repository: store.clone(),
            blob_store: blobs.clone(),
            clock: clock.clone(),
            payments: payments_config(),
            max_upload_bytes: application::blob::MAX_IMAGE_BYTES,
        });
        let users = UserService::new(UserServiceDependencies {
            user_repository: store.clone(),
            blob_store: blobs.clone(),
            clock: clock.clone(),
            max_upload_bytes: application::blob::MAX_IMAGE_BYTES,
        });

        Self {
            store,
            clock,
            presence,
            dispatcher,
            blobs,
            chats,
            posts,
            payments,
            users,
            counter: AtomicUsize::new(1),
        }
    }

    /// 直接写入一个资料完整的用户。
    pub async fn user(&self, name: &str) -> User {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let mut user = User::signup(
            UserId::generate(),
            UserEmail::parse(format!("{}{n}@example.com", name.to_lowercase())).unwrap(),
            PhoneNumber::parse(format!("+2348000000{n:03}")).unwrap(),
            PasswordHash::new("plain:secret").unwrap(),
            Utc::now(),
        );
        user.profile.full_name = Some(name.to_string());
        UserRepository::create(self.store.as_ref(), user)
            .await
            .unwrap()
    }

    pub async fn admin(&self, name: &str) -> User {
        let mut user = self.user(name).await;
        user.is_admin = true;
        UserRepository::update(self.store.as_ref(), user)
            .await
            .unwrap()
    }

    pub async fn post(&self, owner: &User, content: &str) -> PostView {
        self.posts
            .create_post(CreatePostRequest {
                owner: owner.id,
                content: content.to_string(),
                sponsored: false,
                post_type: PostType::Quick,
                image_url: None,
                payment_proof_url: None,
            })
            .await
            .unwrap()
    }

    /// 提交一笔待审核的解锁付款。
    pub async fn unlock_payment(&self, owner: &User) -> PaymentView {
        self.payments
            .submit_proof(SubmitProofRequest {
                owner: owner.id,
                purpose: PaymentPurpose::UnlockAcceptances,
                post_id: None,
                amount: 1000.0,
                proof: png("proof"),
            })
            .await
            .unwrap()
    }

    /// 建立推送连接并清空上线时收到的状态事件。
    pub async fn connect(&self, user: &User) -> (ConnectionHandle, UnboundedReceiver<PushEvent>) {
        let (handle, mut rx) = ConnectionHandle::channel();
        self.presence.connect(user.id, handle.clone()).await;
        drain(&mut rx);
        (handle, rx)
    }
}

pub fn drain(rx: &mut UnboundedReceiver<PushEvent>) -> Vec<PushEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
