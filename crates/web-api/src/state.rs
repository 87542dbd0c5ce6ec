use std::sync::Arc;

use application::{
    AuthService, AuthServiceDependencies, BlobStore, ChatRepository, ChatService,
    ChatServiceDependencies, Clock, FederatedIdentityVerifier, NotificationDispatcher,
    PasswordHasher, PaymentRepository, PaymentService, PaymentServiceDependencies, PostRepository,
    PostService, PostServiceDependencies, PresenceTracker, UserRepository, UserService,
    UserServiceDependencies,
};
use config::AppConfig;

use crate::JwtService;

/// 组装服务所需的外部适配器，生产环境由 infrastructure 提供，测试中使用内存实现。
pub struct AppStateDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub post_repository: Arc<dyn PostRepository>,
    pub chat_repository: Arc<dyn ChatRepository>,
    pub payment_repository: Arc<dyn PaymentRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub federated_verifier: Arc<dyn FederatedIdentityVerifier>,
    pub blob_store: Arc<dyn BlobStore>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub chat_service: Arc<ChatService>,
    pub payment_service: Arc<PaymentService>,
    pub presence: Arc<PresenceTracker>,
    pub jwt_service: Arc<JwtService>,
    /// multipart 请求体的上限，一次最多容纳若干张图片
    pub upload_body_limit: usize,
}

/// 单个 multipart 请求最多携带的文件数，用于推算请求体上限。
const MAX_FILES_PER_REQUEST: usize = 10;

impl AppState {
    pub fn new(config: &AppConfig, deps: AppStateDependencies) -> Self {
        let presence = Arc::new(PresenceTracker::new(deps.user_repository.clone()));
        let dispatcher = NotificationDispatcher::new(presence.clone());
        let max_upload_bytes = config.storage.max_upload_bytes;

        let auth_service = AuthService::new(AuthServiceDependencies {
            user_repository: deps.user_repository.clone(),
            password_hasher: deps.password_hasher,
            federated_verifier: deps.federated_verifier,
            clock: deps.clock.clone(),
        });

        let user_service = UserService::new(UserServiceDependencies {
            user_repository: deps.user_repository.clone(),
            blob_store: deps.blob_store.clone(),
            clock: deps.clock.clone(),
            max_upload_bytes,
        });

        let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
            user_repository: deps.user_repository.clone(),
            post_repository: deps.post_repository.clone(),
            chat_repository: deps.chat_repository,
            clock: deps.clock.clone(),
            dispatcher: dispatcher.clone(),
        }));

        let post_service = PostService::new(PostServiceDependencies {
            user_repository: deps.user_repository.clone(),
            post_repository: deps.post_repository.clone(),
            payment_repository: deps.payment_repository.clone(),
            chat_service: chat_service.clone(),
            clock: deps.clock.clone(),
            dispatcher,
            payments: config.payments.clone(),
        });

        let payment_service = PaymentService::new(PaymentServiceDependencies {
            user_repository: deps.user_repository,
            post_repository: deps.post_repository,
            payment_repository: deps.payment_repository,
            blob_store: deps.blob_store,
            clock: deps.clock,
            payments: config.payments.clone(),
            max_upload_bytes,
        });

        Self {
            auth_service: Arc::new(auth_service),
            user_service: Arc::new(user_service),
            post_service: Arc::new(post_service),
            chat_service,
            payment_service: Arc::new(payment_service),
            presence,
            jwt_service: Arc::new(JwtService::new(config.jwt.clone())),
            upload_body_limit: max_upload_bytes.saturating_mul(MAX_FILES_PER_REQUEST),
        }
    }
}
