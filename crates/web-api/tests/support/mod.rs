//! 测试辅助：在随机端口上启动完整路由，底层使用内存存储。
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use application::{
    BlobStore, BlobStoreError, CredentialError, FederatedIdentity, FederatedIdentityVerifier,
    ImageUpload, MemoryStore, PasswordHasher, SystemClock, UserRepository,
};
use async_trait::async_trait;
use config::AppConfig;
use domain::{PasswordHash, UserId};
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::oneshot, time::timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use web_api::{router, AppState, AppStateDependencies};

pub type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// 明文前缀的假哈希，避免测试中的 bcrypt 开销。
pub struct PlainHasher;

#[async_trait]
impl PasswordHasher for PlainHasher {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, CredentialError> {
        PasswordHash::new(format!("plain:{plaintext}"))
            .map_err(|err| CredentialError::Hashing(err.to_string()))
    }

    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, CredentialError> {
        Ok(hashed.as_str() == format!("plain:{plaintext}"))
    }
}

/// 只接受 `good:<subject>` 形式的凭证。
pub struct StubVerifier;

#[async_trait]
impl FederatedIdentityVerifier for StubVerifier {
    async fn verify(&self, credential: &str) -> Result<FederatedIdentity, CredentialError> {
        let subject = credential
            .strip_prefix("good:")
            .ok_or_else(|| CredentialError::Rejected("bad signature".to_string()))?;
        Ok(FederatedIdentity {
            subject: subject.to_string(),
            email: Some(format!("{subject}@example.com")),
            name: Some("Federated User".to_string()),
            picture: None,
        })
    }
}

#[derive(Default)]
pub struct CountingBlobStore {
    count: AtomicUsize,
}

#[async_trait]
impl BlobStore for CountingBlobStore {
    async fn put(&self, image: &ImageUpload) -> Result<String, BlobStoreError> {
        let n = self.count.fetch_add(1, Ordering::SeqCst);
        Ok(format!("http://localhost/Uploads/{n}.{}", image.format.extension()))
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.jwt.secret = "web-api-test-secret-with-enough-length".to_string();
    config.payments.bank_name = "Test Bank".to_string();
    config.payments.account_number = "0001112223".to_string();
    config.payments.account_name = "Meetup Ltd".to_string();
    config
}

pub struct TestServer {
    pub base: String,
    pub ws_base: String,
    pub client: Client,
    pub store: Arc<MemoryStore>,
    counter: AtomicUsize,
    _shutdown: oneshot::Sender<()>,
}

/// 已注册并完善资料的测试用户。
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: UserId,
    pub token: String,
}

/// 基于内存存储组装完整的应用状态。
pub fn memory_state() -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(
        &test_config(),
        AppStateDependencies {
            user_repository: store.clone(),
            post_repository: store.clone(),
            chat_repository: store.clone(),
            payment_repository: store.clone(),
            password_hasher: Arc::new(PlainHasher),
            federated_verifier: Arc::new(StubVerifier),
            blob_store: Arc::new(CountingBlobStore::default()),
            clock: Arc::new(SystemClock),
        },
    );
    (state, store)
}

impl TestServer {
    pub async fn start() -> Self {
        let (state, store) = memory_state();

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(state);

        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Self {
            base: format!("http://{addr}"),
            ws_base: format!("ws://{addr}"),
            client: Client::new(),
            store,
            counter: AtomicUsize::new(1),
            _shutdown: shutdown_tx,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn get(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("send");
        read(response).await
    }

    pub async fn post(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("send");
        read(response).await
    }

    pub async fn put(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("send");
        read(response).await
    }

    /// 注册并填写姓名，返回 id 与 token。
    pub async fn user(&self, name: &str) -> TestUser {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let (status, body) = self
            .post(
                "",
                "/api/auth/signup",
                json!({
                    "email": format!("{}{n}@example.com", name.to_lowercase()),
                    "phone": format!("+2348100000{n:03}"),
                    "password": "secret123"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let token = body["token"].as_str().expect("token").to_string();

        let (status, profile) = self
            .post(&token, "/api/users/profile", json!({ "fullName": name }))
            .await;
        assert_eq!(status, StatusCode::OK, "{profile}");
        let id = profile["_id"]
            .as_str()
            .expect("_id")
            .parse::<UserId>()
            .expect("uuid");

        TestUser { id, token }
    }

    /// 把用户标记为管理员。
    pub async fn promote(&self, user: &TestUser) {
        let mut stored = UserRepository::find_by_id(self.store.as_ref(), user.id)
            .await
            .unwrap()
            .unwrap();
        stored.is_admin = true;
        UserRepository::update(self.store.as_ref(), stored)
            .await
            .unwrap();
    }

    pub async fn create_post(&self, owner: &TestUser, content: &str) -> String {
        let (status, body) = self
            .post(&owner.token, "/api/posts", json!({ "content": content }))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["post"]["_id"].as_str().expect("post id").to_string()
    }

    pub async fn connect_ws(&self, user: &TestUser) -> WsClient {
        let url = format!("{}/ws?token={}", self.ws_base, user.token);
        let (socket, _) = connect_async(url).await.expect("ws connect");
        socket
    }
}

async fn read(response: reqwest::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

/// 读取下一条推送事件，超时返回 `None`。
pub async fn next_event(socket: &mut WsClient) -> Option<Value> {
    loop {
        let frame = timeout(Duration::from_millis(500), socket.next())
            .await
            .ok()??
            .ok()?;
        match frame {
            Message::Text(text) => return serde_json::from_str(text.as_str()).ok(),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}

/// 收集直到静默为止的全部事件。
pub async fn drain_events(socket: &mut WsClient) -> Vec<Value> {
    let mut events = Vec::new();
    while let Some(event) = next_event(socket).await {
        events.push(event);
    }
    events
}

pub fn event_names(events: &[Value]) -> Vec<String> {
    events
        .iter()
        .map(|event| event["event"].as_str().unwrap_or_default().to_string())
        .collect()
}
