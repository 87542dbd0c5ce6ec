use std::collections::HashMap;
use std::sync::Arc;

use domain::UserId;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::notifier::PushEvent;
use crate::repository::UserRepository;

/// 一个推送连接的发送端。
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    sender: mpsc::UnboundedSender<PushEvent>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::UnboundedSender<PushEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
        }
    }

    /// 新建连接句柄以及对应的接收端。
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PushEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 接收端已关闭时返回 `false`。
    pub fn send(&self, event: PushEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// 用户 id 无法解析，未做任何处理
    Ignored,
    /// 用户从离线变为在线
    Online(UserId),
    /// 已在线用户换了新连接，不产生状态事件
    Replaced(UserId),
}

#[derive(Default)]
struct PresenceState {
    by_user: HashMap<UserId, ConnectionHandle>,
    by_connection: HashMap<Uuid, UserId>,
}

impl PresenceState {
    fn handles(&self) -> Vec<ConnectionHandle> {
        self.by_user.values().cloned().collect()
    }
}

/// 进程内的在线状态表。每个用户最多保留一个连接。
///
/// 两张映射表放在同一把锁后面，连接与断开按顺序执行；在线标记的持久化
/// 也在锁内完成，保证数据库里的最终状态与内存一致。
pub struct PresenceTracker {
    users: Arc<dyn UserRepository>,
    state: RwLock<PresenceState>,
}

impl PresenceTracker {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self {
            users,
            state: RwLock::new(PresenceState::default()),
        }
    }

    /// 客户端上报的原始用户 id，格式不正确时直接忽略。
    pub async fn connect_raw(&self, raw_user_id: &str, handle: ConnectionHandle) -> ConnectOutcome {
        match raw_user_id.parse::<UserId>() {
            Ok(user_id) => self.connect(user_id, handle).await,
            Err(_) => {
                tracing::debug!(raw_user_id, "忽略格式错误的用户ID");
                ConnectOutcome::Ignored
            }
        }
    }

    pub async fn connect(&self, user_id: UserId, handle: ConnectionHandle) -> ConnectOutcome {
        let mut state = self.state.write().await;
        state.by_connection.insert(handle.id, user_id);

        if let Some(previous) = state.by_user.insert(user_id, handle.clone()) {
            if previous.id != handle.id {
                state.by_connection.remove(&previous.id);
            }
            tracing::info!(user_id = %user_id, connection_id = %handle.id, "用户连接被替换");
            return ConnectOutcome::Replaced(user_id);
        }

        if let Err(err) = self.users.set_online(user_id, true).await {
            tracing::warn!(user_id = %user_id, error = %err, "持久化在线状态失败");
        }
        let handles = state.handles();
        drop(state);

        tracing::info!(user_id = %user_id, connection_id = %handle.id, "用户上线");
        fan_out(&handles, &PushEvent::status(user_id, true));
        ConnectOutcome::Online(user_id)
    }

    /// 断开连接。只有当前连接断开才会让用户离线；已被替换的旧连接断开时
    /// 不做任何事，返回 `None`。
    pub async fn disconnect(&self, connection_id: Uuid) -> Option<UserId> {
        let mut state = self.state.write().await;
        let user_id = state.by_connection.remove(&connection_id)?;

        let is_current = state
            .by_user
            .get(&user_id)
            .map(|current| current.id == connection_id)
            .unwrap_or(false);
        if !is_current {
            return None;
        }
        state.by_user.remove(&user_id);

        if let Err(err) = self.users.set_online(user_id, false).await {
            tracing::warn!(user_id = %user_id, error = %err, "持久化离线状态失败");
        }
        let handles = state.handles();
        drop(state);

        tracing::info!(user_id = %user_id, connection_id = %connection_id, "用户离线");
        fan_out(&handles, &PushEvent::status(user_id, false));
        Some(user_id)
    }

    pub async fn lookup(&self, user_id: UserId) -> Option<ConnectionHandle> {
        self.state.read().await.by_user.get(&user_id).cloned()
    }

    pub async fn online_users(&self) -> Vec<UserId> {
        self.state.read().await.by_user.keys().copied().collect()
    }

    pub async fn broadcast(&self, event: &PushEvent) -> usize {
        let handles = self.state.read().await.handles();
        fan_out(&handles, event)
    }
}

fn fan_out(handles: &[ConnectionHandle], event: &PushEvent) -> usize {
    let mut delivered = 0;
    for handle in handles {
        if handle.send(event.clone()) {
            delivered += 1;
        } else {
            tracing::debug!(connection_id = %handle.id, event = event.name(), "连接已关闭，跳过推送");
        }
    }
    delivered
}
