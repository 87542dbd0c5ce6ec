use std::collections::HashSet;
use std::sync::Arc;

use domain::{
    Chat, ChatId, ChatMessage, DomainError, MessageText, ParticipantPair, Post, PostId,
    RepositoryError, User, UserId,
};

use crate::{
    clock::Clock,
    dto::{ChatMessagesView, ChatView, MessageView},
    error::ApplicationError,
    notifier::{NewChatPayload, NewMessagePayload, NotificationDispatcher, Outbox, PushEvent},
    repository::{ChatRepository, PostRepository, UserRepository},
};

#[derive(Debug, Clone)]
pub struct StartChatRequest {
    pub initiator: UserId,
    pub recipient: UserId,
    pub post_id: Option<PostId>,
}

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub chat_id: ChatId,
    pub sender: UserId,
    pub text: String,
}

pub struct ChatServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub post_repository: Arc<dyn PostRepository>,
    pub chat_repository: Arc<dyn ChatRepository>,
    pub clock: Arc<dyn Clock>,
    pub dispatcher: NotificationDispatcher,
}

pub struct ChatService {
    deps: ChatServiceDependencies,
}

/// `open_chat` 的结果。
pub(crate) struct OpenedChat {
    pub chat: Chat,
    pub created: bool,
}

/// 给双方各生成一条 `new-chat`，`user` 字段是接收方的对方。
pub(crate) fn stage_new_chat(outbox: &mut Outbox, chat: &Chat, a: &User, b: &User) {
    for (receiver, other) in [(a, b), (b, a)] {
        outbox.to_user(
            receiver.id,
            PushEvent::NewChat(NewChatPayload {
                id: chat.id,
                user: other.public_profile(),
                last_message: chat.last_message.clone(),
                updated_at: chat.updated_at,
                post_id: chat.post_id,
            }),
        );
    }
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    async fn load_user(&self, id: UserId) -> Result<User, ApplicationError> {
        self.deps
            .user_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::UserNotFound.into())
    }

    /// 加载会话并确认 `user` 是参与者。
    async fn load_for_participant(
        &self,
        chat_id: ChatId,
        user: UserId,
    ) -> Result<Chat, ApplicationError> {
        let chat = self
            .deps
            .chat_repository
            .find_by_id(chat_id)
            .await?
            .ok_or(DomainError::ChatNotFound)?;
        chat.ensure_participant(user)?;
        Ok(chat)
    }

    async fn recipient_of(&self, chat: &Chat, viewer: UserId) -> Result<User, ApplicationError> {
        let other = chat
            .counterparty(viewer)
            .ok_or(DomainError::NotChatParticipant)?;
        self.load_user(other).await
    }

    /// 按无序二元组查找或创建会话。`starter` 是种子消息的发送者。
    ///
    /// 已有会话且尚未关联帖子时补上帖子；已关联其他帖子时保持不变。
    pub(crate) async fn open_chat(
        &self,
        starter: &User,
        other: &User,
        post: Option<&Post>,
    ) -> Result<OpenedChat, ApplicationError> {
        let pair = ParticipantPair::new(starter.id, other.id)?;

        if let Some(existing) = self.deps.chat_repository.find_by_pair(pair).await? {
            let chat = self.backfill(existing, post).await?;
            return Ok(OpenedChat {
                chat,
                created: false,
            });
        }

        let now = self.deps.clock.now();
        let draft = Chat::start(
            ChatId::generate(),
            pair,
            starter.id,
            post.map(|p| (p.id, &p.content)),
            now,
        );

        match self.deps.chat_repository.create(draft).await {
            Ok(chat) => {
                tracing::info!(chat_id = %chat.id, post_id = ?chat.post_id, "创建会话");
                Ok(OpenedChat {
                    chat,
                    created: true,
                })
            }
            // 并发创建时唯一约束兜底，改为读取已存在的会话
            Err(RepositoryError::Conflict { .. }) => {
                let existing = self
                    .deps
                    .chat_repository
                    .find_by_pair(pair)
                    .await?
                    .ok_or(DomainError::ChatNotFound)?;
                let chat = self.backfill(existing, post).await?;
                Ok(OpenedChat {
                    chat,
                    created: false,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn backfill(&self, chat: Chat, post: Option<&Post>) -> Result<Chat, ApplicationError> {
        match post {
            Some(post) if chat.post_id.is_none() => {
                let chat = self
                    .deps
                    .chat_repository
                    .backfill_post(chat.id, post.id, &post.content, self.deps.clock.now())
                    .await?;
                tracing::debug!(chat_id = %chat.id, post_id = %post.id, "会话补充关联帖子");
                Ok(chat)
            }
            _ => Ok(chat),
        }
    }

    pub async fn start_or_get_chat(
        &self,
        request: StartChatRequest,
    ) -> Result<ChatView, ApplicationError> {
        if request.initiator == request.recipient {
            return Err(DomainError::invalid_argument(
                "recipientId",
                "Cannot create chat with yourself",
            )
            .into());
        }

        let initiator = self.load_user(request.initiator).await?;
        let recipient = self.load_user(request.recipient).await?;
        let post = match request.post_id {
            Some(post_id) => Some(
                self.deps
                    .post_repository
                    .find_by_id(post_id)
                    .await?
                    .ok_or(DomainError::PostNotFound)?,
            ),
            None => None,
        };

        let opened = self.open_chat(&initiator, &recipient, post.as_ref()).await?;

        if opened.created {
            let mut outbox = Outbox::new();
            stage_new_chat(&mut outbox, &opened.chat, &initiator, &recipient);
            self.deps.dispatcher.flush(outbox).await;
        }

        Ok(ChatView::new(&opened.chat, recipient.public_profile()))
    }

    /// 按对方去重（保留最近更新的一条），按 `updated_at` 倒序。
    pub async fn list_chats(&self, user: UserId) -> Result<Vec<ChatView>, ApplicationError> {
        let mut chats = self.deps.chat_repository.list_for_user(user).await?;
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let mut seen = HashSet::new();
        let mut views = Vec::with_capacity(chats.len());
        for chat in chats {
            let Some(other) = chat.counterparty(user) else {
                continue;
            };
            if !seen.insert(other) {
                continue;
            }
            // 对方账号已删除的会话不展示
            let Some(recipient) = self.deps.user_repository.find_by_id(other).await? else {
                continue;
            };
            views.push(ChatView::new(&chat, recipient.public_profile()));
        }
        Ok(views)
    }

    pub async fn get_chat(&self, chat_id: ChatId, user: UserId) -> Result<ChatView, ApplicationError> {
        let chat = self.load_for_participant(chat_id, user).await?;
        let recipient = self.recipient_of(&chat, user).await?;
        Ok(ChatView::new(&chat, recipient.public_profile()))
    }

    pub async fn get_messages(
        &self,
        chat_id: ChatId,
        user: UserId,
    ) -> Result<ChatMessagesView, ApplicationError> {
        let chat = self.load_for_participant(chat_id, user).await?;
        let recipient = self.recipient_of(&chat, user).await?;
        Ok(ChatMessagesView {
            messages: chat
                .messages
                .iter()
                .map(|m| MessageView::for_viewer(m, user))
                .collect(),
            recipient: recipient.public_profile(),
            post_id: chat.post_id,
        })
    }

    pub async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<MessageView, ApplicationError> {
        let text = MessageText::new(request.text)?;
        let chat = self
            .load_for_participant(request.chat_id, request.sender)
            .await?;
        let recipient = chat
            .counterparty(request.sender)
            .ok_or(DomainError::NotChatParticipant)?;

        let message = ChatMessage::new(request.sender, text, self.deps.clock.now());
        self.deps
            .chat_repository
            .append_message(chat.id, message.clone())
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound => ApplicationError::from(DomainError::ChatNotFound),
                other => other.into(),
            })?;

        tracing::debug!(chat_id = %chat.id, sender = %request.sender, "消息已保存");

        let mut outbox = Outbox::new();
        outbox.to_user(
            recipient,
            PushEvent::NewMessage(NewMessagePayload {
                chat_id: chat.id,
                message: MessageView::for_viewer(&message, recipient),
            }),
        );
        self.deps.dispatcher.flush(outbox).await;

        Ok(MessageView::for_viewer(&message, request.sender))
    }
}
