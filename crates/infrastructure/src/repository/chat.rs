use application::ChatRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    seed_text, Chat, ChatId, ChatMessage, MessageId, MessageText, ParticipantPair, PostContent,
    PostId, RepositoryError, Timestamp, UserId,
};
use sqlx::FromRow;
use uuid::Uuid;

use super::{invalid_data, map_sqlx_err, Db};

const CHAT_COLUMNS: &str = "id, user_low, user_high, post_id, last_message, created_at, updated_at";

#[derive(Debug, FromRow)]
struct ChatRecord {
    id: Uuid,
    user_low: Uuid,
    user_high: Uuid,
    post_id: Option<Uuid>,
    last_message: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    sender_id: Uuid,
    text: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRecord> for ChatMessage {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let text = MessageText::new(value.text).map_err(|err| invalid_data(err.to_string()))?;
        Ok(ChatMessage {
            id: MessageId::from(value.id),
            sender: UserId::from(value.sender_id),
            text,
            created_at: value.created_at,
        })
    }
}

impl ChatRecord {
    fn into_chat(self, messages: Vec<ChatMessage>) -> Result<Chat, RepositoryError> {
        let participants =
            ParticipantPair::new(UserId::from(self.user_low), UserId::from(self.user_high))
                .map_err(|err| invalid_data(err.to_string()))?;
        Ok(Chat {
            id: ChatId::from(self.id),
            participants,
            post_id: self.post_id.map(PostId::from),
            messages,
            last_message: self.last_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PgChatRepository {
    db: Db,
}

impl PgChatRepository {
    pub(crate) fn new(db: Db) -> Self {
        Self { db }
    }

    async fn load_messages(&self, chat: Uuid) -> Result<Vec<ChatMessage>, RepositoryError> {
        sqlx::query_as::<_, MessageRecord>(
            "SELECT id, sender_id, text, created_at FROM chat_messages \
             WHERE chat_id = $1 ORDER BY seq",
        )
        .bind(chat)
        .fetch_all(&self.db.pool)
        .await
        .map_err(map_sqlx_err)?
        .into_iter()
        .map(ChatMessage::try_from)
        .collect()
    }

    async fn load_where(
        &self,
        filter: &str,
        binds: (Uuid, Option<Uuid>),
    ) -> Result<Option<Chat>, RepositoryError> {
        let sql = format!("SELECT {CHAT_COLUMNS} FROM chats WHERE {filter}");
        self.db
            .run(async {
                let mut query = sqlx::query_as::<_, ChatRecord>(&sql).bind(binds.0);
                if let Some(second) = binds.1 {
                    query = query.bind(second);
                }
                let Some(record) = query
                    .fetch_optional(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)?
                else {
                    return Ok(None);
                };
                let messages = self.load_messages(record.id).await?;
                record.into_chat(messages).map(Some)
            })
            .await
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn create(&self, chat: Chat) -> Result<Chat, RepositoryError> {
        self.db
            .run(async {
                let mut tx = self.db.pool.begin().await.map_err(map_sqlx_err)?;
                sqlx::query(
                    r#"
                    INSERT INTO chats (id, user_low, user_high, post_id, last_message, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(Uuid::from(chat.id))
                .bind(Uuid::from(chat.participants.low()))
                .bind(Uuid::from(chat.participants.high()))
                .bind(chat.post_id.map(Uuid::from))
                .bind(&chat.last_message)
                .bind(chat.created_at)
                .bind(chat.updated_at)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;

                for message in &chat.messages {
                    sqlx::query(
                        "INSERT INTO chat_messages (id, chat_id, sender_id, text, created_at) \
                         VALUES ($1, $2, $3, $4, $5)",
                    )
                    .bind(Uuid::from(message.id))
                    .bind(Uuid::from(chat.id))
                    .bind(Uuid::from(message.sender))
                    .bind(message.text.as_str())
                    .bind(message.created_at)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_err)?;
                }

                tx.commit().await.map_err(map_sqlx_err)
            })
            .await?;
        Ok(chat)
    }

    async fn find_by_id(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError> {
        self.load_where("id = $1", (Uuid::from(id), None)).await
    }

    async fn find_by_pair(&self, pair: ParticipantPair) -> Result<Option<Chat>, RepositoryError> {
        self.load_where(
            "user_low = $1 AND user_high = $2",
            (Uuid::from(pair.low()), Some(Uuid::from(pair.high()))),
        )
        .await
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Chat>, RepositoryError> {
        let sql = format!(
            "SELECT {CHAT_COLUMNS} FROM chats \
             WHERE user_low = $1 OR user_high = $1 \
             ORDER BY updated_at DESC"
        );
        let records = self
            .db
            .run(async {
                sqlx::query_as::<_, ChatRecord>(&sql)
                    .bind(Uuid::from(user))
                    .fetch_all(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)
            })
            .await?;
        records
            .into_iter()
            .map(|record| record.into_chat(Vec::new()))
            .collect()
    }

    async fn backfill_post(
        &self,
        id: ChatId,
        post: PostId,
        content: &PostContent,
        at: Timestamp,
    ) -> Result<Chat, RepositoryError> {
        let updated = self
            .db
            .run(async {
                sqlx::query(
                    r#"
                    UPDATE chats
                    SET post_id = $2, last_message = $3, updated_at = $4
                    WHERE id = $1 AND post_id IS NULL
                    "#,
                )
                .bind(Uuid::from(id))
                .bind(Uuid::from(post))
                .bind(seed_text(content))
                .bind(at)
                .execute(&self.db.pool)
                .await
                .map_err(map_sqlx_err)
            })
            .await?;
        if updated.rows_affected() == 0 {
            tracing::debug!(chat_id = %id, "会话已关联帖子，跳过补充");
        }
        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn append_message(
        &self,
        id: ChatId,
        message: ChatMessage,
    ) -> Result<(), RepositoryError> {
        self.db
            .run(async {
                let mut tx = self.db.pool.begin().await.map_err(map_sqlx_err)?;
                let touched = sqlx::query(
                    "UPDATE chats SET last_message = $2, updated_at = $3 WHERE id = $1",
                )
                .bind(Uuid::from(id))
                .bind(message.text.as_str())
                .bind(message.created_at)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;
                if touched.rows_affected() == 0 {
                    return Err(RepositoryError::NotFound);
                }

                sqlx::query(
                    "INSERT INTO chat_messages (id, chat_id, sender_id, text, created_at) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(Uuid::from(message.id))
                .bind(Uuid::from(id))
                .bind(Uuid::from(message.sender))
                .bind(message.text.as_str())
                .bind(message.created_at)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;

                tx.commit().await.map_err(map_sqlx_err)
            })
            .await
    }
}
