use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{ChatId, MessageId, MessageText, PostContent, PostId, Timestamp, UserId};

/// 无帖子关联的新会话的默认摘要。
pub const CHAT_STARTED: &str = "Chat started";

const SEED_EXCERPT_CHARS: usize = 50;

/// 关联帖子时写入的第一条消息。
pub fn seed_text(content: &PostContent) -> String {
    format!(
        "Chat started for post: {}...",
        content.excerpt(SEED_EXCERPT_CHARS)
    )
}

/// 无序的参与者二元组，同时作为会话去重键。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantPair {
    low: UserId,
    high: UserId,
}

impl ParticipantPair {
    pub fn new(a: UserId, b: UserId) -> Result<Self, DomainError> {
        if a == b {
            return Err(DomainError::invalid_argument(
                "recipientId",
                "Cannot create chat with yourself",
            ));
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Ok(Self { low, high })
    }

    pub fn low(&self) -> UserId {
        self.low
    }

    pub fn high(&self) -> UserId {
        self.high
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.low == user || self.high == user
    }

    /// 另一方；`user` 不是参与者时返回 `None`。
    pub fn other(&self, user: UserId) -> Option<UserId> {
        if user == self.low {
            Some(self.high)
        } else if user == self.high {
            Some(self.low)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender: UserId,
    pub text: MessageText,
    pub created_at: Timestamp,
}

impl ChatMessage {
    pub fn new(sender: UserId, text: MessageText, now: Timestamp) -> Self {
        Self {
            id: MessageId::generate(),
            sender,
            text,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub participants: ParticipantPair,
    pub post_id: Option<PostId>,
    pub messages: Vec<ChatMessage>,
    pub last_message: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Chat {
    /// 新建会话。关联帖子时由 `starter` 写入一条种子消息。
    pub fn start(
        id: ChatId,
        participants: ParticipantPair,
        starter: UserId,
        post: Option<(PostId, &PostContent)>,
        now: Timestamp,
    ) -> Self {
        let (post_id, messages, last_message) = match post {
            Some((post_id, content)) => {
                let text = seed_text(content);
                let message = ChatMessage::new(starter, MessageText::seeded(text.clone()), now);
                (Some(post_id), vec![message], text)
            }
            None => (None, Vec::new(), CHAT_STARTED.to_owned()),
        };

        Self {
            id,
            participants,
            post_id,
            messages,
            last_message,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_participant(&self, user: UserId) -> bool {
        self.participants.contains(user)
    }

    pub fn ensure_participant(&self, user: UserId) -> Result<(), DomainError> {
        if self.is_participant(user) {
            Ok(())
        } else {
            Err(DomainError::NotChatParticipant)
        }
    }

    pub fn counterparty(&self, user: UserId) -> Option<UserId> {
        self.participants.other(user)
    }

    /// 给早先没有帖子的会话补上帖子。已有帖子时不做修改，返回 `false`。
    pub fn backfill_post(&mut self, post_id: PostId, content: &PostContent, now: Timestamp) -> bool {
        if self.post_id.is_some() {
            return false;
        }
        self.post_id = Some(post_id);
        self.last_message = seed_text(content);
        self.updated_at = now;
        true
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.last_message = message.text.as_str().to_owned();
        self.updated_at = message.created_at;
        self.messages.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn pair_is_unordered() {
        let a = UserId::generate();
        let b = UserId::generate();
        assert_eq!(
            ParticipantPair::new(a, b).unwrap(),
            ParticipantPair::new(b, a).unwrap()
        );
        assert!(ParticipantPair::new(a, a).is_err());
    }

    #[test]
    fn seed_text_truncates_to_fifty_characters() {
        let content = PostContent::new("a".repeat(80)).unwrap();
        assert_eq!(
            seed_text(&content),
            format!("Chat started for post: {}...", "a".repeat(50))
        );

        let short = PostContent::new("Lunch?").unwrap();
        assert_eq!(seed_text(&short), "Chat started for post: Lunch?...");
    }

    #[test]
    fn start_with_post_seeds_a_message_from_starter() {
        let (a, b) = (UserId::generate(), UserId::generate());
        let pair = ParticipantPair::new(a, b).unwrap();
        let content = PostContent::new("Hiking on Saturday").unwrap();
        let post_id = PostId::generate();

        let chat = Chat::start(ChatId::generate(), pair, a, Some((post_id, &content)), Utc::now());

        assert_eq!(chat.post_id, Some(post_id));
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(chat.messages[0].sender, a);
        assert_eq!(chat.last_message, "Chat started for post: Hiking on Saturday...");
    }

    #[test]
    fn start_without_post_has_empty_log() {
        let (a, b) = (UserId::generate(), UserId::generate());
        let chat = Chat::start(
            ChatId::generate(),
            ParticipantPair::new(a, b).unwrap(),
            a,
            None,
            Utc::now(),
        );
        assert!(chat.messages.is_empty());
        assert_eq!(chat.last_message, CHAT_STARTED);
        assert_eq!(chat.counterparty(a), Some(b));
        assert_eq!(chat.counterparty(UserId::generate()), None);
    }

    #[test]
    fn backfill_only_applies_once() {
        let (a, b) = (UserId::generate(), UserId::generate());
        let start = Utc::now();
        let mut chat = Chat::start(
            ChatId::generate(),
            ParticipantPair::new(a, b).unwrap(),
            a,
            None,
            start,
        );
        let content = PostContent::new("Board games tonight").unwrap();
        let first = PostId::generate();
        let later = start + Duration::minutes(5);

        assert!(chat.backfill_post(first, &content, later));
        assert_eq!(chat.post_id, Some(first));
        assert_eq!(chat.updated_at, later);
        assert!(chat.messages.is_empty());

        assert!(!chat.backfill_post(PostId::generate(), &content, later));
        assert_eq!(chat.post_id, Some(first));
    }

    #[test]
    fn append_updates_summary() {
        let (a, b) = (UserId::generate(), UserId::generate());
        let mut chat = Chat::start(
            ChatId::generate(),
            ParticipantPair::new(a, b).unwrap(),
            a,
            None,
            Utc::now(),
        );
        let at = Utc::now() + Duration::seconds(1);
        chat.append(ChatMessage::new(b, MessageText::new(" hey ").unwrap(), at));
        assert_eq!(chat.last_message, "hey");
        assert_eq!(chat.updated_at, at);
    }
}
