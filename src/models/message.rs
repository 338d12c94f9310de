//! Message-related models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Conversation, ConversationId, User, UserId};

/// Chat message as delivered by the history endpoint and `receiveMessage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub id: Option<i64>,
    pub content: String,
    pub user: User,
    /// Absent on some history payloads.
    #[serde(default)]
    pub conversation: Option<Conversation>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn conversation_id(&self) -> Option<ConversationId> {
        self.conversation.as_ref().map(|c| c.id)
    }

    /// Sent or received, relative to the local user.
    pub fn direction(&self, me: UserId) -> Direction {
        if self.user.id == me {
            Direction::Sent
        } else {
            Direction::Received
        }
    }
}

/// Which side of the conversation a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

/// Payload of the `sendMessage` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub content: String,
    pub user_id: UserId,
    pub conversation_id: ConversationId,
}
