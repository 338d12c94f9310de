//! The message view: what the chat pane shows.

use chrono::{DateTime, Utc};

use crate::models::{Content, Direction, Message, UserId};

pub const PLACEHOLDER_TEXT: &str = "Select a user to chat";
pub const LOADING_TEXT: &str = "Loading messages...";
pub const CHAT_ERROR_TEXT: &str = "Error loading chat.";
pub const HISTORY_ERROR_TEXT: &str = "Could not load message history.";

/// A message ready for display: direction and content kind decided once.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: Option<i64>,
    pub sender: String,
    pub direction: Direction,
    pub content: Content,
    pub sent_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn from_message(msg: Message, me: UserId, uploads_prefix: &str) -> Self {
        let direction = msg.direction(me);
        let content = Content::classify(&msg.content, uploads_prefix);
        Self {
            id: msg.id,
            sender: msg.user.username,
            direction,
            content,
            sent_at: msg.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageView {
    /// No conversation selected.
    Idle,
    Loading,
    Messages(Vec<ChatMessage>),
    Error(&'static str),
}

impl MessageView {
    pub fn messages(&self) -> &[ChatMessage] {
        match self {
            MessageView::Messages(msgs) => msgs,
            _ => &[],
        }
    }

    /// Placeholder text for views without messages.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            MessageView::Idle => Some(PLACEHOLDER_TEXT),
            MessageView::Loading => Some(LOADING_TEXT),
            MessageView::Error(text) => Some(text),
            MessageView::Messages(_) => None,
        }
    }
}
