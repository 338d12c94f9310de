//! UI intents and the effects their transitions request.
//!
//! The session never performs I/O. Every transition returns the effects the
//! shell (TUI or command) must carry out, and results come back through the
//! `ChatSession::on_*` methods.

use std::path::PathBuf;

use crate::models::{ConversationId, OutgoingMessage, UserId};

/// Something the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    SelectUser(UserId),
    Send(String),
    Attach(PathBuf),
    /// Leave the current chat and show the user list.
    Back,
    Logout,
    Resize { width: u16, height: u16 },
}

/// Work requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Find or create the conversation with `partner`; answer with `on_conversation`.
    ResolveConversation { seq: u64, partner: UserId },
    JoinRoom(ConversationId),
    /// Fetch history; answer with `on_history`.
    FetchHistory(ConversationId),
    Publish(OutgoingMessage),
    /// Upload a file; answer with `on_upload`.
    Upload {
        conversation: ConversationId,
        path: PathBuf,
    },
    /// Persist the resume partner.
    RememberPartner(Option<UserId>),
    Logout,
    /// Blocking notice the user must dismiss.
    Alert(String),
}
