//! Conversation-related models

use std::fmt;

use serde::{Deserialize, Serialize};

use super::UserId;

/// Opaque numeric conversation handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub i64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One-on-one conversation. The backend returns more fields; only the id matters here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
}

/// Body of the find-or-create request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPair {
    pub user1_id: UserId,
    pub user2_id: UserId,
}
