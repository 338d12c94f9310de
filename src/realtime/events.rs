//! Real-time events exchanged with the backend

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use super::packet::SocketPacket;
use crate::models::{ConversationId, Message, OutgoingMessage};

const JOIN_ROOM: &str = "joinRoom";
const SEND_MESSAGE: &str = "sendMessage";
const RECEIVE_MESSAGE: &str = "receiveMessage";

/// Events the client emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    JoinRoom(ConversationId),
    SendMessage(OutgoingMessage),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JoinRoomPayload {
    conversation_id: ConversationId,
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom(_) => JOIN_ROOM,
            ClientEvent::SendMessage(_) => SEND_MESSAGE,
        }
    }

    fn payload(&self) -> Result<Value> {
        let value = match self {
            ClientEvent::JoinRoom(conversation_id) => serde_json::to_value(JoinRoomPayload {
                conversation_id: *conversation_id,
            }),
            ClientEvent::SendMessage(msg) => serde_json::to_value(msg),
        };
        value.context("Failed to encode event payload")
    }

    pub fn to_packet(&self) -> Result<SocketPacket> {
        Ok(SocketPacket::Event {
            name: self.name().to_string(),
            args: vec![self.payload()?],
            ack_id: None,
        })
    }
}

/// Events the client listens for.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    ReceiveMessage(Message),
    /// Anything else the server broadcasts; ignored.
    Other(String),
}

impl ServerEvent {
    pub fn from_event(name: &str, mut args: Vec<Value>) -> Result<Self> {
        if name != RECEIVE_MESSAGE {
            return Ok(ServerEvent::Other(name.to_string()));
        }
        let payload = if args.is_empty() {
            Value::Null
        } else {
            args.swap_remove(0)
        };
        let message: Message =
            serde_json::from_value(payload).context("Malformed receiveMessage payload")?;
        Ok(ServerEvent::ReceiveMessage(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;
    use serde_json::json;

    #[test]
    fn test_join_room_frame() {
        let packet = ClientEvent::JoinRoom(ConversationId(8)).to_packet().unwrap();
        assert_eq!(packet.to_frame(), r#"42["joinRoom",{"conversationId":8}]"#);
    }

    #[test]
    fn test_send_message_frame() {
        let event = ClientEvent::SendMessage(OutgoingMessage {
            content: "hi".into(),
            user_id: UserId(1),
            conversation_id: ConversationId(8),
        });
        let packet = event.to_packet().unwrap();
        match packet {
            SocketPacket::Event { name, args, .. } => {
                assert_eq!(name, "sendMessage");
                assert_eq!(
                    args[0],
                    json!({"content": "hi", "userId": 1, "conversationId": 8})
                );
            }
            other => panic!("expected event, got {:?}", other),
        }
    }

    #[test]
    fn test_receive_message() {
        let args = vec![json!({
            "id": 3,
            "content": "yo",
            "user": {"id": 2, "username": "bo"},
            "conversation": {"id": 8}
        })];
        match ServerEvent::from_event("receiveMessage", args).unwrap() {
            ServerEvent::ReceiveMessage(msg) => {
                assert_eq!(msg.content, "yo");
                assert_eq!(msg.conversation_id(), Some(ConversationId(8)));
            }
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[test]
    fn test_other_event_ignored() {
        assert_eq!(
            ServerEvent::from_event("userTyping", vec![]).unwrap(),
            ServerEvent::Other("userTyping".into())
        );
    }

    #[test]
    fn test_malformed_receive_message() {
        assert!(ServerEvent::from_event("receiveMessage", vec![json!({"nope": 1})]).is_err());
    }
}
