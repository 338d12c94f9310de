//! Async backend: runs HTTP calls off the UI loop.
//!
//! The UI sends `BackendCommand` values over an mpsc channel. A background
//! tokio task runs each one on its own task and sends a `BackendResponse`
//! back, so the UI stays interactive while requests are outstanding.

use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::api::{chat, client::ChatClient, users};
use crate::models::{Conversation, ConversationId, Message, User, UserId};

/// Commands sent from the UI loop to the backend.
#[derive(Debug)]
pub enum BackendCommand {
    LoadUsers,
    ResolveConversation {
        seq: u64,
        me: UserId,
        partner: UserId,
    },
    LoadHistory(ConversationId),
    Upload {
        conversation: ConversationId,
        path: PathBuf,
    },
}

/// Responses from the backend to the UI.
#[derive(Debug)]
pub enum BackendResponse {
    Users(Result<Vec<User>>),
    Conversation {
        seq: u64,
        result: Result<Conversation>,
    },
    History {
        conversation: ConversationId,
        result: Result<Vec<Message>>,
    },
    Uploaded {
        conversation: ConversationId,
        result: Result<String>,
    },
}

/// UI-side handle of the backend task.
pub struct Backend {
    cmd_tx: mpsc::UnboundedSender<BackendCommand>,
    resp_rx: mpsc::UnboundedReceiver<BackendResponse>,
}

impl Backend {
    pub fn start(client: ChatClient) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();

        tokio::spawn(backend_loop(client, cmd_rx, resp_tx));

        Self { cmd_tx, resp_rx }
    }

    /// Send a command to the backend (non-blocking).
    pub fn send(&self, cmd: BackendCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("Backend channel closed -- command dropped");
        }
    }

    /// Next response. `None` only once the backend task is gone.
    pub async fn recv(&mut self) -> Option<BackendResponse> {
        self.resp_rx.recv().await
    }
}

async fn backend_loop(
    client: ChatClient,
    mut cmd_rx: mpsc::UnboundedReceiver<BackendCommand>,
    resp_tx: mpsc::UnboundedSender<BackendResponse>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        let client = client.clone();
        let resp_tx = resp_tx.clone();

        // No timeouts and no cancellation: every request runs to completion.
        tokio::spawn(async move {
            let response = execute(&client, cmd).await;
            let _ = resp_tx.send(response);
        });
    }
}

async fn execute(client: &ChatClient, cmd: BackendCommand) -> BackendResponse {
    match cmd {
        BackendCommand::LoadUsers => {
            BackendResponse::Users(users::list_users(client).await.map_err(Into::into))
        }
        BackendCommand::ResolveConversation { seq, me, partner } => {
            let result = chat::find_or_create_conversation(client, me, partner)
                .await
                .map_err(Into::into);
            BackendResponse::Conversation { seq, result }
        }
        BackendCommand::LoadHistory(conversation) => {
            let result = chat::message_history(client, conversation)
                .await
                .map_err(Into::into);
            BackendResponse::History {
                conversation,
                result,
            }
        }
        BackendCommand::Upload { conversation, path } => {
            let result = chat::upload_file(client, &path).await;
            BackendResponse::Uploaded {
                conversation,
                result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_conversation_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/conversation/find-or-create")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":12}"#)
            .create_async()
            .await;

        let mut backend = Backend::start(ChatClient::new(server.url()));
        backend.send(BackendCommand::ResolveConversation {
            seq: 4,
            me: UserId(1),
            partner: UserId(2),
        });

        match backend.recv().await {
            Some(BackendResponse::Conversation { seq, result }) => {
                assert_eq!(seq, 4);
                assert_eq!(result.unwrap().id, ConversationId(12));
            }
            other => panic!("unexpected response: {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_history_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/chat/conversation/12")
            .with_status(500)
            .create_async()
            .await;

        let mut backend = Backend::start(ChatClient::new(server.url()));
        backend.send(BackendCommand::LoadHistory(ConversationId(12)));

        match backend.recv().await {
            Some(BackendResponse::History {
                conversation,
                result,
            }) => {
                assert_eq!(conversation, ConversationId(12));
                assert!(result.is_err());
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }
}
