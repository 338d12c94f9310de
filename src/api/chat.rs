//! Conversation, history and upload endpoints

use std::path::Path;

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::client::ChatClient;
use super::ApiError;
use crate::models::{Conversation, ConversationId, ConversationPair, Message, UserId};

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Find the one-on-one conversation between two users, creating it if needed.
pub async fn find_or_create_conversation(
    client: &ChatClient,
    me: UserId,
    other: UserId,
) -> Result<Conversation, ApiError> {
    let body = ConversationPair {
        user1_id: me,
        user2_id: other,
    };
    client
        .post_json("/chat/conversation/find-or-create", &body)
        .await
}

/// Full message history of a conversation, oldest first.
pub async fn message_history(
    client: &ChatClient,
    conversation: ConversationId,
) -> Result<Vec<Message>, ApiError> {
    client
        .get_json(&format!("/chat/conversation/{}", conversation))
        .await
}

/// Upload a file and return the URL the backend serves it from.
pub async fn upload_file(client: &ChatClient, path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    tracing::debug!(
        "Uploading {} ({} bytes, {})",
        file_name,
        bytes.len(),
        mime
    );

    let part = Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime.as_ref())
        .context("Invalid upload content type")?;
    let form = Form::new().part("file", part);

    let resp: UploadResponse = client.post_multipart("/chat/upload", form).await?;
    Ok(resp.url)
}
