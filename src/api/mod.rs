//! API client module for the chat backend

pub mod auth;
pub mod chat;
pub mod client;
mod error;
pub mod users;

use anyhow::{Context, Result};

pub use error::ApiError;

use crate::auth::{require_identity, IdentityStore};
use crate::models::{Content, Direction, UserId};
use client::ChatClient;

/// List the users you can chat with (prints to stdout).
pub async fn list_users<S: IdentityStore>(client: &ChatClient, store: &S) -> Result<()> {
    let me = require_identity(store)?;
    let users = users::list_users(client)
        .await
        .context("Failed to fetch users")?;
    let partners = users::chat_partners(users, &me);

    println!("\nUsers:");
    println!("{:-<40}", "");

    if partners.is_empty() {
        println!("  (nobody else here yet)");
        return Ok(());
    }

    for user in &partners {
        println!("  {:>6}  {}", user.id, user.username);
    }

    Ok(())
}

/// Print the last `limit` messages of the conversation with `partner`.
pub async fn read_messages<S: IdentityStore>(
    client: &ChatClient,
    store: &S,
    partner: UserId,
    limit: usize,
) -> Result<()> {
    let me = require_identity(store)?;
    let conversation = chat::find_or_create_conversation(client, me.id, partner)
        .await
        .context("Failed to find or create conversation")?;
    let history = chat::message_history(client, conversation.id)
        .await
        .context("Failed to fetch messages")?;

    if history.is_empty() {
        println!("(no messages)");
        return Ok(());
    }

    let prefix = client.uploads_prefix();
    let skip = history.len().saturating_sub(limit);
    for msg in history.iter().skip(skip) {
        let arrow = match msg.direction(me.id) {
            Direction::Sent => ">",
            Direction::Received => "<",
        };
        let time = msg
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let content = Content::classify(&msg.content, &prefix);
        println!("{} [{}] {}: {}", arrow, time, msg.user.username, content);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_commands_require_login_before_any_request() {
        let mut server = mockito::Server::new_async().await;
        let any = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let any_post = server
            .mock("POST", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let client = ChatClient::new(server.url());
        let logged_out = Config::default();

        let err = list_users(&client, &logged_out).await.unwrap_err();
        assert!(err.to_string().contains("Not logged in"));
        assert!(read_messages(&client, &logged_out, UserId(2), 20)
            .await
            .is_err());
        any.assert_async().await;
        any_post.assert_async().await;
    }
}
