//! User directory endpoint

use super::client::ChatClient;
use super::ApiError;
use crate::models::{Identity, User};

/// Fetch the full user directory.
pub async fn list_users(client: &ChatClient) -> Result<Vec<User>, ApiError> {
    client.get_json("/users").await
}

/// Directory entries a user can chat with: everyone but themselves.
pub fn chat_partners(users: Vec<User>, me: &Identity) -> Vec<User> {
    users.into_iter().filter(|u| !me.is(u.id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;

    #[tokio::test]
    async fn test_list_users_excluding_self() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/users")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":1,"username":"ana"},{"id":2,"username":"bo"},{"id":3,"username":"cy"}]"#)
            .create_async()
            .await;

        let client = ChatClient::new(server.url());
        let users = list_users(&client).await.unwrap();
        assert_eq!(users.len(), 3);

        let me = Identity {
            id: UserId(2),
            username: "bo".into(),
        };
        let names: Vec<String> = chat_partners(users, &me)
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["ana", "cy"]);
    }
}
