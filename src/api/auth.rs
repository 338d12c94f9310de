//! Authentication endpoints

use super::client::ChatClient;
use super::ApiError;
use crate::models::{Credentials, Identity};

pub async fn login(client: &ChatClient, creds: &Credentials) -> Result<Identity, ApiError> {
    client.post_json("/auth/login", creds).await
}

/// The signup endpoint answers with an empty body; only the status matters.
pub async fn signup(client: &ChatClient, creds: &Credentials) -> Result<(), ApiError> {
    client.post_json_unit("/auth/signup", creds).await
}
