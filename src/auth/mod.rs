//! Account commands: signup, login, logout and status.
//!
//! Login stores the identity returned by the backend in the config file;
//! every chat command reads it back through [`IdentityStore`].

pub mod identity;

use anyhow::{Context, Result};
use dialoguer::{Input, Password};
use reqwest::StatusCode;

pub use identity::{require_identity, IdentityStore};

use crate::api::{self, client::ChatClient, ApiError};
use crate::config::Config;
use crate::models::{Credentials, Identity};

/// Account errors. The Display text is what the user sees.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Login failed. Please check your username and password.")]
    LoginFailed(#[source] ApiError),
    #[error("This username is already taken. Please choose another.")]
    UsernameTaken,
    #[error("An error occurred during signup.")]
    SignupFailed(#[source] ApiError),
    #[error("Not logged in. Run 'duochat login' first.")]
    NotLoggedIn,
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

fn validate(creds: &Credentials) -> Result<(), AuthError> {
    if creds.username.trim().is_empty() {
        return Err(AuthError::EmptyField("Username"));
    }
    if creds.password.is_empty() {
        return Err(AuthError::EmptyField("Password"));
    }
    Ok(())
}

/// Fill in whatever the command line left out by prompting on the terminal.
fn prompt_credentials(username: Option<String>, password: Option<String>) -> Result<Credentials> {
    let username = match username {
        Some(u) => u,
        None => Input::new()
            .with_prompt("Username")
            .interact_text()
            .context("Failed to read username")?,
    };
    let password = match password {
        Some(p) => p,
        None => Password::new()
            .with_prompt("Password")
            .interact()
            .context("Failed to read password")?,
    };
    Ok(Credentials {
        username: username.trim().to_string(),
        password,
    })
}

/// Log in and persist the returned identity.
pub async fn login_with<S: IdentityStore>(
    client: &ChatClient,
    store: &mut S,
    creds: &Credentials,
) -> Result<Identity> {
    validate(creds)?;

    let identity = api::auth::login(client, creds)
        .await
        .map_err(AuthError::LoginFailed)?;

    // A different account must not inherit the previous account's resume partner.
    let previous = store.identity();
    if previous.map_or(true, |p| p.id != identity.id) {
        store.set_resume_partner(None);
    }
    store.set_identity(identity.clone());
    store.persist()?;

    tracing::info!("Logged in as {} (id {})", identity.username, identity.id);
    Ok(identity)
}

/// Create an account. Does not log in.
pub async fn signup_with(client: &ChatClient, creds: &Credentials) -> Result<(), AuthError> {
    validate(creds)?;

    match api::auth::signup(client, creds).await {
        Ok(()) => Ok(()),
        Err(e) if e.status() == Some(StatusCode::CONFLICT) => Err(AuthError::UsernameTaken),
        Err(e) => {
            tracing::debug!("Signup failed: {:#}", e);
            Err(AuthError::SignupFailed(e))
        }
    }
}

/// Clear the persisted identity.
pub fn logout_with<S: IdentityStore>(store: &mut S) -> Result<()> {
    store.clear_identity();
    store.persist()
}

/// `duochat login`
pub async fn login(
    client: &ChatClient,
    config: &mut Config,
    username: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let creds = prompt_credentials(username, password)?;
    let identity = login_with(client, config, &creds).await?;
    println!("Logged in as {}. Run 'duochat chat' to start chatting.", identity.username);
    Ok(())
}

/// `duochat signup`
pub async fn signup(
    client: &ChatClient,
    username: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let creds = prompt_credentials(username, password)?;
    signup_with(client, &creds).await?;
    println!("Signup successful! Please log in.");
    Ok(())
}

/// `duochat logout`
pub fn logout(config: &mut Config) -> Result<()> {
    logout_with(config)?;
    println!("Logged out.");
    Ok(())
}

/// `duochat status`
pub fn status(config: &Config, backend_url: &str) -> Result<()> {
    println!();
    println!("Backend:  {}", backend_url);
    match config.identity() {
        Some(identity) => {
            println!("User:     {} (id {})", identity.username, identity.id);
            match config.resume_partner() {
                Some(partner) => println!("Resume:   user {}", partner),
                None => println!("Resume:   (none)"),
            }
        }
        None => println!("User:     not logged in"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    fn temp_config() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        (dir, config)
    }

    #[tokio::test]
    async fn test_login_persists_identity() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/auth/login")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "username": "ana",
                "password": "pw"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 12, "username": "ana", "password": "hash"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = ChatClient::new(server.url());
        let (dir, mut config) = temp_config();
        config.set_resume_partner(Some(UserId(99)));

        let identity = login_with(&client, &mut config, &creds("ana", "pw"))
            .await
            .unwrap();
        m.assert_async().await;

        assert_eq!(identity.id, UserId(12));
        let reloaded = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(reloaded.identity(), Some(identity));
        // New account, so the stale resume partner is gone.
        assert_eq!(reloaded.resume_partner(), None);
    }

    #[tokio::test]
    async fn test_login_failure_message() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_body("Unauthorized")
            .create_async()
            .await;

        let client = ChatClient::new(server.url());
        let (_dir, mut config) = temp_config();
        let err = login_with(&client, &mut config, &creds("ana", "bad"))
            .await
            .unwrap_err();

        let auth = err.downcast_ref::<AuthError>().unwrap();
        assert!(matches!(auth, AuthError::LoginFailed(_)));
        assert_eq!(
            auth.to_string(),
            "Login failed. Please check your username and password."
        );
        assert!(config.identity().is_none());
    }

    #[tokio::test]
    async fn test_signup_conflict_reports_username_taken() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/auth/signup")
            .with_status(409)
            .create_async()
            .await;

        let client = ChatClient::new(server.url());
        let err = signup_with(&client, &creds("ana", "pw")).await.unwrap_err();
        assert!(matches!(err, AuthError::UsernameTaken));
        assert!(err.to_string().contains("already taken"));
    }

    #[tokio::test]
    async fn test_signup_other_failure_is_generic() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/auth/signup")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = ChatClient::new(server.url());
        let err = signup_with(&client, &creds("ana", "pw")).await.unwrap_err();
        assert!(matches!(err, AuthError::SignupFailed(_)));
        assert_eq!(err.to_string(), "An error occurred during signup.");
    }

    #[tokio::test]
    async fn test_signup_success() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/auth/signup")
            .with_status(201)
            .expect(1)
            .create_async()
            .await;

        let client = ChatClient::new(server.url());
        assert!(signup_with(&client, &creds("ana", "pw")).await.is_ok());
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_fields_rejected_without_request() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/auth/signup")
            .expect(0)
            .create_async()
            .await;

        let client = ChatClient::new(server.url());
        let err = signup_with(&client, &creds("  ", "pw")).await.unwrap_err();
        assert!(matches!(err, AuthError::EmptyField("Username")));
        m.assert_async().await;
    }

    #[test]
    fn test_logout_clears_identity() {
        let (dir, mut config) = temp_config();
        config.set_identity(Identity {
            id: UserId(1),
            username: "ana".into(),
        });
        config.persist().unwrap();

        logout_with(&mut config).unwrap();

        let reloaded = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert!(matches!(
            require_identity(&reloaded),
            Err(AuthError::NotLoggedIn)
        ));
    }
}
