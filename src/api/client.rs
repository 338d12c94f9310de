//! HTTP client for the chat backend
//!
//! Wraps reqwest::Client with the backend base URL and uniform status handling.

use reqwest::multipart::Form;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::ApiError;
use crate::models::uploads_prefix;

/// Client for the backend's REST endpoints. No auth header: the backend
/// trusts the user ids carried in request bodies.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Prefix of URLs the upload endpoint hands out.
    pub fn uploads_prefix(&self) -> String {
        uploads_prefix(&self.base_url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET a JSON document.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        let resp = check_response(resp, &url).await?;
        decode(resp, &url).await
    }

    /// POST a JSON body and decode a JSON answer.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let resp = self.post_raw(&url, body).await?;
        decode(resp, &url).await
    }

    /// POST a JSON body, ignoring whatever comes back on success.
    pub async fn post_json_unit<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let url = self.url(path);
        self.post_raw(&url, body).await?;
        Ok(())
    }

    async fn post_raw<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::Response, ApiError> {
        tracing::debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

        check_response(resp, url).await
    }

    /// POST a multipart form and decode a JSON answer.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        tracing::debug!("POST (multipart) {}", url);

        let resp = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        let resp = check_response(resp, &url).await?;
        decode(resp, &url).await
    }
}

/// Check HTTP response status code and return a clear error on failure.
async fn check_response(resp: reqwest::Response, url: &str) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status,
            url: url.to_string(),
            body,
        });
    }
    Ok(resp)
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response, url: &str) -> Result<T, ApiError> {
    resp.json().await.map_err(|source| ApiError::Decode {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ChatClient::new("http://localhost:3000/");
        assert_eq!(client.base_url(), "http://localhost:3000");
        assert_eq!(client.url("/users"), "http://localhost:3000/users");
        assert_eq!(client.uploads_prefix(), "http://localhost:3000/uploads/");
    }

    #[tokio::test]
    async fn test_status_error_keeps_code_and_body() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/users")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let client = ChatClient::new(server.url());
        let err = client
            .get_json::<serde_json::Value>("/users")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        assert!(err.to_string().contains("HTTP 503"));
        assert!(err.to_string().contains("maintenance"));
    }

    #[tokio::test]
    async fn test_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/users")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = ChatClient::new(server.url());
        let err = client
            .get_json::<serde_json::Value>("/users")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
        assert_eq!(err.status(), None);
    }
}
