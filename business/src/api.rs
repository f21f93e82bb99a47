//! User-directory data source.
//!
//! Performs the network IO for the directory store and normalizes every failure
//! into [`FetchError`]. Stateless: no retries, no caching.

use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

use crate::http::{Client, Response};
use crate::model::{User, UserId};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("API returned status: {status}")]
    Status { status: u16 },
    #[error("user {id} not found")]
    NotFound { id: UserId },
    #[error("failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Where the directory store gets its users from.
#[async_trait]
pub trait UserSource: Send + Sync + Debug {
    /// All users, in server order.
    async fn fetch_all_users(&self) -> FetchResult<Vec<User>>;

    async fn fetch_user_by_id(&self, id: UserId) -> FetchResult<User>;
}

/// [`UserSource`] backed by the REST endpoints `GET /users` and `GET /users/{id}`.
#[derive(Debug, Clone)]
pub struct HttpUserSource {
    client: Client,
    base_url: String,
}

impl HttpUserSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, url: &str) -> FetchResult<Response> {
        log::debug!("GET {url}");
        self.client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.message))
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    response: &Response,
    what: &'static str,
) -> FetchResult<T> {
    response.json().map_err(|e| FetchError::Decode {
        what,
        message: e.to_string(),
    })
}

#[async_trait]
impl UserSource for HttpUserSource {
    async fn fetch_all_users(&self) -> FetchResult<Vec<User>> {
        let url = format!("{}/users", self.base_url);
        let response = self.get(&url).await?;

        if !response.is_success() {
            return Err(FetchError::Status {
                status: response.status,
            });
        }

        decode(&response, "user list")
    }

    async fn fetch_user_by_id(&self, id: UserId) -> FetchResult<User> {
        let url = format!("{}/users/{id}", self.base_url);
        let response = self.get(&url).await?;

        match response.status {
            404 => Err(FetchError::NotFound { id }),
            _ if !response.is_success() => Err(FetchError::Status {
                status: response.status,
            }),
            _ => decode(&response, "user"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let source = HttpUserSource::new("http://localhost:8080/");
        assert_eq!(source.base_url(), "http://localhost:8080");
    }

    #[test]
    fn errors_render_their_cause() {
        assert_eq!(
            FetchError::Status { status: 503 }.to_string(),
            "API returned status: 503"
        );
        assert_eq!(
            FetchError::NotFound { id: UserId(999) }.to_string(),
            "user 999 not found"
        );
    }
}
