//! Out-of-band login channel.
//!
//! The login page in the browser delivers tokens to a callback endpoint,
//! keyed by a correlation id the CLI allocates. [`HttpLoginChannel`]
//! registers that id and long-polls the endpoint until tokens arrive:
//!
//! | Request | Meaning |
//! |---|---|
//! | `POST <callback>` `{"connectionId": id}` | register the session |
//! | `GET <callback>/<id>` | `200` tokens, `202`/`204`/`404` pending |
//! | `DELETE <callback>/<id>` | tear down (best effort) |

use std::time::Duration;

use async_trait::async_trait;
use rand::RngCore;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::tokens::AuthTokens;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Login cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Login callback returned unexpected status {0}")]
    Status(StatusCode),

    #[error("Login callback delivered incomplete tokens")]
    IncompleteTokens,

    #[error("Invalid login URL '{0}'")]
    InvalidUrl(String),
}

/// Opens a callback channel for one interactive login.
#[async_trait]
pub trait LoginChannel: Send + Sync {
    async fn start(
        &self,
        callback_url: &str,
        ct: &CancellationToken,
    ) -> Result<Box<dyn LoginSession>, LoginError>;
}

/// One open callback channel. Callers must [`close`](LoginSession::close) it
/// whatever the outcome.
#[async_trait]
pub trait LoginSession: Send {
    /// Correlation id the login page must report tokens under.
    fn connection_id(&self) -> &str;

    /// Suspend until tokens arrive on the channel.
    async fn wait_for_tokens(&mut self, ct: &CancellationToken) -> Result<AuthTokens, LoginError>;

    async fn close(&mut self);
}

/// Long-polling login channel over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpLoginChannel {
    client: Client,
    poll_interval: Duration,
}

impl HttpLoginChannel {
    pub fn new(client: Client, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval,
        }
    }
}

#[async_trait]
impl LoginChannel for HttpLoginChannel {
    async fn start(
        &self,
        callback_url: &str,
        ct: &CancellationToken,
    ) -> Result<Box<dyn LoginSession>, LoginError> {
        let connection_id = new_connection_id();
        let base = callback_url.trim_end_matches('/');

        let register = self
            .client
            .post(base)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .json(&serde_json::json!({ "connectionId": connection_id }))
            .send();

        let response = tokio::select! {
            _ = ct.cancelled() => return Err(LoginError::Cancelled),
            response = register => response?,
        };
        if !response.status().is_success() {
            return Err(LoginError::Status(response.status()));
        }

        debug!("Registered login callback {connection_id}");
        Ok(Box::new(HttpLoginSession {
            client: self.client.clone(),
            url: format!("{base}/{connection_id}"),
            connection_id,
            poll_interval: self.poll_interval,
            closed: false,
        }))
    }
}

struct HttpLoginSession {
    client: Client,
    url: String,
    connection_id: String,
    poll_interval: Duration,
    closed: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallbackPayload {
    #[serde(alias = "access_token")]
    access_token: Option<String>,
    #[serde(alias = "id_token")]
    id_token: Option<String>,
    #[serde(alias = "refresh_token")]
    refresh_token: Option<String>,
}

impl CallbackPayload {
    fn into_tokens(self) -> Result<AuthTokens, LoginError> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        match (
            non_empty(self.access_token),
            non_empty(self.id_token),
            non_empty(self.refresh_token),
        ) {
            (Some(access), Some(id), Some(refresh)) => Ok(AuthTokens::new(access, id, refresh)),
            _ => Err(LoginError::IncompleteTokens),
        }
    }
}

#[async_trait]
impl LoginSession for HttpLoginSession {
    fn connection_id(&self) -> &str {
        &self.connection_id
    }

    async fn wait_for_tokens(&mut self, ct: &CancellationToken) -> Result<AuthTokens, LoginError> {
        loop {
            let poll = self
                .client
                .get(&self.url)
                .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
                .send();

            let response = tokio::select! {
                _ = ct.cancelled() => return Err(LoginError::Cancelled),
                response = poll => response?,
            };

            match response.status() {
                StatusCode::OK => {
                    let payload: CallbackPayload = response.json().await?;
                    return payload.into_tokens();
                }
                StatusCode::ACCEPTED | StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => {}
                status => return Err(LoginError::Status(status)),
            }

            tokio::select! {
                _ = ct.cancelled() => return Err(LoginError::Cancelled),
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let request = self
            .client
            .delete(&self.url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send();
        match tokio::time::timeout(CLOSE_TIMEOUT, request).await {
            Ok(Ok(_)) => debug!("Closed login callback {}", self.connection_id),
            Ok(Err(e)) => debug!("Failed to close login callback: {e}"),
            Err(_) => debug!("Timed out closing login callback"),
        }
    }
}

/// Random 128-bit correlation id, hex encoded.
fn new_connection_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
