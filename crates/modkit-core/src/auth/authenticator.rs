//! Bearer credential lifecycle for one module repository.
//!
//! [`RepositoryAuthenticator::authenticate`] attaches a valid identity token
//! to an outgoing request. A stored token is used as-is while it is valid;
//! otherwise the refresh token is exchanged at the token endpoint, and when
//! that is not possible the user logs in through the browser.
//!
//! A failed refresh is never an error. Only the interactive login can fail
//! or be cancelled.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, Url};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::browser::{BrowserLauncher, SystemBrowser};
use super::channel::{HttpLoginChannel, LoginChannel, LoginError, LoginSession};
use super::store::TokenStore;
use super::tokens::{AuthTokens, expires_at, is_valid_token};
use super::AuthError;
use crate::config::AuthOptions;

/// Result of one refresh exchange.
#[derive(Debug)]
enum RefreshOutcome {
    Issued(AuthTokens),
    /// The endpoint answered, but not with usable tokens.
    Rejected(String),
    /// The endpoint could not be reached.
    Unreachable(reqwest::Error),
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    id_token: Option<String>,
}

/// Validity of the stored tokens, without touching the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStatus {
    pub id_token_valid: bool,
    pub id_token_expires: Option<DateTime<Utc>>,
    pub refresh_token_valid: bool,
    pub refresh_token_expires: Option<DateTime<Utc>>,
}

pub struct RepositoryAuthenticator {
    options: AuthOptions,
    client: Client,
    store: Arc<dyn TokenStore>,
    channel: Arc<dyn LoginChannel>,
    custom_channel: bool,
    browser: Arc<dyn BrowserLauncher>,
}

impl RepositoryAuthenticator {
    /// Authenticator using the HTTP login channel and the system browser.
    pub fn new(options: AuthOptions, store: Arc<dyn TokenStore>) -> Self {
        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());
        let channel = Arc::new(HttpLoginChannel::new(
            client.clone(),
            options.poll_interval(),
        ));

        Self {
            options,
            client,
            store,
            channel,
            custom_channel: false,
            browser: Arc::new(SystemBrowser),
        }
    }

    /// Use `client` for the token endpoint and, unless a channel was set
    /// with [`with_login_channel`](Self::with_login_channel), for the login
    /// callback too.
    pub fn with_client(mut self, client: Client) -> Self {
        if !self.custom_channel {
            self.channel = Arc::new(HttpLoginChannel::new(
                client.clone(),
                self.options.poll_interval(),
            ));
        }
        self.client = client;
        self
    }

    pub fn with_login_channel(mut self, channel: Arc<dyn LoginChannel>) -> Self {
        self.channel = channel;
        self.custom_channel = true;
        self
    }

    pub fn with_browser(mut self, browser: Arc<dyn BrowserLauncher>) -> Self {
        self.browser = browser;
        self
    }

    /// Attach `Authorization: Bearer <idToken>` to `request`, refreshing or
    /// logging in first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Cancelled`] if `ct` fires, or an error if the
    /// interactive login or token storage fails.
    pub async fn authenticate(
        &self,
        request: &mut reqwest::Request,
        ct: &CancellationToken,
    ) -> Result<(), AuthError> {
        let tokens = self.tokens(ct).await?;
        let value = HeaderValue::from_str(&format!("Bearer {}", tokens.id_token))?;
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }

    /// A token triple whose identity token is valid now.
    ///
    /// # Errors
    ///
    /// Same as [`authenticate`](Self::authenticate).
    pub async fn tokens(&self, ct: &CancellationToken) -> Result<AuthTokens, AuthError> {
        let stored = self.store.get()?;

        match stored {
            Some(tokens) if is_valid_token(&tokens.id_token) => {
                debug!("Using stored identity token");
                return Ok(tokens);
            }
            Some(tokens) if is_valid_token(&tokens.refresh_token) => {
                if let Some(refreshed) = self.refresh(&tokens.refresh_token, ct).await? {
                    self.store.set(&refreshed)?;
                    return Ok(refreshed);
                }
            }
            Some(_) => debug!("Stored refresh token is not usable"),
            None => debug!("No stored tokens"),
        }

        let tokens = self.login(ct).await?;
        self.store.set(&tokens)?;
        Ok(tokens)
    }

    /// Forget the stored tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be cleared.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.store.clear()?;
        Ok(())
    }

    /// Validity of the stored tokens, or `None` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn status(&self) -> Result<Option<TokenStatus>, AuthError> {
        Ok(self.store.get()?.map(|tokens| TokenStatus {
            id_token_valid: is_valid_token(&tokens.id_token),
            id_token_expires: expires_at(&tokens.id_token),
            refresh_token_valid: is_valid_token(&tokens.refresh_token),
            refresh_token_expires: expires_at(&tokens.refresh_token),
        }))
    }

    /// Exchange `refresh_token` for new tokens. `None` means the caller
    /// should fall back to an interactive login.
    async fn refresh(
        &self,
        refresh_token: &str,
        ct: &CancellationToken,
    ) -> Result<Option<AuthTokens>, AuthError> {
        let mut attempt = 0;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = ct.cancelled() => return Err(AuthError::Cancelled),
                outcome = self.exchange(refresh_token) => outcome,
            };

            match outcome {
                RefreshOutcome::Issued(tokens) => {
                    info!("Refreshed repository tokens");
                    return Ok(Some(tokens));
                }
                RefreshOutcome::Rejected(reason) => {
                    warn!("Token refresh failed: {reason}");
                    return Ok(None);
                }
                RefreshOutcome::Unreachable(e) if attempt < self.options.refresh_retries => {
                    attempt += 1;
                    debug!(
                        "Token endpoint unreachable ({e}), retry {attempt}/{}",
                        self.options.refresh_retries
                    );
                }
                RefreshOutcome::Unreachable(e) => {
                    warn!("Token endpoint unreachable: {e}");
                    return Ok(None);
                }
            }
        }
    }

    async fn exchange(&self, refresh_token: &str) -> RefreshOutcome {
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.options.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];

        let response = match self
            .client
            .post(&self.options.token_url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .form(&form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return RefreshOutcome::Unreachable(e),
        };

        let status = response.status();
        if !status.is_success() {
            return RefreshOutcome::Rejected(format!("token endpoint returned {status}"));
        }

        let body: TokenResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => return RefreshOutcome::Rejected(format!("invalid token response: {e}")),
        };

        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        match (non_empty(body.access_token), non_empty(body.id_token)) {
            (Some(access), Some(id)) => {
                RefreshOutcome::Issued(AuthTokens::new(access, id, refresh_token))
            }
            _ => RefreshOutcome::Rejected(
                "token response is missing access_token or id_token".to_string(),
            ),
        }
    }

    async fn login(&self, ct: &CancellationToken) -> Result<AuthTokens, AuthError> {
        let mut session = self.channel.start(&self.options.callback_url, ct).await?;
        let result = self.complete_login(session.as_mut(), ct).await;
        session.close().await;
        Ok(result?)
    }

    async fn complete_login(
        &self,
        session: &mut dyn LoginSession,
        ct: &CancellationToken,
    ) -> Result<AuthTokens, LoginError> {
        let url = login_url(&self.options.login_url, session.connection_id())?;

        info!("Opening browser for login");
        if let Err(e) = self.browser.open(url.as_str()) {
            warn!("Could not open a browser ({e}); open {url} to log in");
        }

        session.wait_for_tokens(ct).await
    }
}

/// `<loginUrl>?authCallbackId=<id>`, keeping any existing query.
fn login_url(base: &str, connection_id: &str) -> Result<Url, LoginError> {
    let mut url = Url::parse(base).map_err(|_| LoginError::InvalidUrl(base.to_string()))?;
    url.query_pairs_mut()
        .append_pair("authCallbackId", connection_id);
    Ok(url)
}
