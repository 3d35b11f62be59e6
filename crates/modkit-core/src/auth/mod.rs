//! Repository authentication.

mod authenticator;
mod browser;
mod channel;
mod store;
mod tokens;

pub use authenticator::{RepositoryAuthenticator, TokenStatus};
pub use browser::{BrowserLauncher, SystemBrowser};
pub use channel::{HttpLoginChannel, LoginChannel, LoginError, LoginSession};
pub use store::{FileTokenStore, MemoryTokenStore, StoreError, TokenStore};
pub use tokens::{AuthTokens, expires_at, is_valid_token};

use reqwest::header::InvalidHeaderValue;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication cancelled")]
    Cancelled,

    #[error("Interactive login failed: {0}")]
    Login(#[source] LoginError),

    #[error("Token storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Identity token is not a valid header value: {0}")]
    Header(#[from] InvalidHeaderValue),
}

impl From<LoginError> for AuthError {
    fn from(e: LoginError) -> Self {
        match e {
            LoginError::Cancelled => Self::Cancelled,
            other => Self::Login(other),
        }
    }
}
