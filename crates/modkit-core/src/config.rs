//! Repository authentication settings.
//!
//! Settings live in `~/.modkit/config.toml`, one table per logical client
//! key:
//!
//! ```toml
//! [repositories.default]
//! token_url = "https://auth.example.com/oauth2/token"
//! client_id = "abc123"
//! login_url = "https://modules.example.com/login"
//! callback_url = "https://modules.example.com/auth-callback"
//! ```
//!
//! Each field can be overridden with `MODKIT_TOKEN_URL`, `MODKIT_CLIENT_ID`,
//! `MODKIT_LOGIN_URL` and `MODKIT_CALLBACK_URL`. When all four are set, no
//! config file entry is needed.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Client key used when none is given.
pub const DEFAULT_REPOSITORY: &str = "default";

/// Errors that can occur when loading settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML or does not match the schema.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// No settings exist for the requested client key.
    #[error(
        "No repository '{0}' configured. Add [repositories.{0}] to config.toml or set \
         MODKIT_TOKEN_URL, MODKIT_CLIENT_ID, MODKIT_LOGIN_URL and MODKIT_CALLBACK_URL"
    )]
    UnknownRepository(String),

    /// Neither `MODKIT_HOME` nor a home directory is available.
    #[error("Could not determine home directory. Set MODKIT_HOME to override.")]
    NoHome,
}

/// Endpoints and client settings for one module repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthOptions {
    /// OAuth token endpoint used for the refresh exchange.
    pub token_url: String,
    /// OAuth client id.
    pub client_id: String,
    /// Browser login page.
    pub login_url: String,
    /// Out-of-band callback endpoint the login page delivers tokens to.
    #[serde(alias = "web_socket_callback_url")]
    pub callback_url: String,
    /// Extra refresh attempts when the token endpoint is unreachable.
    #[serde(default)]
    pub refresh_retries: u32,
    /// Delay between callback polls while waiting for a login.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl AuthOptions {
    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    fn with_env_overrides(base: Option<Self>) -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        match base {
            Some(mut options) => {
                if let Some(v) = var("MODKIT_TOKEN_URL") {
                    options.token_url = v;
                }
                if let Some(v) = var("MODKIT_CLIENT_ID") {
                    options.client_id = v;
                }
                if let Some(v) = var("MODKIT_LOGIN_URL") {
                    options.login_url = v;
                }
                if let Some(v) = var("MODKIT_CALLBACK_URL") {
                    options.callback_url = v;
                }
                Some(options)
            }
            None => Some(Self {
                token_url: var("MODKIT_TOKEN_URL")?,
                client_id: var("MODKIT_CLIENT_ID")?,
                login_url: var("MODKIT_LOGIN_URL")?,
                callback_url: var("MODKIT_CALLBACK_URL")?,
                refresh_retries: 0,
                poll_interval_ms: default_poll_interval_ms(),
            }),
        }
    }
}

/// Top-level settings parsed from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Repository settings by client key.
    #[serde(default)]
    pub repositories: BTreeMap<String, AuthOptions>,
}

impl Settings {
    /// Parse settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the content is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from `path`. A missing file yields empty settings so
    /// that environment-only setups work.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load settings from the default location (`~/.modkit/config.toml`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHome`] if no home directory can be found, or
    /// any error from [`Settings::load`].
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = crate::paths::try_config_path().ok_or(ConfigError::NoHome)?;
        Self::load(&path)
    }

    /// Resolve the options for a client key, applying environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownRepository`] if the key is not
    /// configured and the environment does not supply every endpoint.
    pub fn auth_options(&self, key: &str) -> Result<AuthOptions, ConfigError> {
        AuthOptions::with_env_overrides(self.repositories.get(key).cloned())
            .ok_or_else(|| ConfigError::UnknownRepository(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
        [repositories.default]
        token_url = "https://auth.example.com/oauth2/token"
        client_id = "abc123"
        login_url = "https://modules.example.com/login"
        callback_url = "https://modules.example.com/auth-callback"

        [repositories.staging]
        token_url = "https://auth.staging.example.com/oauth2/token"
        client_id = "def456"
        login_url = "https://staging.example.com/login"
        web_socket_callback_url = "https://staging.example.com/auth-callback"
        refresh_retries = 2
        poll_interval_ms = 250
    "#;

    #[test]
    fn test_parse_repositories() {
        let settings = Settings::parse(SAMPLE).unwrap();
        assert_eq!(settings.repositories.len(), 2);

        let default = &settings.repositories["default"];
        assert_eq!(default.client_id, "abc123");
        assert_eq!(default.refresh_retries, 0);
        assert_eq!(default.poll_interval(), Duration::from_secs(1));

        let staging = &settings.repositories["staging"];
        assert_eq!(
            staging.callback_url,
            "https://staging.example.com/auth-callback"
        );
        assert_eq!(staging.refresh_retries, 2);
        assert_eq!(staging.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("config.toml")).unwrap();
        assert!(settings.repositories.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert!(settings.repositories.contains_key("staging"));
    }

    #[test]
    fn test_invalid_toml() {
        let err = Settings::parse("[repositories.default]\ntoken_url = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
