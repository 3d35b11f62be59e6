//! Token persistence.
//!
//! A [`TokenStore`] holds the last-known token triple for one repository.
//! Writes replace the whole triple; the last writer wins.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::warn;

use super::tokens::AuthTokens;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Could not determine home directory. Set MODKIT_HOME to override.")]
    NoHome,
}

pub trait TokenStore: Send + Sync {
    /// Current tokens, if any have been stored.
    fn get(&self) -> Result<Option<AuthTokens>, StoreError>;

    /// Replace the stored tokens.
    fn set(&self, tokens: &AuthTokens) -> Result<(), StoreError>;

    /// Forget the stored tokens.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Stores tokens as JSON in a single file, readable only by the owner.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for a repository key: `~/.modkit/tokens/<key>.json`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoHome`] if no home directory can be found.
    pub fn for_repository(key: &str) -> Result<Self, StoreError> {
        let dir = crate::paths::try_tokens_dir().ok_or(StoreError::NoHome)?;
        Ok(Self::new(dir.join(format!("{key}.json"))))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Result<Option<AuthTokens>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(tokens) => Ok(Some(tokens)),
            Err(e) => {
                warn!(
                    "Ignoring unreadable token file {}: {e}",
                    self.path.display()
                );
                Ok(None)
            }
        }
    }

    fn set(&self, tokens: &AuthTokens) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(tokens)?;

        // Atomic write: write to temp file, then rename
        let temp_path = self.path.with_extension("json.tmp");
        write_private(&temp_path, content.as_bytes())?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, content: &[u8]) -> io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // An existing temp file keeps its old mode.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(content)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &[u8]) -> io::Result<()> {
    fs::write(path, content)
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<AuthTokens>>,
}

impl MemoryTokenStore {
    pub fn new(tokens: Option<AuthTokens>) -> Self {
        Self {
            tokens: Mutex::new(tokens),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Result<Option<AuthTokens>, StoreError> {
        Ok(self
            .tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn set(&self, tokens: &AuthTokens) -> Result<(), StoreError> {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tokens(suffix: &str) -> AuthTokens {
        AuthTokens::new(format!("a{suffix}"), format!("i{suffix}"), format!("r{suffix}"))
    }

    #[test]
    fn test_file_store_roundtrip_and_replace() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens/default.json"));

        assert_eq!(store.get().unwrap(), None);

        store.set(&tokens("1")).unwrap();
        store.set(&tokens("2")).unwrap();
        assert_eq!(store.get().unwrap(), Some(tokens("2")));
        assert!(!dir.path().join("tokens/default.json.tmp").exists());

        store.clear().unwrap();
        assert_eq!(store.get().unwrap(), None);
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("default.json"));
        store.set(&tokens("1")).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("default.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(FileTokenStore::new(path).get().unwrap(), None);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::default();
        assert_eq!(store.get().unwrap(), None);
        store.set(&tokens("1")).unwrap();
        assert_eq!(store.get().unwrap(), Some(tokens("1")));
        store.clear().unwrap();
        assert_eq!(store.get().unwrap(), None);
    }
}
