use dirs::home_dir;
use std::path::PathBuf;

/// Returns the modkit home directory, or None if the user's home cannot be resolved.
pub fn try_modkit_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("MODKIT_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".modkit"))
}

/// Configuration file: ~/.modkit/config.toml
pub fn try_config_path() -> Option<PathBuf> {
    try_modkit_home().map(|h| h.join("config.toml"))
}

/// Token storage directory: ~/.modkit/tokens
pub fn try_tokens_dir() -> Option<PathBuf> {
    try_modkit_home().map(|h| h.join("tokens"))
}

/// Name of the scratch folder inside each provider folder. Excluded from
/// additional-file globs.
pub const PUBLISH_DIR: &str = ".publish";
