//! Logout command
use anyhow::Result;
use modkit_core::auth::{FileTokenStore, TokenStore};

/// Remove stored tokens for `repository`. Works without a configured
/// repository so stale credentials can always be dropped.
pub fn logout(repository: &str) -> Result<()> {
    let store = FileTokenStore::for_repository(repository)?;
    store.clear()?;
    println!("Logged out of '{repository}'");
    Ok(())
}
