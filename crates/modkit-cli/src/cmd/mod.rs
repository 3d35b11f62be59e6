pub mod login;
pub mod logout;
pub mod package;
pub mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use modkit_core::auth::{BrowserLauncher, FileTokenStore, RepositoryAuthenticator, SystemBrowser};
use modkit_core::config::Settings;

/// Authenticator for a configured repository key, storing tokens under
/// `~/.modkit/tokens`.
pub(crate) fn authenticator(repository: &str) -> Result<RepositoryAuthenticator> {
    let settings = Settings::load_default().context("Failed to load config.toml")?;
    let options = settings.auth_options(repository)?;
    let store = FileTokenStore::for_repository(repository)?;

    Ok(RepositoryAuthenticator::new(options, Arc::new(store))
        .with_browser(Arc::new(AnnouncingBrowser)))
}

/// Prints the login URL before handing it to the system browser, so it can
/// be opened by hand on headless machines.
#[derive(Debug)]
struct AnnouncingBrowser;

impl BrowserLauncher for AnnouncingBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        println!("Opening your browser to log in. If it does not open, visit:\n  {url}");
        SystemBrowser.open(url)
    }
}
