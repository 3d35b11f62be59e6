pub mod auth;
pub mod config;
pub mod packaging;
pub mod paths;
pub mod provider;

pub use auth::{AuthError, AuthTokens, RepositoryAuthenticator};
pub use config::{AuthOptions, Settings};
pub use packaging::{BuildSystem, PackageOutcome, PackagingContext, PackagingError, package};
pub use paths::*;

/// User Agent string for repository requests
pub const USER_AGENT: &str = concat!("modkit-core/", env!("CARGO_PKG_VERSION"));
