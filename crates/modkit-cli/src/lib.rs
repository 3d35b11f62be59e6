//! modkit - module packaging and repository credentials
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! # Directory Layout
//!
//! ```text
//! ~/.modkit/
//! ├── config.toml     # [repositories.<key>] endpoints
//! └── tokens/
//!     └── <key>.json  # stored token triple (0600)
//! ```

pub mod cmd;

use clap::{Parser, Subcommand};
use modkit_core::config::DEFAULT_REPOSITORY;
use modkit_schema::Provider;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "modkit")]
#[command(author, version, about = "modkit - package and publish cloud automation modules")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build and archive a module for one or more providers
    Package {
        /// Module directory containing module.json
        #[arg(long, default_value = ".")]
        module_dir: PathBuf,
        /// Provider to package (aws, azure, googlecloud, kubernetes). Defaults to
        /// every provider folder with a module-package.json
        #[arg(long = "provider", short = 'p')]
        providers: Vec<Provider>,
        /// Stream build command output instead of writing it to the build log
        #[arg(short, long)]
        verbose: bool,
    },
    /// Log in to a module repository
    Login {
        /// Repository key from config.toml
        #[arg(long, env = "MODKIT_REPOSITORY", default_value = DEFAULT_REPOSITORY)]
        repository: String,
    },
    /// Forget stored credentials for a module repository
    Logout {
        /// Repository key from config.toml
        #[arg(long, env = "MODKIT_REPOSITORY", default_value = DEFAULT_REPOSITORY)]
        repository: String,
    },
    /// Show whether stored credentials are still valid
    Status {
        /// Repository key from config.toml
        #[arg(long, env = "MODKIT_REPOSITORY", default_value = DEFAULT_REPOSITORY)]
        repository: String,
    },
}
