//! modkit CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use modkit_cli::cmd;
use modkit_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Package {
            module_dir,
            providers,
            verbose,
        } => cmd::package::package(&module_dir, &providers, verbose),
        Commands::Login { repository } => cmd::login::login(&repository).await,
        Commands::Logout { repository } => cmd::logout::logout(&repository),
        Commands::Status { repository } => cmd::status::status(&repository),
    }
}
