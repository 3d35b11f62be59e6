//! Login command
use anyhow::{Context, Result};
use modkit_core::auth::expires_at;
use tokio_util::sync::CancellationToken;

/// Ensure valid credentials for `repository`, logging in through the
/// browser if needed. Ctrl-C cancels a pending login.
pub async fn login(repository: &str) -> Result<()> {
    let auth = super::authenticator(repository)?;

    let ct = CancellationToken::new();
    let on_interrupt = ct.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let tokens = auth
        .tokens(&ct)
        .await
        .with_context(|| format!("Failed to log in to '{repository}'"))?;

    match expires_at(&tokens.id_token) {
        Some(exp) => println!(
            "Logged in to '{repository}' (valid until {})",
            exp.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
        ),
        None => println!("Logged in to '{repository}'"),
    }
    Ok(())
}
