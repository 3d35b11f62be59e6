//! Status command to report stored credential validity
use anyhow::Result;
use chrono::{DateTime, Local, Utc};

/// Print whether the stored tokens for `repository` are usable. Never
/// touches the network.
pub fn status(repository: &str) -> Result<()> {
    let auth = super::authenticator(repository)?;

    let Some(status) = auth.status()? else {
        println!("'{repository}': not logged in");
        return Ok(());
    };

    println!("'{repository}':");
    println!(
        "  identity token  {}",
        describe(status.id_token_valid, status.id_token_expires)
    );
    println!(
        "  refresh token   {}",
        describe(status.refresh_token_valid, status.refresh_token_expires)
    );
    if !status.id_token_valid && !status.refresh_token_valid {
        println!("Run `modkit login --repository {repository}` to log in again.");
    }
    Ok(())
}

fn describe(valid: bool, expires: Option<DateTime<Utc>>) -> String {
    let when = expires.map(|exp| {
        exp.with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string()
    });
    match (valid, when) {
        (true, Some(when)) => format!("valid until {when}"),
        (false, Some(when)) => format!("expired {when}"),
        (_, None) => "unreadable".to_string(),
    }
}
