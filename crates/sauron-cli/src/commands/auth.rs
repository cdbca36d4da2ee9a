//! Authentication commands.

use super::{read_new_password, read_password, value_or_prompt};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use sauron_auth::{AuthClient, AuthStatus};
use sauron_storage::UserProfile;

/// Create an account and log in.
pub async fn signup(
    client: &AuthClient,
    email: Option<String>,
    name: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let email = value_or_prompt(email, "Email: ", "Email")?;
    let name = value_or_prompt(name, "Name: ", "Name")?;
    let password = read_new_password("Password: ")?;

    let user = client.signup(&email, &password, &name).await?;
    client.scheduler().stop();

    output::print_success(&format!("Account created. Logged in as {}", display_name(&user)), format);
    Ok(())
}

/// Login with email and password.
pub async fn login(client: &AuthClient, email: Option<String>, format: &OutputFormat) -> Result<()> {
    if client.store().is_authenticated() {
        let who = client
            .store()
            .get_user()
            .map(|user| display_name(&user))
            .unwrap_or_else(|| "unknown".to_string());
        output::print_success(&format!("Already logged in as {}", who), format);
        return Ok(());
    }

    let email = value_or_prompt(email, "Email: ", "Email")?;
    let password = read_password("Password: ")?;

    if *format == OutputFormat::Text {
        println!("Logging in...");
    }

    let user = client.login(&email, &password).await?;
    // One-shot process: nothing left to keep fresh.
    client.scheduler().stop();

    output::print_success(&format!("Logged in as {}", display_name(&user)), format);
    Ok(())
}

/// Logout and clear session.
pub async fn logout(client: &AuthClient, format: &OutputFormat) -> Result<()> {
    if !client.store().is_authenticated() {
        output::print_success("Not logged in", format);
        return Ok(());
    }

    // The access token is per-process; obtain one so the server can revoke.
    if client.store().get_access_token().is_none() {
        if let Err(e) = client.coordinator().refresh().await {
            tracing::debug!(error = %e, "Could not refresh before logout");
        }
    }

    client.logout().await;
    output::print_success("Logged out successfully", format);
    Ok(())
}

/// Show local session state.
pub async fn status(client: &AuthClient, format: &OutputFormat) -> Result<()> {
    let status = client.status();

    match format {
        OutputFormat::Text => print_status(&status),
        OutputFormat::Json => output::print_json(&status)?,
    }
    Ok(())
}

fn print_status(status: &AuthStatus) {
    if !status.authenticated {
        println!("Auth:     not logged in");
        return;
    }

    println!("Auth:     logged in");
    if let Some(user) = &status.user {
        println!("User:     {}", display_name(user));
        if let Some(role) = &user.role {
            println!("Role:     {}", role);
        }
    }
    match status.access_expires_at {
        Some(expires_at) => println!("Expires:  {}", expires_at.to_rfc3339()),
        None => println!("Expires:  refreshed on next request"),
    }
}

/// "Name <email>" or just the name.
pub(crate) fn display_name(user: &UserProfile) -> String {
    match &user.email {
        Some(email) => format!("{} <{}>", user.name, email),
        None => user.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        let mut user = UserProfile::named("Ada");
        assert_eq!(display_name(&user), "Ada");

        user.email = Some("ada@example.com".to_string());
        assert_eq!(display_name(&user), "Ada <ada@example.com>");
    }
}
