//! Account commands. All of these need a session.

use super::auth::display_name;
use super::{read_new_password, read_password, value_or_prompt};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use sauron_auth::AuthClient;
use sauron_storage::UserProfile;

/// Fetch and show the current user.
pub async fn me(client: &AuthClient, format: &OutputFormat) -> Result<()> {
    client.require_auth()?;
    let user = client.current_user().await?;

    match format {
        OutputFormat::Text => print_user(&user),
        OutputFormat::Json => output::print_json(&user)?,
    }
    Ok(())
}

/// Change the display name.
pub async fn profile(client: &AuthClient, name: &str, format: &OutputFormat) -> Result<()> {
    client.require_auth()?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Name is required");
    }

    let user = client.update_profile(name).await?;
    output::print_success(&format!("Profile updated: {}", display_name(&user)), format);
    Ok(())
}

/// Change the password.
pub async fn change_password(client: &AuthClient, format: &OutputFormat) -> Result<()> {
    client.require_auth()?;
    let current = read_password("Current password: ")?;
    let new = read_new_password("New password: ")?;
    if current == new {
        anyhow::bail!("New password must differ from the current password");
    }

    client.change_password(&current, &new).await?;
    output::print_success("Password changed", format);
    Ok(())
}

/// Create an administrator account.
pub async fn create_admin(
    client: &AuthClient,
    email: Option<String>,
    name: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    client.require_auth()?;
    // Advisory only; the server enforces the role.
    let cached_admin = client.store().get_user().map(|user| user.is_admin());
    if *format == OutputFormat::Text && cached_admin == Some(false) {
        eprintln!("Warning: your cached profile is not an admin; the server may refuse");
    }

    let email = value_or_prompt(email, "Admin email: ", "Email")?;
    let name = value_or_prompt(name, "Admin name: ", "Name")?;
    let password = read_new_password("Admin password: ")?;

    client.create_admin(&email, &password, &name).await?;
    output::print_success(&format!("Admin account created for {}", email), format);
    Ok(())
}

fn print_user(user: &UserProfile) {
    output::print_heading("Account");
    output::print_row("Name", &user.name);
    if let Some(email) = &user.email {
        output::print_row("Email", email);
    }
    if let Some(role) = &user.role {
        output::print_row("Role", role);
    }
    if let Some(id) = &user.id {
        output::print_row("ID", id);
    }
    if let Some(created_at) = &user.created_at {
        output::print_row("Member since", created_at);
    }
}
