//! CLI command implementations.

mod account;
mod auth;
mod catalog;
mod request;

pub use account::{change_password, create_admin, me, profile};
pub use catalog::{
    dsa_create, dsa_delete, dsa_list, dsa_show, dsa_update, health, products_create,
    products_delete, products_list, products_show, products_update, progress_leaderboard,
    progress_mark, progress_show, progress_stats,
};
pub use auth::{login, logout, signup, status};
pub use request::{request, watch};

use anyhow::Result;
use sauron_auth::AuthClient;
use sauron_config_and_utils::{Config, Paths};
use sauron_storage::{FileStorage, MemoryStorage, TokenStore};
use std::io::{self, Write};
use std::sync::Arc;

/// Build a client for the configured API.
///
/// The access token lives only for this process; the refresh token and the
/// cached profile persist in the durable store under the base directory.
pub fn build_client(paths: &Paths, config: &Config) -> Result<AuthClient> {
    let store = TokenStore::new(
        Arc::new(MemoryStorage::new()),
        Arc::new(FileStorage::new(paths.durable_store_file())),
    );
    let client = AuthClient::from_config(config, Arc::new(store))?;
    client.on_session_expired(Arc::new(|| {
        eprintln!("Session ended. Run 'sauron login' to sign in again.");
    }));
    Ok(client)
}

/// Read one trimmed line after printing `label`.
fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Use `value` if given, otherwise prompt for it. Empty input is an error.
fn value_or_prompt(value: Option<String>, label: &str, field: &str) -> Result<String> {
    let value = match value {
        Some(value) => value.trim().to_string(),
        None => prompt(label)?,
    };
    if value.is_empty() {
        anyhow::bail!("{} is required", field);
    }
    Ok(value)
}

/// Read a password without echo. Empty input is an error.
fn read_password(label: &str) -> Result<String> {
    let password = rpassword::prompt_password(label)?;
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }
    Ok(password)
}

/// Read a new password twice.
fn read_new_password(label: &str) -> Result<String> {
    let password = read_password(label)?;
    let confirmation = rpassword::prompt_password("Confirm password: ")?;
    if password != confirmation {
        anyhow::bail!("Passwords do not match");
    }
    Ok(password)
}
