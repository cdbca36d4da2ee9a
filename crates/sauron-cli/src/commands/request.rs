//! Raw authenticated requests and the foreground refresh loop.

use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use sauron_auth::{ApiResponse, AuthClient, Method};
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// Send an authenticated request to any API path and print the response.
pub async fn request(
    client: &AuthClient,
    method: &str,
    path: &str,
    body: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let method = parse_method(method)?;
    let body = parse_body(body)?;

    let response = client.request(method, path, body.as_ref()).await?;
    print_response(&response, format)
}

/// Parse a `--body` argument as JSON.
pub(super) fn parse_body(body: Option<&str>) -> Result<Option<serde_json::Value>> {
    body.map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("--body must be valid JSON")
}

/// Print status and body. A non-success status is an error after printing.
pub(super) fn print_response(response: &ApiResponse, format: &OutputFormat) -> Result<()> {
    let parsed = serde_json::from_slice::<serde_json::Value>(&response.body).ok();

    match format {
        OutputFormat::Text => {
            println!("HTTP {}", response.status);
            match &parsed {
                Some(json) => println!("{}", serde_json::to_string_pretty(json)?),
                None => println!("{}", response.text()),
            }
        }
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "status": response.status.as_u16(),
            "body": parsed.unwrap_or_else(|| serde_json::Value::String(response.text())),
        }))?,
    }

    if !response.is_success() {
        anyhow::bail!("Request failed with HTTP {}", response.status);
    }
    Ok(())
}

/// Keep the background refresh running until Ctrl-C or until it stops on
/// its own after a failed refresh.
pub async fn watch(client: &AuthClient, format: &OutputFormat) -> Result<()> {
    if !client.resume() {
        anyhow::bail!("Not logged in. Run 'sauron login' first.");
    }

    // Make sure there is an access token to watch.
    if client.store().get_access_token().is_none() {
        client.coordinator().refresh().await?;
    }

    let interval = client.scheduler().config().check_interval;
    output::print_success(
        &format!(
            "Watching session, checking every {}s. Press Ctrl-C to stop.",
            interval.as_secs()
        ),
        format,
    );

    match wait_for_end(tokio::signal::ctrl_c(), || client.scheduler().is_running()).await {
        WatchEnd::Interrupted => {
            info!("Interrupted, stopping refresh scheduler");
            client.scheduler().stop();
            output::print_success("Stopped", format);
            Ok(())
        }
        WatchEnd::SchedulerStopped => anyhow::bail!("Token refresh failed; session ended"),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum WatchEnd {
    Interrupted,
    SchedulerStopped,
}

/// Poll `is_running` every second until it turns false or `shutdown`
/// completes. `shutdown` is polled as one future across ticks.
async fn wait_for_end<F: Future>(shutdown: F, is_running: impl Fn() -> bool) -> WatchEnd {
    tokio::pin!(shutdown);
    let mut poll = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = &mut shutdown => return WatchEnd::Interrupted,
            _ = poll.tick() => {
                if !is_running() {
                    return WatchEnd::SchedulerStopped;
                }
            }
        }
    }
}

fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", method))
}
