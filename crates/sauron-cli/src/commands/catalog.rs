//! Problem set, progress and product catalog commands.
//!
//! Catalog reads go out without credentials. Writes and everything under
//! progress go through the authenticated client.

use super::request::{parse_body, print_response};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use sauron_auth::{ApiRequest, AuthClient, Method};

async fn send_public(client: &AuthClient, request: ApiRequest, format: &OutputFormat) -> Result<()> {
    let response = client.send_public(request).await?;
    print_response(&response, format)
}

async fn send_authenticated(
    client: &AuthClient,
    request: ApiRequest,
    format: &OutputFormat,
) -> Result<()> {
    let response = client.fetch(request).await?;
    print_response(&response, format)
}

/// Request carrying a raw JSON `--body`.
fn with_body(method: Method, url: String, body: &str) -> Result<ApiRequest> {
    let request = ApiRequest::new(method, url);
    match parse_body(Some(body))? {
        Some(body) => Ok(request.json(&body)?),
        None => Ok(request),
    }
}

pub async fn dsa_list(client: &AuthClient, level: Option<&str>, format: &OutputFormat) -> Result<()> {
    let url = match level {
        Some(level) => client.endpoints().dsa_by_level(level),
        None => client.endpoints().dsa(),
    };
    send_public(client, ApiRequest::get(url), format).await
}

pub async fn dsa_show(client: &AuthClient, id: &str, format: &OutputFormat) -> Result<()> {
    send_public(client, ApiRequest::get(client.endpoints().dsa_item(id)), format).await
}

pub async fn dsa_create(client: &AuthClient, body: &str, format: &OutputFormat) -> Result<()> {
    let request = with_body(Method::POST, client.endpoints().dsa(), body)?;
    send_authenticated(client, request, format).await
}

pub async fn dsa_update(
    client: &AuthClient,
    id: &str,
    body: &str,
    format: &OutputFormat,
) -> Result<()> {
    let request = with_body(Method::PUT, client.endpoints().dsa_item(id), body)?;
    send_authenticated(client, request, format).await
}

pub async fn dsa_delete(client: &AuthClient, id: &str, format: &OutputFormat) -> Result<()> {
    let request = ApiRequest::new(Method::DELETE, client.endpoints().dsa_item(id));
    send_authenticated(client, request, format).await
}

pub async fn progress_show(client: &AuthClient, format: &OutputFormat) -> Result<()> {
    send_authenticated(client, ApiRequest::get(client.endpoints().progress()), format).await
}

pub async fn progress_stats(client: &AuthClient, format: &OutputFormat) -> Result<()> {
    let request = ApiRequest::get(client.endpoints().progress_stats());
    send_authenticated(client, request, format).await
}

pub async fn progress_leaderboard(client: &AuthClient, format: &OutputFormat) -> Result<()> {
    let request = ApiRequest::get(client.endpoints().progress_leaderboard());
    send_authenticated(client, request, format).await
}

/// Mark a problem solved (`solved = true`) or unsolved.
pub async fn progress_mark(
    client: &AuthClient,
    problem_id: &str,
    level: &str,
    solved: bool,
    format: &OutputFormat,
) -> Result<()> {
    let url = if solved {
        client.endpoints().progress_solve()
    } else {
        client.endpoints().progress_unsolve()
    };
    let request = ApiRequest::post(url).json(&progress_body(problem_id, level))?;
    send_authenticated(client, request, format).await
}

fn progress_body(problem_id: &str, level: &str) -> serde_json::Value {
    serde_json::json!({ "problemId": problem_id, "level": level })
}

pub async fn products_list(
    client: &AuthClient,
    category: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let url = match category {
        Some(category) => client.endpoints().tech_products_by_category(category),
        None => client.endpoints().tech_products(),
    };
    send_public(client, ApiRequest::get(url), format).await
}

pub async fn products_show(client: &AuthClient, id: &str, format: &OutputFormat) -> Result<()> {
    send_public(client, ApiRequest::get(client.endpoints().tech_product(id)), format).await
}

pub async fn products_create(client: &AuthClient, body: &str, format: &OutputFormat) -> Result<()> {
    let request = with_body(Method::POST, client.endpoints().tech_products(), body)?;
    send_authenticated(client, request, format).await
}

pub async fn products_update(
    client: &AuthClient,
    id: &str,
    body: &str,
    format: &OutputFormat,
) -> Result<()> {
    let request = with_body(Method::PUT, client.endpoints().tech_product(id), body)?;
    send_authenticated(client, request, format).await
}

pub async fn products_delete(client: &AuthClient, id: &str, format: &OutputFormat) -> Result<()> {
    let request = ApiRequest::new(Method::DELETE, client.endpoints().tech_product(id));
    send_authenticated(client, request, format).await
}

/// Check the API is up. Needs no login.
pub async fn health(client: &AuthClient, format: &OutputFormat) -> Result<()> {
    let body = client.health().await?;
    match format {
        OutputFormat::Text => {
            println!("API healthy at {}", client.endpoints().base());
            if !body.is_null() {
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
        }
        OutputFormat::Json => output::print_json(&body)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_body_sets_json() {
        let url = "http://api.test/api/dsa/p1".to_string();
        let request = with_body(Method::PUT, url, r#"{"title":"Two Sum"}"#).unwrap();

        assert_eq!(request.method, Method::PUT);
        assert_eq!(request.body.as_deref(), Some(r#"{"title":"Two Sum"}"#));
        assert!(with_body(Method::POST, "http://api.test/api/dsa".to_string(), "nope").is_err());
    }

    #[test]
    fn test_progress_body() {
        assert_eq!(
            progress_body("p1", "Beginner"),
            json!({ "problemId": "p1", "level": "Beginner" })
        );
    }
}
