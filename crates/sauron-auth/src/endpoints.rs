//! REST endpoint URLs.
//!
//! Identifiers are interpolated as given; reqwest percent-encodes the URL
//! when the request is built.

use crate::AuthResult;
use sauron_config_and_utils::Config;

/// Builds the API's endpoint URLs from one base.
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    base: String,
}

impl ApiEndpoints {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Endpoints for the configured, validated base URL.
    pub fn from_config(config: &Config) -> AuthResult<Self> {
        config.api_base_url()?;
        Ok(Self::new(config.api_base()))
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Absolute URL for an arbitrary API path.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base, path)
        } else {
            format!("{}/{}", self.base, path)
        }
    }

    fn auth(&self, action: &str) -> String {
        format!("{}/api/auth/{}", self.base, action)
    }

    pub fn signup(&self) -> String {
        self.auth("signup")
    }

    pub fn login(&self) -> String {
        self.auth("login")
    }

    pub fn refresh(&self) -> String {
        self.auth("refresh")
    }

    pub fn logout(&self) -> String {
        self.auth("logout")
    }

    pub fn me(&self) -> String {
        self.auth("me")
    }

    pub fn profile(&self) -> String {
        self.auth("profile")
    }

    pub fn change_password(&self) -> String {
        self.auth("change-password")
    }

    pub fn create_admin(&self) -> String {
        self.auth("create-admin")
    }

    fn api(&self, path: &str) -> String {
        format!("{}/api/{}", self.base, path)
    }

    /// Problem list; also the create endpoint.
    pub fn dsa(&self) -> String {
        self.api("dsa")
    }

    pub fn dsa_by_level(&self, level: &str) -> String {
        self.api(&format!("dsa/level/{}", level))
    }

    /// Single problem; fetch, update and delete.
    pub fn dsa_item(&self, id: &str) -> String {
        self.api(&format!("dsa/{}", id))
    }

    /// The caller's solved problems.
    pub fn progress(&self) -> String {
        self.api("progress")
    }

    pub fn progress_stats(&self) -> String {
        self.api("progress/stats")
    }

    pub fn progress_leaderboard(&self) -> String {
        self.api("progress/leaderboard")
    }

    pub fn progress_solve(&self) -> String {
        self.api("progress/solve")
    }

    pub fn progress_unsolve(&self) -> String {
        self.api("progress/unsolve")
    }

    /// Product catalog; also the create endpoint.
    pub fn tech_products(&self) -> String {
        self.api("tech-products")
    }

    /// Single product; fetch, update and delete.
    pub fn tech_product(&self, id: &str) -> String {
        self.api(&format!("tech-products/{}", id))
    }

    pub fn tech_products_by_category(&self, category: &str) -> String {
        self.api(&format!("tech-products/category/{}", category))
    }

    /// Liveness check, outside `/api`.
    pub fn health(&self) -> String {
        format!("{}/health", self.base)
    }
}
