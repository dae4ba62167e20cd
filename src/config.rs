//! Runtime settings collected from flags and the environment.

use crate::error::{CvrError, Result};
use crate::github::{GitHubClient, DEFAULT_API_URL};

/// Default pass threshold, in percent.
pub const DEFAULT_THRESHOLD: f64 = 80.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub token: Option<String>,
    pub api_url: String,
    pub threshold: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl Settings {
    /// Validated settings. An empty token counts as no token.
    pub fn new(token: Option<String>, api_url: Option<String>, threshold: f64) -> Result<Self> {
        if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
            return Err(CvrError::Config(format!(
                "threshold must be between 0 and 100, got {threshold}"
            )));
        }
        Ok(Self {
            token: token.filter(|t| !t.trim().is_empty()),
            api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            threshold,
        })
    }

    pub fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| CvrError::Config("a GitHub token is required (GITHUB_TOKEN or --token)".to_string()))
    }

    /// A client for the configured API, failing without a token.
    pub fn github(&self) -> Result<GitHubClient> {
        Ok(GitHubClient::new(self.require_token()?).with_api_url(&self.api_url))
    }
}
