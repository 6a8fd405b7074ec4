//! Application configuration management.
//!
//! Configuration is stored at `~/.config/exec-portal/config.json` and may be
//! overridden by environment variables:
//!
//! - `PORTAL_API_URL`: backend base URL (default `http://127.0.0.1:8000/api/v1`)
//! - `PORTAL_SITE_URL`: public site URL, used to build RSVP links
//! - `PORTAL_AUTH_URL`: identity provider auth endpoint, used for token refresh
//! - `PORTAL_AUTH_ANON_KEY`: public key sent with identity provider calls

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::UnauthorizedPolicy;
use crate::sync::TokenRefreshPolicy;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "exec-portal";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api/v1";

pub const ENV_API_URL: &str = "PORTAL_API_URL";
pub const ENV_SITE_URL: &str = "PORTAL_SITE_URL";
pub const ENV_AUTH_URL: &str = "PORTAL_AUTH_URL";
pub const ENV_AUTH_ANON_KEY: &str = "PORTAL_AUTH_ANON_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_url: Option<String>,
    pub site_url: Option<String>,
    pub auth_url: Option<String>,
    pub auth_anon_key: Option<String>,
    #[serde(default)]
    pub unauthorized_policy: UnauthorizedPolicy,
    #[serde(default)]
    pub token_refresh_policy: TokenRefreshPolicy,
    pub last_email: Option<String>,
}

impl Config {
    /// Load the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Override fields from a variable lookup; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_API_URL) {
            self.api_url = Some(v);
        }
        if let Some(v) = get(ENV_SITE_URL) {
            self.site_url = Some(v);
        }
        if let Some(v) = get(ENV_AUTH_URL) {
            self.auth_url = Some(v);
        }
        if let Some(v) = get(ENV_AUTH_ANON_KEY) {
            self.auth_anon_key = Some(v);
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Backend base URL without a trailing slash
    pub fn api_base_url(&self) -> String {
        self.api_url
            .as_deref()
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string()
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir =
            dirs::cache_dir().ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url(), DEFAULT_API_URL);
        assert_eq!(config.unauthorized_policy, UnauthorizedPolicy::FailFast);
        assert_eq!(config.token_refresh_policy, TokenRefreshPolicy::Invalidate);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_API_URL, "https://portal.example.org/api/v1/"),
            (ENV_AUTH_URL, "https://id.example.org/auth/v1"),
            (ENV_SITE_URL, "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config {
            site_url: Some("https://site.example.org".to_string()),
            ..Config::default()
        };
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.api_base_url(), "https://portal.example.org/api/v1");
        assert_eq!(config.auth_url.as_deref(), Some("https://id.example.org/auth/v1"));
        assert_eq!(config.site_url.as_deref(), Some("https://site.example.org"));
    }

    #[test]
    fn test_parse_policies() {
        let json = r#"{"unauthorized_policy": "refresh_and_retry", "token_refresh_policy": "lazy"}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.unauthorized_policy, UnauthorizedPolicy::RefreshAndRetry);
        assert_eq!(config.token_refresh_policy, TokenRefreshPolicy::Lazy);
    }
}
