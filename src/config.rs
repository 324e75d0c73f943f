//! Configuration via environment variables.
//!
//! `API_BASE_URL` is required; everything else has a default suited to the
//! single-page app's router.

use std::env;

/// Session guard configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub profile_path: String,
    pub login_path: String,
    pub unauthorized_path: String,
    pub health_check_path: String,
    pub storage_backend: String,
    pub storage_path: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required: `API_BASE_URL`. Optional: `PROFILE_PATH`, `LOGIN_PATH`,
    /// `UNAUTHORIZED_PATH`, `HEALTH_CHECK_PATH`, `STORAGE_BACKEND`
    /// (`memory` or `file`), `STORAGE_PATH`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let api_base_url = lookup("API_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnv("API_BASE_URL".into()))?;
        reqwest::Url::parse(&api_base_url)
            .map_err(|e| ConfigError::Invalid("API_BASE_URL".into(), e.to_string()))?;

        let storage_backend = get("STORAGE_BACKEND", "file").to_lowercase();
        if storage_backend != "memory" && storage_backend != "file" {
            return Err(ConfigError::Invalid(
                "STORAGE_BACKEND".into(),
                format!("expected `memory` or `file`, got `{storage_backend}`"),
            ));
        }

        Ok(Self {
            api_base_url,
            profile_path: route_path("PROFILE_PATH", get("PROFILE_PATH", "/auth/me"))?,
            login_path: route_path("LOGIN_PATH", get("LOGIN_PATH", "/login"))?,
            unauthorized_path: route_path(
                "UNAUTHORIZED_PATH",
                get("UNAUTHORIZED_PATH", "/unauthorized"),
            )?,
            health_check_path: route_path(
                "HEALTH_CHECK_PATH",
                get("HEALTH_CHECK_PATH", "/health"),
            )?,
            storage_backend,
            storage_path: get("STORAGE_PATH", ".session.json"),
        })
    }

    /// Absolute URL of the profile endpoint used for reconciliation.
    pub fn profile_url(&self) -> String {
        format!(
            "{}{}",
            self.api_base_url.trim_end_matches('/'),
            self.profile_path
        )
    }

    /// Configuration for tests: memory storage, local API.
    pub fn test_default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".into(),
            profile_path: "/auth/me".into(),
            login_path: "/login".into(),
            unauthorized_path: "/unauthorized".into(),
            health_check_path: "/health".into(),
            storage_backend: "memory".into(),
            storage_path: ".session.json".into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

fn route_path(key: &str, value: String) -> Result<String, ConfigError> {
    if value.starts_with('/') {
        Ok(value)
    } else {
        Err(ConfigError::Invalid(
            key.into(),
            format!("router paths must start with `/`, got `{value}`"),
        ))
    }
}
