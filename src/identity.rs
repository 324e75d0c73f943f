//! Identity-fetch collaborator: resolve a bearer token to a `UserIdentity`.
//!
//! The session store only consumes the result. `HttpIdentityFetcher` is the
//! production implementation against the backend's profile endpoint.

use reqwest::StatusCode;
use serde_json::Value;

use crate::config::Config;
use crate::error::FetchError;
use crate::types::UserIdentity;

/// "Fetch profile by token".
pub trait IdentityFetcher: Send + Sync {
    fn fetch_identity(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<UserIdentity, FetchError>> + Send;
}

/// Fetches the profile with `GET {profile_url}` and a bearer credential.
pub struct HttpIdentityFetcher {
    http_client: reqwest::Client,
    profile_url: String,
}

impl HttpIdentityFetcher {
    pub fn new(http_client: reqwest::Client, profile_url: impl Into<String>) -> Self {
        Self {
            http_client,
            profile_url: profile_url.into(),
        }
    }

    pub fn from_config(http_client: reqwest::Client, config: &Config) -> Self {
        Self::new(http_client, config.profile_url())
    }
}

impl IdentityFetcher for HttpIdentityFetcher {
    async fn fetch_identity(&self, token: &str) -> Result<UserIdentity, FetchError> {
        let resp = self
            .http_client
            .get(&self.profile_url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        decode_profile(body)
    }
}

/// Accept either a bare profile or one wrapped in a `{"data": ...}` envelope.
fn decode_profile(body: Value) -> Result<UserIdentity, FetchError> {
    let payload = match body {
        Value::Object(mut map) if !map.contains_key("id") => match map.remove("data") {
            Some(inner) => inner,
            None => Value::Object(map),
        },
        other => other,
    };
    serde_json::from_value(payload).map_err(|e| FetchError::Decode(e.to_string()))
}
