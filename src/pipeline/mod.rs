//! Outgoing request pipeline.
//!
//! Wraps `reqwest::Client` so every API call made on behalf of a guarded
//! screen goes through one place:
//! - `Authorization: Bearer <token>` is attached whenever a session token exists
//! - non-health-check requests hold an in-flight slot until their response
//!   (or transport error) arrives, driving the loading indicator
//! - a 401 clears the session, then redirects to login, then fails the call
//!
//! Other statuses are returned untouched; `Ok(response)` may be a 4xx/5xx.

pub mod loading;

use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use std::sync::Arc;

use crate::audit::LogoutReason;
use crate::config::Config;
use crate::error::PipelineError;
use crate::guard::navigation::{Navigator, login_redirect};
use crate::identity::IdentityFetcher;
use crate::session::KeyValueStore;
use crate::session::store::SessionStore;

use loading::LoadingTracker;

pub struct RequestPipeline<S, F> {
    http_client: reqwest::Client,
    session: Arc<SessionStore<S, F>>,
    loading: Arc<LoadingTracker>,
    navigator: Arc<dyn Navigator>,
    base_url: String,
    login_path: String,
    health_check_path: String,
}

impl<S, F> RequestPipeline<S, F>
where
    S: KeyValueStore + 'static,
    F: IdentityFetcher + 'static,
{
    pub fn new(
        http_client: reqwest::Client,
        session: Arc<SessionStore<S, F>>,
        navigator: Arc<dyn Navigator>,
        config: &Config,
    ) -> Self {
        Self {
            http_client,
            session,
            loading: Arc::new(LoadingTracker::new()),
            navigator,
            base_url: config.api_base_url.clone(),
            login_path: config.login_path.clone(),
            health_check_path: config.health_check_path.clone(),
        }
    }

    /// Share an existing tracker, e.g. one indicator for several pipelines.
    pub fn with_loading(mut self, loading: Arc<LoadingTracker>) -> Self {
        self.loading = loading;
        self
    }

    pub fn loading(&self) -> &Arc<LoadingTracker> {
        &self.loading
    }

    pub fn session(&self) -> &Arc<SessionStore<S, F>> {
        &self.session
    }

    pub fn get(&self, url: &str) -> Result<RequestBuilder, PipelineError> {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> Result<RequestBuilder, PipelineError> {
        self.request(Method::POST, url)
    }

    /// Start a request. Relative URLs resolve against the API base URL.
    pub fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, PipelineError> {
        Ok(self.http_client.request(method, self.resolve(url)?))
    }

    /// Build and execute a request started with `get`/`post`/`request`.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, PipelineError> {
        self.execute(builder.build()?).await
    }

    pub async fn execute(&self, mut request: reqwest::Request) -> Result<Response, PipelineError> {
        let token = self.session.token();
        if let Some(token) = &token {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    request.headers_mut().insert(AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("Session token is not a valid header value, sending without it"),
            }
        }

        let url = request.url().clone();
        let slot = (!self.is_health_check(&url)).then(|| self.loading.begin());

        let result = self.http_client.execute(request).await;
        drop(slot);

        let response = result.map_err(|e| {
            tracing::debug!(%url, error = %e, "Request failed in transport");
            PipelineError::Transport(e)
        })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.reject(&url, token.is_some()).await;
            return Err(PipelineError::AuthRejected {
                url: url.to_string(),
            });
        }

        Ok(response)
    }

    /// Forced logout: the session is cleared and persisted before the
    /// redirect is issued.
    ///
    /// A request that carried a token redirects only if it is the one that
    /// cleared the session; later 401s for the same session return quietly.
    async fn reject(&self, url: &Url, sent_with_token: bool) {
        tracing::warn!(%url, "Request rejected with 401, forcing logout");
        let cleared = self
            .session
            .logout_with_reason(LogoutReason::AuthRejected)
            .await;
        if sent_with_token && !cleared {
            tracing::debug!(%url, "Session already cleared by another request");
            return;
        }
        let from = self.navigator.current_location();
        self.navigator
            .navigate(&login_redirect(&self.login_path, from.as_deref()));
    }

    fn resolve(&self, url: &str) -> Result<Url, PipelineError> {
        if let Ok(absolute) = Url::parse(url) {
            return Ok(absolute);
        }
        let base = Url::parse(&format!("{}/", self.base_url.trim_end_matches('/')))
            .map_err(|e| PipelineError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        base.join(url.trim_start_matches('/'))
            .map_err(|e| PipelineError::InvalidUrl(format!("{url}: {e}")))
    }

    fn is_health_check(&self, url: &Url) -> bool {
        is_health_check_path(url.path(), &self.health_check_path)
    }
}

/// `path` is the health-check path, possibly under an API prefix
/// (`/api/health` matches `/health`; `/healthcheck` does not).
fn is_health_check_path(path: &str, health: &str) -> bool {
    let path = path.trim_end_matches('/');
    let health = health.trim_end_matches('/');
    !health.is_empty() && path.ends_with(health) && {
        let prefix = &path[..path.len() - health.len()];
        prefix.is_empty() || health.starts_with('/') || prefix.ends_with('/')
    }
}
