//! Session Guard: client-side session and route authorization.
//!
//! The same wiring serves a headless CLI and embedding applications: build a
//! `GuardContext` from `Config`, call `start()` once, then route API calls
//! through `pipeline` and navigation decisions through `guard`.

pub mod audit;
pub mod config;
pub mod error;
pub mod guard;
pub mod identity;
pub mod pipeline;
pub mod role;
pub mod session;
pub mod types;

use std::sync::Arc;

use crate::config::Config;
use crate::guard::navigation::Navigator;
use crate::guard::{GuardPaths, RouteGuard};
use crate::identity::HttpIdentityFetcher;
use crate::pipeline::RequestPipeline;
use crate::role::dispatch::RoleDispatchTable;
use crate::session::AnyStore;
use crate::session::store::SessionStore;
use crate::types::Session;

/// Session store as wired from configuration.
pub type AppSessionStore = SessionStore<AnyStore, HttpIdentityFetcher>;

/// Request pipeline as wired from configuration.
pub type AppPipeline = RequestPipeline<AnyStore, HttpIdentityFetcher>;

/// Everything a guarded application shares.
pub struct GuardContext {
    pub config: Config,
    pub session: Arc<AppSessionStore>,
    pub pipeline: AppPipeline,
    pub guard: RouteGuard,
}

impl GuardContext {
    /// Wire storage, identity fetcher, pipeline and guard from `config`.
    ///
    /// One `reqwest::Client` is shared by the pipeline and the fetcher.
    pub fn build(config: Config, navigator: Arc<dyn Navigator>) -> Self {
        Self::with_dispatch(config, navigator, RoleDispatchTable::default())
    }

    pub fn with_dispatch(
        config: Config,
        navigator: Arc<dyn Navigator>,
        dispatch: RoleDispatchTable,
    ) -> Self {
        let http_client = reqwest::Client::new();
        let session = Arc::new(
            SessionStore::new(
                AnyStore::from_config(&config),
                HttpIdentityFetcher::from_config(http_client.clone(), &config),
            )
            .with_dispatch(dispatch.clone()),
        );
        let pipeline = RequestPipeline::new(http_client, Arc::clone(&session), navigator, &config);
        let guard = RouteGuard::new(session.subscribe(), dispatch, GuardPaths::from_config(&config));

        Self {
            config,
            session,
            pipeline,
            guard,
        }
    }

    /// Hydrate the session from storage. Reconciliation, if needed, runs
    /// in the background.
    pub async fn start(&self) -> Session {
        self.session.hydrate().await
    }
}
