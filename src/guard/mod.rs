//! Per-navigation route guard.
//!
//! `decide` is the pure four-state transition:
//!
//! 1. session not hydrated          → `Resolving` (placeholder, no redirect)
//! 2. no identity                   → `Unauthenticated` → login, with return location
//! 3. role not in the required set  → `Forbidden` → role landing path, else unauthorized
//! 4. otherwise                     → `Authorized`
//!
//! `RouteGuard` reads the live session on every call and `GuardWatch`
//! re-evaluates on every session change, so a logout forced by a 401 is
//! observed without waiting for the next navigation.

pub mod navigation;

use serde::Serialize;
use tokio::sync::watch;

use crate::config::Config;
use crate::role::Role;
use crate::role::dispatch::RoleDispatchTable;
use crate::types::Session;

use navigation::{decode_return_location, login_redirect, path_of};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardState {
    Resolving,
    Unauthenticated,
    Forbidden,
    Authorized,
}

/// Outcome of one guard evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardDecision {
    pub state: GuardState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl GuardDecision {
    fn stay(state: GuardState) -> Self {
        Self {
            state,
            redirect: None,
        }
    }

    fn redirect(state: GuardState, target: impl Into<String>) -> Self {
        Self {
            state,
            redirect: Some(target.into()),
        }
    }

    /// Whether the guarded content may render.
    pub fn is_authorized(&self) -> bool {
        self.state == GuardState::Authorized
    }
}

/// Router paths the guard redirects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardPaths {
    pub login: String,
    pub unauthorized: String,
}

impl GuardPaths {
    pub fn from_config(config: &Config) -> Self {
        Self {
            login: config.login_path.clone(),
            unauthorized: config.unauthorized_path.clone(),
        }
    }
}

impl Default for GuardPaths {
    fn default() -> Self {
        Self {
            login: "/login".into(),
            unauthorized: "/unauthorized".into(),
        }
    }
}

/// Decide whether `location` may render for `session`.
pub fn decide(
    session: &Session,
    required: &[Role],
    location: &str,
    paths: &GuardPaths,
    table: &RoleDispatchTable,
) -> GuardDecision {
    if !session.hydrated {
        return GuardDecision::stay(GuardState::Resolving);
    }

    let Some(identity) = session.identity.as_ref() else {
        return GuardDecision::redirect(
            GuardState::Unauthenticated,
            login_redirect(&paths.login, Some(location)),
        );
    };

    if !required.is_empty() && !identity.role.is_some_and(|role| required.contains(&role)) {
        // Never send the user back to the page that just refused them.
        let target = table
            .lookup(identity.role)
            .filter(|landing| *landing != path_of(location))
            .unwrap_or(paths.unauthorized.as_str());
        return GuardDecision::redirect(GuardState::Forbidden, target);
    }

    GuardDecision::stay(GuardState::Authorized)
}

/// Live route guard bound to a session subscription.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    session: watch::Receiver<Session>,
    paths: GuardPaths,
    table: RoleDispatchTable,
}

impl RouteGuard {
    pub fn new(session: watch::Receiver<Session>, table: RoleDispatchTable, paths: GuardPaths) -> Self {
        Self {
            session,
            paths,
            table,
        }
    }

    /// Evaluate against the current session.
    pub fn evaluate(&self, required: &[Role], location: &str) -> GuardDecision {
        let session = self.session.borrow();
        decide(&session, required, location, &self.paths, &self.table)
    }

    /// Follow `location` across session changes.
    pub fn watch(&self, required: Vec<Role>, location: impl Into<String>) -> GuardWatch {
        GuardWatch {
            guard: self.clone(),
            required,
            location: location.into(),
        }
    }

    /// Where to go after a successful login.
    ///
    /// The `redirect` parameter carried through the login page wins when it
    /// decodes to an in-app location the user may open; otherwise the
    /// landing path for the user's role.
    pub fn post_login_target(&self, redirect_param: Option<&str>) -> String {
        let session = self.session.borrow();
        if let Some(location) = redirect_param.and_then(decode_return_location)
            && path_of(&location) != self.paths.login
        {
            return location;
        }
        self.table.dispatch(session.role()).to_string()
    }
}

/// A guarded location that is re-evaluated whenever the session changes.
pub struct GuardWatch {
    guard: RouteGuard,
    required: Vec<Role>,
    location: String,
}

impl GuardWatch {
    /// Decision for the latest session, marking it as seen.
    pub fn current(&mut self) -> GuardDecision {
        let session = self.guard.session.borrow_and_update();
        decide(
            &session,
            &self.required,
            &self.location,
            &self.guard.paths,
            &self.guard.table,
        )
    }

    /// Wait for the next session change and re-evaluate.
    ///
    /// Returns `None` once the session store has been dropped.
    pub async fn changed(&mut self) -> Option<GuardDecision> {
        self.guard.session.changed().await.ok()?;
        Some(self.current())
    }
}
