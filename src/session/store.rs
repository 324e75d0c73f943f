//! The live session: token and identity, persisted and published.
//!
//! Every mutation (`login`, `logout`, a reconciliation result) runs under one
//! async mutex that is held across the storage writes, then publishes a whole
//! `Session` snapshot on a `watch` channel. Subscribers therefore never see a
//! token without its identity (or the reverse) except in the reconciliation
//! window, and storage mirrors memory by the time a change is published.
//!
//! RECONCILIATION
//! ==============
//! A token restored without an identity triggers one background fetch of the
//! profile. Each attempt captures the session generation when it is
//! scheduled; `login`/`logout` advance the generation, and a result whose
//! generation is stale is dropped instead of resurrecting a cleared session.

use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use super::{IDENTITY_KEY, KeyValueStore, TOKEN_KEY, normalize_stored};
use crate::audit::{self, LogoutReason};
use crate::error::{FetchError, SessionError};
use crate::identity::IdentityFetcher;
use crate::role::Role;
use crate::role::dispatch::RoleDispatchTable;
use crate::types::{Session, UserIdentity};

#[derive(Debug, Default)]
struct Control {
    generation: u64,
}

/// Owner of the authenticated session.
///
/// Shared as `Arc<SessionStore<..>>` between the request pipeline, the route
/// guard and the application shell.
pub struct SessionStore<S, F> {
    storage: S,
    fetcher: F,
    dispatch: RoleDispatchTable,
    state: watch::Sender<Session>,
    reconciling: watch::Sender<bool>,
    control: Mutex<Control>,
}

impl<S, F> SessionStore<S, F>
where
    S: KeyValueStore + 'static,
    F: IdentityFetcher + 'static,
{
    pub fn new(storage: S, fetcher: F) -> Self {
        let (state, _) = watch::channel(Session::default());
        let (reconciling, _) = watch::channel(false);
        Self {
            storage,
            fetcher,
            dispatch: RoleDispatchTable::default(),
            state,
            reconciling,
            control: Mutex::new(Control::default()),
        }
    }

    pub fn with_dispatch(mut self, dispatch: RoleDispatchTable) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn dispatch_table(&self) -> &RoleDispatchTable {
        &self.dispatch
    }

    /// Restore the session from storage.
    ///
    /// Storage is read once per store; later calls return the in-memory
    /// snapshot. Absent, blank, `"undefined"` and `"null"` values and
    /// malformed identity JSON all come back as absent. If a token is restored
    /// without an identity, reconciliation is scheduled before returning.
    pub async fn hydrate(self: &Arc<Self>) -> Session {
        let mut control = self.control.lock().await;

        let already_hydrated = self.state.borrow().hydrated;
        if !already_hydrated {
            let token = self.read_token().await;
            let mut identity = self.read_identity().await;

            if token.is_none() && identity.is_some() {
                warn!("Discarding stored identity that has no token");
                identity = None;
                self.write(IDENTITY_KEY, None).await;
            }

            info!(
                has_token = token.is_some(),
                has_identity = identity.is_some(),
                "Session hydrated"
            );
            self.state.send_replace(Session {
                token,
                identity,
                hydrated: true,
            });
        }

        self.schedule_reconciliation(&mut control);
        self.session()
    }

    /// Establish a session. Both fields are set, persisted and published
    /// together.
    pub async fn login(
        &self,
        identity: UserIdentity,
        token: impl Into<String>,
    ) -> Result<(), SessionError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(SessionError::EmptyToken);
        }

        let mut control = self.control.lock().await;
        control.generation += 1;

        self.persist_identity(&identity).await;
        self.write(TOKEN_KEY, Some(&token)).await;

        info!(user_id = %identity.id, role = ?identity.role, "Session established");
        audit::login(&identity.id, identity.role);

        self.state.send_replace(Session {
            token: Some(token),
            identity: Some(identity),
            hydrated: true,
        });
        self.reconciling.send_if_modified(settle);
        Ok(())
    }

    /// Clear the session. Returns `true` if there was anything to clear.
    pub async fn logout(&self) -> bool {
        self.logout_with_reason(LogoutReason::UserInitiated).await
    }

    /// Clear the session, recording why.
    ///
    /// Never fails: storage errors are logged and the in-memory session is
    /// cleared regardless. Calling it on an empty session changes nothing
    /// and does not notify subscribers.
    pub async fn logout_with_reason(&self, reason: LogoutReason) -> bool {
        let mut control = self.control.lock().await;
        self.clear(&mut control, reason).await
    }

    /// Schedule reconciliation if a token is present without an identity.
    ///
    /// Returns `false` when there is nothing to reconcile or an attempt for
    /// the current episode is already in flight.
    pub async fn reconcile(self: &Arc<Self>) -> bool {
        let mut control = self.control.lock().await;
        self.schedule_reconciliation(&mut control)
    }

    /// Wait until no reconciliation is in flight.
    pub async fn wait_for_reconciliation(&self) {
        let mut reconciling = self.reconciling.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = reconciling.wait_for(|pending| !*pending).await;
    }

    pub fn is_reconciling(&self) -> bool {
        *self.reconciling.borrow()
    }

    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    pub fn identity(&self) -> Option<UserIdentity> {
        self.state.borrow().identity.clone()
    }

    /// Receive every published session snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.state.borrow().role() == Some(role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.state
            .borrow()
            .role()
            .is_some_and(|role| roles.contains(&role))
    }

    /// Default landing path for the current identity.
    pub fn landing_path(&self) -> String {
        let role = self.state.borrow().role();
        self.dispatch.dispatch(role).to_string()
    }

    fn schedule_reconciliation(self: &Arc<Self>, control: &mut Control) -> bool {
        if *self.reconciling.borrow() {
            debug!("Reconciliation already in flight");
            return false;
        }

        let token = {
            let session = self.state.borrow();
            match (&session.token, &session.identity) {
                (Some(token), None) => token.clone(),
                _ => return false,
            }
        };

        let generation = control.generation;
        self.reconciling.send_replace(true);
        info!(generation, "Scheduling identity reconciliation");

        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut pending = PendingReconciliation {
                reconciling: &store.reconciling,
                finished: false,
            };
            let result = store.fetcher.fetch_identity(&token).await;
            store.finish_reconciliation(generation, result).await;
            pending.finished = true;
        });
        true
    }

    async fn finish_reconciliation(
        &self,
        generation: u64,
        result: Result<UserIdentity, FetchError>,
    ) {
        let mut control = self.control.lock().await;
        if control.generation != generation {
            info!(
                generation,
                current = control.generation,
                "Discarding stale reconciliation result"
            );
            return;
        }

        match result {
            Ok(identity) => {
                self.persist_identity(&identity).await;
                info!(user_id = %identity.id, "Identity reconciled from restored token");
                audit::reconciliation(Some(&identity.id), identity.role, true, "identity restored");
                self.state.send_modify(|session| session.identity = Some(identity));
                self.reconciling.send_if_modified(settle);
            }
            Err(err) => {
                warn!(error = %err, "Identity reconciliation failed, clearing session");
                audit::reconciliation(None, None, false, &err.to_string());
                self.clear(&mut control, LogoutReason::ReconciliationFailed)
                    .await;
            }
        }
    }

    async fn clear(&self, control: &mut Control, reason: LogoutReason) -> bool {
        control.generation += 1;

        let (had_session, user_id) = {
            let session = self.state.borrow();
            (
                !session.is_empty(),
                session.identity.as_ref().map(|i| i.id.clone()),
            )
        };

        self.write(IDENTITY_KEY, None).await;
        self.write(TOKEN_KEY, None).await;

        self.state.send_if_modified(|session| {
            let changed = !session.is_empty() || !session.hydrated;
            *session = Session {
                token: None,
                identity: None,
                hydrated: true,
            };
            changed
        });
        self.reconciling.send_if_modified(settle);

        if had_session {
            info!(reason = reason.as_str(), "Session cleared");
            audit::logout(user_id.as_deref(), reason);
        } else {
            debug!(reason = reason.as_str(), "Logout on an empty session");
        }
        had_session
    }

    async fn read_token(&self) -> Option<String> {
        match self.storage.get(TOKEN_KEY).await {
            Ok(raw) => normalize_stored(raw),
            Err(e) => {
                warn!(error = %e, "Failed to read stored token, treating as absent");
                None
            }
        }
    }

    async fn read_identity(&self) -> Option<UserIdentity> {
        let raw = match self.storage.get(IDENTITY_KEY).await {
            Ok(raw) => normalize_stored(raw)?,
            Err(e) => {
                warn!(error = %e, "Failed to read stored identity, treating as absent");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!(error = %e, "Discarding malformed stored identity");
                self.write(IDENTITY_KEY, None).await;
                None
            }
        }
    }

    async fn persist_identity(&self, identity: &UserIdentity) {
        match serde_json::to_string(identity) {
            Ok(json) => self.write(IDENTITY_KEY, Some(&json)).await,
            Err(e) => warn!(error = %e, "Failed to serialize identity for storage"),
        }
    }

    /// Write or remove a key. Failures degrade to memory-only operation.
    async fn write(&self, key: &str, value: Option<&str>) {
        let result = match value {
            Some(value) => self.storage.set(key, value).await,
            None => self.storage.remove(key).await,
        };
        if let Err(e) = result {
            warn!(key, error = %e, "Session storage write failed, continuing in memory");
        }
    }
}

fn settle(pending: &mut bool) -> bool {
    std::mem::replace(pending, false)
}

/// Releases `wait_for_reconciliation` waiters if the task unwinds before
/// applying a result.
struct PendingReconciliation<'a> {
    reconciling: &'a watch::Sender<bool>,
    finished: bool,
}

impl Drop for PendingReconciliation<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Identity reconciliation ended without a result");
            self.reconciling.send_if_modified(settle);
        }
    }
}
