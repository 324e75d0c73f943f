//! Role → landing path lookup.
//!
//! A single table serves both the post-login redirect and the fallback
//! target for a forbidden route. Roles without an entry resolve to the
//! fallback path.

use std::collections::HashMap;

use super::Role;

pub const FALLBACK_PATH: &str = "/";

const DEFAULT_LANDING_PATHS: [(Role, &str); 5] = [
    (Role::Admin, "/admin/dashboard"),
    (Role::Manager, "/manager/dashboard"),
    (Role::Staff, "/staff/dashboard"),
    (Role::Customer, "/customer/dashboard"),
    (Role::Doctor, "/doctor/dashboard"),
];

/// Mapping from a normalized role to its default landing path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDispatchTable {
    paths: HashMap<Role, String>,
    fallback: String,
}

impl RoleDispatchTable {
    /// Table with the default dashboard for every role.
    pub fn new() -> Self {
        Self {
            paths: DEFAULT_LANDING_PATHS
                .iter()
                .map(|(role, path)| (*role, (*path).to_string()))
                .collect(),
            fallback: FALLBACK_PATH.into(),
        }
    }

    /// Table with no role entries; every lookup falls back.
    pub fn empty(fallback: impl Into<String>) -> Self {
        Self {
            paths: HashMap::new(),
            fallback: fallback.into(),
        }
    }

    pub fn with_path(mut self, role: Role, path: impl Into<String>) -> Self {
        self.paths.insert(role, path.into());
        self
    }

    pub fn with_fallback(mut self, path: impl Into<String>) -> Self {
        self.fallback = path.into();
        self
    }

    /// The role's own entry, if the table defines one.
    pub fn lookup(&self, role: Option<Role>) -> Option<&str> {
        role.and_then(|r| self.paths.get(&r)).map(String::as_str)
    }

    /// Landing path for `role`, or the fallback for unknown/missing roles.
    pub fn dispatch(&self, role: Option<Role>) -> &str {
        self.lookup(role).unwrap_or(self.fallback())
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }
}

impl Default for RoleDispatchTable {
    fn default() -> Self {
        Self::new()
    }
}
