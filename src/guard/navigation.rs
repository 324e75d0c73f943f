//! Router navigation seam.
//!
//! The guard and the request pipeline only produce router paths; a
//! `Navigator` applies them to whatever router the application runs.

use std::sync::{Mutex, PoisonError};

/// Query parameter carrying the originally requested location through login.
pub const REDIRECT_PARAM: &str = "redirect";

/// Applies redirects to the application's router.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);

    /// Location currently displayed, if the router knows it.
    fn current_location(&self) -> Option<String> {
        None
    }
}

/// Headless navigator that records every redirect.
///
/// The most recent redirect doubles as the current location.
#[derive(Debug, Default)]
pub struct HistoryNavigator {
    history: Mutex<Vec<String>>,
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Navigator already showing `location`.
    pub fn at(location: impl Into<String>) -> Self {
        Self {
            history: Mutex::new(vec![location.into()]),
        }
    }

    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for HistoryNavigator {
    fn navigate(&self, path: &str) {
        tracing::info!(path, "Navigating");
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
    }

    fn current_location(&self) -> Option<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

/// Login path carrying `from` so the user can return after logging in.
///
/// No return location is attached when `from` is empty, unsafe, or is
/// itself the login page.
pub fn login_redirect(login_path: &str, from: Option<&str>) -> String {
    match from.filter(|loc| is_safe_location(loc) && path_of(loc) != login_path) {
        Some(loc) => format!(
            "{login_path}?{REDIRECT_PARAM}={}",
            urlencoding::encode(loc)
        ),
        None => login_path.to_string(),
    }
}

/// Decode a `redirect` parameter, accepting only in-app locations.
pub fn decode_return_location(param: &str) -> Option<String> {
    let decoded = urlencoding::decode(param).ok()?;
    is_safe_location(&decoded).then(|| decoded.into_owned())
}

/// In-app absolute path: starts with one `/` (not `//host`) and has no scheme.
pub fn is_safe_location(location: &str) -> bool {
    location.starts_with('/') && !location.starts_with("//") && !location.contains('\\')
}

/// Path part of a location, without query or fragment.
pub fn path_of(location: &str) -> &str {
    location
        .split(['?', '#'])
        .next()
        .unwrap_or(location)
}
