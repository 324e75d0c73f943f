//! OCSF (Open Cybersecurity Schema Framework) session audit events.
//!
//! Session lifecycle transitions are emitted via `tracing::info!` on the
//! `audit` target as OCSF Authentication (3001) JSON. Never panics.

use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::role::Role;

pub const CLASS_AUTHENTICATION: u32 = 3001;

// Activity IDs
pub const ACTIVITY_LOGON: u32 = 1;
pub const ACTIVITY_LOGOFF: u32 = 2;
pub const ACTIVITY_OTHER: u32 = 99; // Identity reconciliation

// Status IDs
pub const STATUS_SUCCESS: u32 = 1;
pub const STATUS_FAILURE: u32 = 2;

// Severity IDs
pub const SEVERITY_INFORMATIONAL: u32 = 1;
pub const SEVERITY_LOW: u32 = 2;
pub const SEVERITY_MEDIUM: u32 = 3;

/// Why a session was cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    UserInitiated,
    /// A request came back 401.
    AuthRejected,
    /// The restored token could not be resolved to an identity.
    ReconciliationFailed,
}

impl LogoutReason {
    pub fn as_str(self) -> &'static str {
        match self {
            LogoutReason::UserInitiated => "user_initiated",
            LogoutReason::AuthRejected => "auth_rejected",
            LogoutReason::ReconciliationFailed => "reconciliation_failed",
        }
    }

    fn severity_id(self) -> u32 {
        match self {
            LogoutReason::UserInitiated => SEVERITY_INFORMATIONAL,
            LogoutReason::AuthRejected => SEVERITY_LOW,
            LogoutReason::ReconciliationFailed => SEVERITY_MEDIUM,
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn severity_name(id: u32) -> &'static str {
    match id {
        SEVERITY_INFORMATIONAL => "Informational",
        SEVERITY_LOW => "Low",
        SEVERITY_MEDIUM => "Medium",
        _ => "Unknown",
    }
}

fn status_name(id: u32) -> &'static str {
    match id {
        STATUS_SUCCESS => "Success",
        _ => "Failure",
    }
}

/// Build an OCSF Authentication event.
pub fn authentication_event(
    activity_id: u32,
    activity_name: &str,
    status_id: u32,
    severity_id: u32,
    user: Option<(&str, Option<Role>)>,
    message: &str,
) -> serde_json::Value {
    let mut event = json!({
        "class_uid": CLASS_AUTHENTICATION,
        "class_name": "Authentication",
        "activity_id": activity_id,
        "activity_name": activity_name,
        "severity_id": severity_id,
        "severity": severity_name(severity_id),
        "status_id": status_id,
        "status": status_name(status_id),
        "time": now_millis(),
        "metadata": {
            "product": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        },
        "message": message,
    });

    if let Some((uid, role)) = user {
        event["actor"] = json!({
            "user": {
                "uid": uid,
                "type_id": 1,
                "type": "User",
                "groups": role.map(|r| vec![json!({"name": r.as_str()})]).unwrap_or_default(),
            }
        });
    }

    event
}

fn emit(event: &serde_json::Value) {
    if let Ok(json) = serde_json::to_string(event) {
        tracing::info!(target: "audit", "{}", json);
    }
}

pub fn login(user_id: &str, role: Option<Role>) {
    emit(&authentication_event(
        ACTIVITY_LOGON,
        "Logon",
        STATUS_SUCCESS,
        SEVERITY_INFORMATIONAL,
        Some((user_id, role)),
        "Session established",
    ));
}

pub fn logout(user_id: Option<&str>, reason: LogoutReason) {
    emit(&authentication_event(
        ACTIVITY_LOGOFF,
        "Logoff",
        STATUS_SUCCESS,
        reason.severity_id(),
        user_id.map(|id| (id, None)),
        &format!("Session cleared: {}", reason.as_str()),
    ));
}

pub fn reconciliation(user_id: Option<&str>, role: Option<Role>, succeeded: bool, detail: &str) {
    let status = if succeeded { STATUS_SUCCESS } else { STATUS_FAILURE };
    let severity = if succeeded {
        SEVERITY_INFORMATIONAL
    } else {
        SEVERITY_MEDIUM
    };
    emit(&authentication_event(
        ACTIVITY_OTHER,
        "Other",
        status,
        severity,
        user_id.map(|id| (id, role)),
        &format!("Identity reconciliation: {detail}"),
    ));
}
