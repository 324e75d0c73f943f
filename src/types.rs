//! Session and identity data model.
//!
//! `UserIdentity` uses the camelCase wire names of the profile API. Profile
//! fields this crate does not interpret are kept in `profile` so a persisted
//! identity round-trips unchanged.

use serde::{Deserialize, Deserializer, Serialize};

use crate::role::Role;

/// Normalized user profile attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(
        default,
        deserialize_with = "crate::role::lenient::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub role: Option<Role>,
    #[serde(flatten)]
    pub profile: serde_json::Map<String, serde_json::Value>,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            id: id.into(),
            full_name: None,
            email: None,
            phone: None,
            role,
            profile: serde_json::Map::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_full_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = Some(name.into());
        self
    }
}

/// In-memory session: token and identity, plus whether storage has been read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Session {
    pub token: Option<String>,
    pub identity: Option<UserIdentity>,
    pub hydrated: bool,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn role(&self) -> Option<Role> {
        self.identity.as_ref().and_then(|i| i.role)
    }

    /// Token restored but identity not yet known (reconciliation window).
    pub fn awaiting_identity(&self) -> bool {
        self.token.is_some() && self.identity.is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.identity.is_none()
    }
}

/// Profile APIs disagree on whether ids are numbers or strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}
