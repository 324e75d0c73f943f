//! Role normalization.
//!
//! Raw role strings arrive from login payloads, persisted identities and
//! route configuration. They are trimmed and upper-cased once, at that
//! boundary, into `Role`; everything downstream compares enum values.

pub mod dispatch;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Permission class attached to an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Admin,
    Manager,
    Staff,
    Customer,
    Doctor,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Manager,
        Role::Staff,
        Role::Customer,
        Role::Doctor,
    ];

    /// Canonical (upper-case) name.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Staff => "STAFF",
            Role::Customer => "CUSTOMER",
            Role::Doctor => "DOCTOR",
        }
    }

    /// Normalize a raw role string. Unknown roles yield `None`.
    pub fn normalize(raw: &str) -> Option<Role> {
        let upper = raw.trim().to_uppercase();
        Role::ALL.into_iter().find(|role| role.as_str() == upper)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::normalize(s).ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse configured role names. Any unknown name is an error.
pub fn parse_roles<I, S>(names: I) -> Result<Vec<Role>, UnknownRole>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names.into_iter().map(|name| name.as_ref().parse()).collect()
}

/// Serde adapter for identity payloads: a missing, non-string or unknown
/// role deserializes to `None` instead of failing the whole identity.
pub(crate) mod lenient {
    use super::Role;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(serde_json::Value::String(s)) => {
                let role = Role::normalize(&s);
                if role.is_none() {
                    tracing::debug!(role = %s, "unrecognized role treated as unknown");
                }
                role
            }
            _ => None,
        })
    }
}
