use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix that marks a client-generated placeholder id. Entries carrying it
/// exist only until the next authoritative batch arrives.
pub const OPTIMISTIC_PREFIX: &str = "temp-";

/// Provenance of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    /// Catch-all for roles this client does not know about
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
            Role::Unknown => write!(f, "unknown"),
        }
    }
}

/// A single conversation turn.
///
/// Ids come in two forms: optimistic (client-generated, `temp-` prefix,
/// creation timestamp) and authoritative (server-assigned, permanent).
/// `parent` links a message to the id of the turn it logically follows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub parent: Option<String>,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        parent: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            parent: parent.map(str::to_string),
        }
    }

    /// A locally-originated user turn shown before server confirmation.
    /// Does not chain to the prior head (`parent = None`).
    pub fn optimistic(content: impl Into<String>) -> Self {
        Self {
            id: optimistic_id(),
            role: Role::User,
            content: content.into(),
            parent: None,
        }
    }

    pub fn is_optimistic(&self) -> bool {
        is_optimistic(&self.id)
    }

    /// Short display form of the id (first 8 characters).
    pub fn short_id(&self) -> &str {
        &self.id[..8.min(self.id.len())]
    }
}

/// Generate a fresh optimistic id from the current wall clock.
pub fn optimistic_id() -> String {
    format!("{}{}", OPTIMISTIC_PREFIX, Utc::now().timestamp_millis())
}

pub fn is_optimistic(id: &str) -> bool {
    id.starts_with(OPTIMISTIC_PREFIX)
}
