use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WorkspaceError;

/// Identifier of one isolated compilation context
///
/// Keys are restricted to ASCII letters, digits and `_` so they are valid
/// as project identifiers. Workflow ids are normalized with
/// [`WorkspaceKey::from_workflow_id`] before they reach the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkspaceKey(String);

impl WorkspaceKey {
    /// Validate an already normalized key
    pub fn new(raw: impl Into<String>) -> Result<Self, WorkspaceError> {
        let raw = raw.into();
        if raw.is_empty() || !raw.chars().all(is_key_char) {
            return Err(WorkspaceError::InvalidKey(raw));
        }
        Ok(Self(raw))
    }

    /// Derive a key from a workflow definition id by dropping separator
    /// characters (`3f2a-77c1` becomes `3f2a77c1`)
    pub fn from_workflow_id(id: &str) -> Result<Self, WorkspaceError> {
        let normalized: String = id.chars().filter(|c| is_key_char(*c)).collect();
        if normalized.is_empty() {
            return Err(WorkspaceError::InvalidKey(id.to_string()));
        }
        Ok(Self(normalized))
    }

    /// A fresh key for a one-shot context
    pub fn ephemeral() -> Self {
        Self(format!("adhoc_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl fmt::Display for WorkspaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WorkspaceKey {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for WorkspaceKey {
    type Error = WorkspaceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WorkspaceKey> for String {
    fn from(key: WorkspaceKey) -> Self {
        key.0
    }
}
