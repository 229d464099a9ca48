//! Error types for workspace operations
//!
//! "Nothing to show" outcomes (no hover target, no call around the cursor,
//! no completion context) are not errors. They come back as `Ok(None)` or
//! an empty list.

use std::time::Duration;

use thiserror::Error;

use crate::workspace::{DocumentId, WorkspaceKey};

/// Failure of a generated type provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid workflow schema: {0}")]
    InvalidSchema(String),

    #[error("generated type provider timed out after {0:?}")]
    Timeout(Duration),

    #[error("generated type provider failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("no compilation context for key '{0}'")]
    ContextNotFound(WorkspaceKey),

    #[error("document {id} not found in context '{key}'")]
    DocumentNotFound { key: WorkspaceKey, id: DocumentId },

    #[error("invalid workspace key '{0}': only ASCII letters, digits and '_' are allowed")]
    InvalidKey(String),

    #[error("position {position} is outside the document (length {length})")]
    InvalidPosition { position: usize, length: usize },

    #[error("document name '{0}' is reserved for generated types")]
    ReservedDocumentName(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("analysis task failed: {0}")]
    Analysis(String),
}

pub type Result<T, E = WorkspaceError> = std::result::Result<T, E>;
