//! Editor services for workflow scripts
//!
//! Each workflow gets an isolated compilation context holding a generated
//! document that describes the workflow's variables and activity outputs,
//! plus the user's script. Queries compile the context and answer
//! diagnostics, completion, hover, signature help and formatting requests.

pub mod cli;
pub mod config;
pub mod error;
pub mod ide;
pub mod semantic;
pub mod service;
pub mod syntax;
pub mod workspace;

// Re-export the request-handling surface
pub use config::Config;
pub use error::{ProviderError, Result, WorkspaceError};
pub use ide::{
    CompletionCandidate, CompletionKind, Diagnostic, DiagnosticSeverity, FormatOptions, HoverInfo,
    SignatureCandidate, SignatureResult,
};
pub use service::{ScriptRequest, ScriptingWorkspace};
pub use workspace::{GeneratedTypeBundle, GeneratedTypeProvider, WorkspaceKey};
