//! Editor queries over a compiled context
//!
//! Every query takes a [`Compilation`](crate::semantic::Compilation), the
//! name of the document being edited and a character position. "Nothing to
//! show" is an empty result, not an error.

pub mod completion;
pub mod diagnostics;
pub mod format;
pub mod hover;
pub mod signature;

#[cfg(test)]
mod tests;

pub use completion::{
    complete, match_rank, CompletionCandidate, CompletionKind, CompletionOptions, CompletionTrigger,
};
pub use diagnostics::{diagnostics, Diagnostic, DiagnosticSeverity};
pub use format::{format, FormatOptions};
pub use hover::{hover, HoverInfo};
pub use signature::{signatures, SignatureCandidate, SignatureResult};
