use serde::{Deserialize, Serialize};

use crate::semantic::{Compilation, NativeSeverity};
use crate::syntax::text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
    Hint,
}

impl From<NativeSeverity> for DiagnosticSeverity {
    fn from(severity: NativeSeverity) -> Self {
        match severity {
            NativeSeverity::Error => DiagnosticSeverity::Error,
            NativeSeverity::Warning => DiagnosticSeverity::Warning,
            NativeSeverity::Info => DiagnosticSeverity::Info,
            NativeSeverity::Hidden => DiagnosticSeverity::Hint,
        }
    }
}

/// A finding in the primary document; `[from, to)` in characters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub from: usize,
    pub to: usize,
    pub code: String,
}

/// Diagnostics of `document` only. Findings in other documents of the
/// compilation, the generated-type document included, are left out.
pub fn diagnostics(compilation: &Compilation, document: &str) -> Vec<Diagnostic> {
    let Some(compiled) = compilation.document(document) else {
        return Vec::new();
    };
    let source = compiled.tree.text.as_str();

    compilation
        .diagnostics(document)
        .into_iter()
        .map(|d| {
            let (from, to) = text::span_to_chars(source, d.span);
            Diagnostic {
                severity: d.severity.into(),
                message: d.message,
                from,
                to,
                code: d.code.to_string(),
            }
        })
        .collect()
}
