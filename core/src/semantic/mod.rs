//! Semantic analysis of workflow scripts
//!
//! A [`Compilation`] links referenced assemblies and a context's documents
//! into one unit. Declarations are collected first ([`declare`]), then each
//! document is bound ([`binder`]) and run through the analysis
//! [`rules`]. Query code reads the resulting [`DocumentModel`]s.

pub mod binder;
pub mod conversions;
pub mod declare;
pub mod display;
pub mod flow;
pub mod library;
pub mod model;
pub mod rules;
pub mod scope;
pub mod types;

#[cfg(test)]
mod tests;

pub use declare::Declarations;
pub use library::{AssemblyCatalog, CORE_ASSEMBLY};
pub use model::{
    CompiledDocument, Compilation, DocumentModel, NativeSeverity, ScopeRecord, SemanticDiagnostic,
};
pub use scope::ImportSet;
pub use types::{MemberKind, Symbol, SymbolKind, Ty, TypeId};
