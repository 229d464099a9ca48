//! Per-workflow compilation contexts
//!
//! A [`ContextRegistry`] maps each [`WorkspaceKey`] to one long-lived
//! [`CompilationContext`]. A context holds the reserved generated-type
//! document plus the user's script documents, and compiles them as one
//! semantic unit. The generated-type source comes from a
//! [`GeneratedTypeProvider`]; [`SchemaTypeProvider`] is the reference one.

pub mod context;
pub mod document;
pub mod key;
pub mod provider;
pub mod registry;
pub mod schema;

#[cfg(test)]
mod tests;

pub use context::{CompilationContext, ContextSession};
pub use document::{Document, DocumentId};
pub use key::WorkspaceKey;
pub use provider::{GeneratedTypeBundle, GeneratedTypeProvider};
pub use registry::ContextRegistry;
pub use schema::{
    render_schema, ActivitySchema, OutputSchema, SchemaTypeProvider, VariableSchema,
    WorkflowSchema,
};

pub(crate) use provider::generate_bundle;
