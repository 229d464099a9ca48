//! Compilation results: the linked declarations plus one bound model per
//! document

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::binder::Binder;
use super::declare::{self, Declarations, DocumentSource};
use super::library::AssemblyCatalog;
use super::rules::Analyzer;
use super::scope::ImportSet;
use super::types::*;
use crate::error::{Result, WorkspaceError};
use crate::syntax::{NodeId, SyntaxTree, TextSpan};

/// Severity as the engine produces it, before mapping to the public scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NativeSeverity {
    Hidden,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticDiagnostic {
    pub code: &'static str,
    pub message: String,
    pub span: TextSpan,
    pub severity: NativeSeverity,
}

impl SemanticDiagnostic {
    pub fn error(code: &'static str, message: impl Into<String>, span: TextSpan) -> Self {
        Self::new(NativeSeverity::Error, code, message, span)
    }

    pub fn warning(code: &'static str, message: impl Into<String>, span: TextSpan) -> Self {
        Self::new(NativeSeverity::Warning, code, message, span)
    }

    pub fn hidden(code: &'static str, message: impl Into<String>, span: TextSpan) -> Self {
        Self::new(NativeSeverity::Hidden, code, message, span)
    }

    pub fn new(
        severity: NativeSeverity,
        code: &'static str,
        message: impl Into<String>,
        span: TextSpan,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            span,
            severity,
        }
    }
}

/// Facts gathered about one document while declaring and binding
#[derive(Debug, Default)]
pub struct DocumentFacts {
    pub diagnostics: Vec<SemanticDiagnostic>,
    /// Indexes of `using` directives some name was resolved through
    pub used_usings: HashSet<usize>,
}

/// A lexical scope as recorded for position-based queries
#[derive(Debug, Clone)]
pub struct ScopeRecord {
    pub span: TextSpan,
    pub locals: Vec<LocalId>,
    pub functions: Vec<FunctionId>,
    pub enclosing_type: Option<TypeId>,
    pub is_static: bool,
    pub namespace: String,
}

/// Everything the binder learned about one document
#[derive(Debug, Default)]
pub struct DocumentModel {
    pub expr_types: HashMap<NodeId, Ty>,
    /// What names, member accesses and callees bind to
    pub symbols: HashMap<NodeId, Symbol>,
    /// What declarations (declarators, parameters, members, functions) declare
    pub declared: HashMap<NodeId, Symbol>,
    pub locals: Vec<LocalDef>,
    pub functions: Vec<FunctionDef>,
    pub scopes: Vec<ScopeRecord>,
    pub referenced_locals: HashSet<LocalId>,
    pub imports: ImportSet,
    pub diagnostics: Vec<SemanticDiagnostic>,
    pub used_usings: HashSet<usize>,
}

impl DocumentModel {
    pub fn expr_type(&self, id: NodeId) -> Option<&Ty> {
        self.expr_types.get(&id)
    }

    pub fn symbol(&self, id: NodeId) -> Option<&Symbol> {
        self.symbols.get(&id)
    }

    pub fn declared(&self, id: NodeId) -> Option<&Symbol> {
        self.declared.get(&id)
    }

    pub fn local(&self, id: LocalId) -> &LocalDef {
        &self.locals[id.0 as usize]
    }

    pub fn function(&self, id: FunctionId) -> &FunctionDef {
        &self.functions[id.0 as usize]
    }

    /// Scopes touching `offset`, outermost first
    pub fn scopes_at(&self, offset: usize) -> Vec<&ScopeRecord> {
        let mut scopes: Vec<&ScopeRecord> = self
            .scopes
            .iter()
            .filter(|s| s.span.touches(offset))
            .collect();
        scopes.sort_by_key(|s| std::cmp::Reverse(s.span.len()));
        scopes
    }

    /// Innermost scope at `offset`
    pub fn innermost_scope(&self, offset: usize) -> Option<&ScopeRecord> {
        self.scopes_at(offset).pop()
    }
}

#[derive(Debug)]
pub struct CompiledDocument {
    pub name: String,
    pub tree: Arc<SyntaxTree>,
    pub model: DocumentModel,
}

/// One linked, bound semantic unit
#[derive(Debug)]
pub struct Compilation {
    pub decls: Declarations,
    pub documents: Vec<CompiledDocument>,
}

impl Compilation {
    /// Link the referenced assemblies and `documents` (in order) and bind
    /// every document. `generated_document` names the document whose
    /// top-level classes are host globals. Stops with `Cancelled` soon
    /// after `cancel` fires.
    pub fn build(
        catalog: &AssemblyCatalog,
        assemblies: &BTreeSet<String>,
        imports: &BTreeSet<String>,
        documents: Vec<(String, Arc<SyntaxTree>)>,
        generated_document: &str,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        if cancel.is_cancelled() {
            return Err(WorkspaceError::Cancelled);
        }
        let linked = catalog.resolve(assemblies);
        let imports: Vec<String> = imports.iter().cloned().collect();
        let generated = documents
            .iter()
            .position(|(name, _)| name == generated_document);

        let mut facts: Vec<DocumentFacts> = documents.iter().map(|_| DocumentFacts::default()).collect();
        let sources: Vec<DocumentSource<'_>> = documents
            .iter()
            .map(|(name, tree)| DocumentSource { name, tree })
            .collect();
        let decls = declare::collect(&linked, &sources, generated, &imports, &mut facts);

        let analyzer = Analyzer::new();
        let mut compiled = Vec::with_capacity(documents.len());
        for (index, ((name, tree), facts)) in documents.iter().zip(facts).enumerate() {
            if cancel.is_cancelled() {
                return Err(WorkspaceError::Cancelled);
            }
            let mut model = Binder::new(&decls, index, tree, &imports, facts, cancel).bind()?;
            let findings = analyzer.analyze(tree, &model, &decls);
            model.diagnostics.extend(findings);
            model.diagnostics.sort_by_key(|d| (d.span.start, d.span.end));
            compiled.push(CompiledDocument {
                name: name.clone(),
                tree: Arc::clone(tree),
                model,
            });
        }

        Ok(Self {
            decls,
            documents: compiled,
        })
    }

    pub fn document(&self, name: &str) -> Option<&CompiledDocument> {
        self.documents.iter().find(|d| d.name == name)
    }

    /// Syntax and semantic diagnostics of one document, ordered by position
    pub fn diagnostics(&self, name: &str) -> Vec<SemanticDiagnostic> {
        let Some(document) = self.document(name) else {
            return Vec::new();
        };
        let mut out: Vec<SemanticDiagnostic> = document
            .tree
            .diagnostics
            .iter()
            .map(|d| SemanticDiagnostic::error(d.code, d.message.clone(), d.span))
            .collect();
        out.extend(document.model.diagnostics.iter().cloned());
        out.sort_by_key(|d| (d.span.start, d.span.end));
        out
    }
}
