//! Name visibility: namespace imports for type lookup, and the lexical
//! frames the binder pushes while walking bodies

use std::collections::HashMap;

use super::declare::Declarations;
use super::model::{DocumentFacts, SemanticDiagnostic};
use super::types::{FunctionId, LocalId, Ty, TypeId};
use crate::syntax::{CompilationUnit, QualifiedName, TypeRef, TypeRefKind};

/// Namespaces searched for simple type names, in order
#[derive(Debug, Clone, Default)]
pub struct ImportSet {
    /// Namespace the code is declared in (searched with its parents first)
    pub namespace: String,
    /// Imported namespaces with the index of the `using` directive that
    /// brought them in (`None` for context-wide imports)
    pub imports: Vec<(String, Option<usize>)>,
}

impl ImportSet {
    pub fn for_assembly(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            imports: vec![("System".to_string(), None)],
        }
    }

    pub fn for_document(namespace: &str, unit: &CompilationUnit, global: &[String]) -> Self {
        let mut imports: Vec<(String, Option<usize>)> = unit
            .usings
            .iter()
            .enumerate()
            .map(|(i, u)| (u.name.dotted(), Some(i)))
            .collect();
        imports.extend(global.iter().map(|ns| (ns.clone(), None)));
        Self {
            namespace: namespace.to_string(),
            imports,
        }
    }

    /// The same imports seen from inside `namespace`
    pub fn within(&self, namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            imports: self.imports.clone(),
        }
    }

    /// Enclosing namespaces, innermost first, ending with the global one
    pub fn enclosing_namespaces(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = self.namespace.as_str();
        while !current.is_empty() {
            out.push(current.to_string());
            current = match current.rfind('.') {
                Some(dot) => &current[..dot],
                None => "",
            };
        }
        out.push(String::new());
        out
    }

    /// Resolve a simple type name. Returns the type and the `using`
    /// directive it was found through, if any.
    pub fn lookup_type(&self, decls: &Declarations, name: &str) -> Option<(TypeId, Option<usize>)> {
        for namespace in self.enclosing_namespaces() {
            if let Some(id) = decls.find_type(&namespace, name) {
                return Some((id, None));
            }
        }
        self.imports.iter().find_map(|(namespace, using)| {
            decls
                .find_type(namespace, name)
                .filter(|id| decls.is_type_accessible(*id))
                .map(|id| (id, *using))
        })
    }

    /// Resolve the first segment of a dotted name as a namespace, relative
    /// to the enclosing namespaces
    pub fn lookup_namespace(&self, decls: &Declarations, name: &str) -> Option<String> {
        self.enclosing_namespaces().into_iter().find_map(|outer| {
            let candidate = if outer.is_empty() {
                name.to_string()
            } else {
                format!("{}.{}", outer, name)
            };
            decls.namespace_exists(&candidate).then_some(candidate)
        })
    }

    /// Types reachable by simple name, for completion
    pub fn visible_types(&self, decls: &Declarations) -> Vec<TypeId> {
        let mut out: Vec<TypeId> = Vec::new();
        let namespaces = self
            .enclosing_namespaces()
            .into_iter()
            .chain(self.imports.iter().map(|(ns, _)| ns.clone()));
        for namespace in namespaces {
            for id in decls.types_in(&namespace) {
                if decls.is_type_accessible(*id) && !out.contains(id) {
                    out.push(*id);
                }
            }
        }
        out
    }
}

/// Resolve a syntactic type. Unknown names are reported into `facts`;
/// `var` resolves to `Error` and is the caller's business.
pub fn resolve_type_ref(
    ty: &TypeRef,
    decls: &Declarations,
    imports: &ImportSet,
    facts: &mut DocumentFacts,
) -> Ty {
    match &ty.kind {
        TypeRefKind::Var | TypeRefKind::Missing => Ty::Error,
        TypeRefKind::Predefined(p) => decls.predefined(*p),
        TypeRefKind::Named(name) => match resolve_type_name(name, decls, imports, facts) {
            Some(id) => Ty::Named(id),
            None => Ty::Error,
        },
        TypeRefKind::Array(inner) => {
            Ty::Array(Box::new(resolve_type_ref(inner, decls, imports, facts)))
        }
        TypeRefKind::Nullable(inner) => match resolve_type_ref(inner, decls, imports, facts) {
            Ty::Error => Ty::Error,
            nullable @ Ty::Nullable(_) => nullable,
            inner => Ty::Nullable(Box::new(inner)),
        },
    }
}

fn resolve_type_name(
    name: &QualifiedName,
    decls: &Declarations,
    imports: &ImportSet,
    facts: &mut DocumentFacts,
) -> Option<TypeId> {
    if name.parts.iter().any(|p| p.is_missing()) {
        return None;
    }
    let last = name.last()?;

    if name.parts.len() == 1 {
        if let Some((id, using)) = imports.lookup_type(decls, &last.name) {
            if let Some(using) = using {
                facts.used_usings.insert(using);
            }
            return Some(id);
        }
        facts.diagnostics.push(SemanticDiagnostic::error(
            "WS0246",
            format!(
                "The type or namespace name '{}' could not be found (are you missing a using directive or an assembly reference?)",
                last.name
            ),
            name.span,
        ));
        return None;
    }

    let prefix: Vec<&str> = name.parts[..name.parts.len() - 1]
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    let namespace = imports.lookup_namespace(decls, &prefix.join("."));
    if let Some(namespace) = &namespace {
        if let Some(id) = decls.find_type(namespace, &last.name) {
            return Some(id);
        }
    }

    let (code, message) = match namespace {
        Some(namespace) => (
            "WS0234",
            format!(
                "The type or namespace name '{}' does not exist in the namespace '{}' (are you missing an assembly reference?)",
                last.name, namespace
            ),
        ),
        None => (
            "WS0246",
            format!(
                "The type or namespace name '{}' could not be found (are you missing a using directive or an assembly reference?)",
                prefix[0]
            ),
        ),
    };
    facts
        .diagnostics
        .push(SemanticDiagnostic::error(code, message, name.span));
    None
}

// ============================================================================
// Binder frames
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    /// Script body of a document
    Script,
    /// Method, constructor, local function or accessor-less initializer
    Function {
        name: String,
        return_ty: Ty,
    },
    Block,
    Loop,
}

/// One lexical scope on the binder's stack
#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: FrameKind,
    pub locals: HashMap<String, LocalId>,
    pub functions: HashMap<String, FunctionId>,
    /// Names of locals declared later in this block
    pub pending: Vec<String>,
    /// Index of the matching record in the document model
    pub record: usize,
}

impl Frame {
    pub fn new(kind: FrameKind, record: usize) -> Self {
        Self {
            kind,
            locals: HashMap::new(),
            functions: HashMap::new(),
            pending: Vec::new(),
            record,
        }
    }
}
