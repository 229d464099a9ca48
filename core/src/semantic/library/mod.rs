//! Built-in assemblies
//!
//! An assembly is a named set of declarations written in the script
//! language itself. The catalog parses every known assembly once; a
//! compilation links the subset its context references.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::syntax::{self, SyntaxTree};

/// Always linked, whatever the context references
pub const CORE_ASSEMBLY: &str = "System.Runtime";

const BUILTIN: &[(&str, &str)] = &[
    (CORE_ASSEMBLY, include_str!("system_runtime.ws")),
    (
        "System.Text.RegularExpressions",
        include_str!("system_text_regularexpressions.ws"),
    ),
    ("System.Text.Json", include_str!("system_text_json.ws")),
    ("System.ComponentModel", include_str!("system_componentmodel.ws")),
];

#[derive(Debug)]
pub struct Assembly {
    pub name: String,
    pub tree: SyntaxTree,
}

/// Every assembly a context may reference, parsed and ready to link
#[derive(Debug, Clone)]
pub struct AssemblyCatalog {
    assemblies: BTreeMap<String, Arc<Assembly>>,
}

impl AssemblyCatalog {
    /// The assemblies shipped with the crate
    pub fn builtin() -> Self {
        BUILTIN
            .iter()
            .fold(Self::empty(), |catalog, (name, source)| {
                catalog.with_assembly(name, source)
            })
    }

    pub fn empty() -> Self {
        Self {
            assemblies: BTreeMap::new(),
        }
    }

    /// Register (or replace) an assembly from declaration source
    pub fn with_assembly(mut self, name: &str, source: &str) -> Self {
        let tree = syntax::parse(source);
        if tree.has_errors() {
            tracing::warn!(
                assembly = name,
                errors = tree.diagnostics.len(),
                "assembly declarations contain syntax errors"
            );
        }
        self.assemblies.insert(
            name.to_string(),
            Arc::new(Assembly {
                name: name.to_string(),
                tree,
            }),
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Assembly>> {
        self.assemblies.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.assemblies.keys().map(String::as_str)
    }

    /// The assemblies to link for a reference set: the core assembly first,
    /// then each known reference in order. Unknown names are skipped.
    pub fn resolve(&self, references: &BTreeSet<String>) -> Vec<Arc<Assembly>> {
        let mut linked = Vec::new();
        if let Some(core) = self.assemblies.get(CORE_ASSEMBLY) {
            linked.push(Arc::clone(core));
        }
        for name in references {
            if name == CORE_ASSEMBLY {
                continue;
            }
            match self.assemblies.get(name) {
                Some(assembly) => linked.push(Arc::clone(assembly)),
                None => tracing::warn!(assembly = %name, "ignoring unknown assembly reference"),
            }
        }
        linked
    }
}

impl Default for AssemblyCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreeset;

    #[test]
    fn test_builtin_assemblies_parse_cleanly() {
        let catalog = AssemblyCatalog::builtin();
        for name in catalog.names() {
            let assembly = catalog.get(name).expect("assembly");
            assert!(
                assembly.tree.diagnostics.is_empty(),
                "{}: {:?}",
                name,
                assembly.tree.diagnostics
            );
        }
    }

    #[test]
    fn test_resolve_puts_core_first_and_skips_unknown() {
        let catalog = AssemblyCatalog::builtin();
        let linked = catalog.resolve(&btreeset! {
            "System.Text.Json".to_string(),
            "Contoso.Missing".to_string(),
        });
        let names: Vec<_> = linked.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec![CORE_ASSEMBLY, "System.Text.Json"]);
    }
}
