//! Rule-based analyzers
//!
//! Rules run after binding and look at the finished model. Each rule is
//! independent and reports one kind of finding.
//!
//! # Adding a Rule
//!
//! 1. Create a new file in `semantic/rules/`
//! 2. Implement [`AnalysisRule`] for your struct
//! 3. Add it to [`Analyzer::new`]

mod unnecessary_using;
mod unreachable_code;
mod unused_variable;

pub use unnecessary_using::UnnecessaryUsingRule;
pub use unreachable_code::UnreachableCodeRule;
pub use unused_variable::UnusedVariableRule;

use super::declare::Declarations;
use super::model::{DocumentModel, SemanticDiagnostic};
use crate::syntax::SyntaxTree;

/// What a rule gets to look at
pub struct RuleContext<'a> {
    pub tree: &'a SyntaxTree,
    pub model: &'a DocumentModel,
    pub decls: &'a Declarations,
}

// ============================================================================
// AnalysisRule Trait
// ============================================================================

/// Trait that all analysis rules implement.
pub trait AnalysisRule: Send + Sync {
    /// Diagnostic code this rule reports under (e.g. "WS0168")
    fn id(&self) -> &'static str;

    /// Human-readable description of what this rule checks
    fn description(&self) -> &'static str;

    /// Run the rule over one bound document
    fn check(&self, cx: &RuleContext<'_>) -> Vec<SemanticDiagnostic>;
}

// ============================================================================
// Analyzer - Runs All Rules
// ============================================================================

pub struct Analyzer {
    rules: Vec<Box<dyn AnalysisRule>>,
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            rules: vec![
                // Warnings
                Box::new(UnusedVariableRule),
                Box::new(UnreachableCodeRule),
                // Hints
                Box::new(UnnecessaryUsingRule),
            ],
        }
    }

    pub fn analyze(
        &self,
        tree: &SyntaxTree,
        model: &DocumentModel,
        decls: &Declarations,
    ) -> Vec<SemanticDiagnostic> {
        let cx = RuleContext { tree, model, decls };
        self.rules.iter().flat_map(|rule| rule.check(&cx)).collect()
    }

    /// Registered rules as `(id, description)`
    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.rules.iter().map(|r| (r.id(), r.description()))
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}
