//! Rule: Unnecessary Using
//!
//! Hints at `using` directives no name was resolved through.

use super::{AnalysisRule, RuleContext};
use crate::semantic::model::SemanticDiagnostic;

pub struct UnnecessaryUsingRule;

impl AnalysisRule for UnnecessaryUsingRule {
    fn id(&self) -> &'static str {
        "WS8019"
    }

    fn description(&self) -> &'static str {
        "Using directives that are not needed"
    }

    fn check(&self, cx: &RuleContext<'_>) -> Vec<SemanticDiagnostic> {
        cx.tree
            .root
            .usings
            .iter()
            .enumerate()
            .filter(|(index, _)| !cx.model.used_usings.contains(index))
            .map(|(_, using)| {
                SemanticDiagnostic::hidden(self.id(), "Unnecessary using directive", using.span)
            })
            .collect()
    }
}
