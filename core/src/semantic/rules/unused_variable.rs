//! Rule: Unused Variable
//!
//! Warns about locals that are declared and never mentioned again.
//! Parameters and script-level locals are exempt: the latter behave like
//! fields of the script and are read by the host.

use super::{AnalysisRule, RuleContext};
use crate::semantic::model::SemanticDiagnostic;

pub struct UnusedVariableRule;

impl AnalysisRule for UnusedVariableRule {
    fn id(&self) -> &'static str {
        "WS0168"
    }

    fn description(&self) -> &'static str {
        "Local variables that are never used"
    }

    fn check(&self, cx: &RuleContext<'_>) -> Vec<SemanticDiagnostic> {
        cx.model
            .locals
            .iter()
            .filter(|local| !local.is_param && !local.is_script_level)
            .filter(|local| !cx.model.referenced_locals.contains(&local.id))
            .map(|local| {
                SemanticDiagnostic::warning(
                    self.id(),
                    format!("The variable '{}' is declared but never used", local.name),
                    local.span,
                )
            })
            .collect()
    }
}
