//! Rule: Unreachable Code
//!
//! Warns about the first statement of a statement list that follows a
//! statement control never falls out of.
//!
//! # Examples
//!
//! ```text
//! return 5;
//! var x = 10;  // <-- unreachable
//! ```
//!
//! ```text
//! if (done) { return 5; }
//! var x = 10;  // <-- reachable when `done` is false
//! ```

use super::{AnalysisRule, RuleContext};
use crate::semantic::flow;
use crate::semantic::model::SemanticDiagnostic;
use crate::syntax::{Body, Item, MemberDecl, Stmt, StmtKind, TypeDecl};

pub struct UnreachableCodeRule;

impl AnalysisRule for UnreachableCodeRule {
    fn id(&self) -> &'static str {
        "WS0162"
    }

    fn description(&self) -> &'static str {
        "Code after return/break/continue is unreachable"
    }

    fn check(&self, cx: &RuleContext<'_>) -> Vec<SemanticDiagnostic> {
        let mut diagnostics = Vec::new();
        let unit = &cx.tree.root;

        let script = unit.items.iter().filter_map(|item| match item {
            Item::Statement(stmt) => Some(stmt),
            _ => None,
        });
        check_stmts(script, &mut diagnostics, self.id());

        for item in &unit.items {
            match item {
                Item::Type(decl) => check_type(decl, &mut diagnostics, self.id()),
                Item::Namespace(ns) => {
                    for decl in &ns.types {
                        check_type(decl, &mut diagnostics, self.id());
                    }
                }
                Item::Statement(_) => {}
            }
        }
        diagnostics
    }
}

fn check_type(decl: &TypeDecl, diagnostics: &mut Vec<SemanticDiagnostic>, rule_id: &'static str) {
    let TypeDecl::Class(class) = decl else {
        return;
    };
    for member in &class.members {
        let body = match member {
            MemberDecl::Method(method) => method.body.as_ref(),
            MemberDecl::Constructor(ctor) => ctor.body.as_ref(),
            MemberDecl::Field(_) | MemberDecl::Property(_) => None,
        };
        if let Some(Body::Block(block)) = body {
            check_stmts(block.stmts.iter(), diagnostics, rule_id);
        }
    }
}

/// Check a list of statements, then everything nested in them
fn check_stmts<'s>(
    stmts: impl Iterator<Item = &'s Stmt> + Clone,
    diagnostics: &mut Vec<SemanticDiagnostic>,
    rule_id: &'static str,
) {
    if let Some(stmt) = flow::first_unreachable(stmts.clone()) {
        diagnostics.push(SemanticDiagnostic::warning(
            rule_id,
            "Unreachable code detected",
            stmt.span,
        ));
    }
    for stmt in stmts {
        check_children(stmt, diagnostics, rule_id);
    }
}

fn check_children(stmt: &Stmt, diagnostics: &mut Vec<SemanticDiagnostic>, rule_id: &'static str) {
    match &stmt.kind {
        StmtKind::Block(block) => check_stmts(block.stmts.iter(), diagnostics, rule_id),
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            check_children(then_branch, diagnostics, rule_id);
            if let Some(else_branch) = else_branch {
                check_children(else_branch, diagnostics, rule_id);
            }
        }
        StmtKind::While { body, .. } => check_children(body, diagnostics, rule_id),
        StmtKind::LocalFunction(method) => {
            if let Some(Body::Block(block)) = &method.body {
                check_stmts(block.stmts.iter(), diagnostics, rule_id);
            }
        }
        _ => {}
    }
}
