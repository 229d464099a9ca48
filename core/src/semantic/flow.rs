//! Reachability over statement lists

use crate::syntax::{Expr, ExprKind, Literal, Stmt, StmtKind};

/// Whether control can fall out of the end of `stmt`
pub fn completes_normally(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue => false,
        StmtKind::Block(block) => block_completes(&block.stmts),
        StmtKind::If {
            then_branch,
            else_branch: Some(else_branch),
            ..
        } => completes_normally(then_branch) || completes_normally(else_branch),
        StmtKind::While { cond, body } => !is_constant_true(cond) || breaks_out(body),
        _ => true,
    }
}

pub fn block_completes(stmts: &[Stmt]) -> bool {
    stmts.iter().all(completes_normally)
}

/// First statement control cannot reach, skipping local function
/// declarations and empty statements
pub fn first_unreachable<'s>(stmts: impl IntoIterator<Item = &'s Stmt>) -> Option<&'s Stmt> {
    let mut stopped = false;
    for stmt in stmts {
        if stopped && !matches!(stmt.kind, StmtKind::LocalFunction(_) | StmtKind::Empty) {
            return Some(stmt);
        }
        stopped |= !completes_normally(stmt);
    }
    None
}

/// A `break` that leaves the loop whose body is `stmt`
fn breaks_out(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Break => true,
        StmtKind::Block(block) => block.stmts.iter().any(breaks_out),
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => breaks_out(then_branch) || else_branch.as_deref().map_or(false, breaks_out),
        _ => false,
    }
}

fn is_constant_true(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Literal(Literal::Bool(value)) => *value,
        ExprKind::Paren(inner) => is_constant_true(inner),
        _ => false,
    }
}
