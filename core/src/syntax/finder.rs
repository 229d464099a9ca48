//! Node lookup by source position
//!
//! [`NodeRef`] gives a uniform view over the heterogeneous AST so callers
//! can walk ancestors of a position or visit every node without matching on
//! each declaration type themselves.

use super::ast::*;
use super::token::TextSpan;

#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Using(&'a UsingDirective),
    Namespace(&'a NamespaceDecl),
    Type(&'a TypeDecl),
    Member(&'a MemberDecl),
    EnumVariant(&'a EnumVariant),
    Attribute(&'a Attribute),
    Declarator(&'a VariableDeclarator),
    Parameter(&'a Parameter),
    Stmt(&'a Stmt),
    Expr(&'a Expr),
    TypeRef(&'a TypeRef),
}

impl<'a> NodeRef<'a> {
    pub fn span(&self) -> TextSpan {
        match self {
            NodeRef::Using(u) => u.span,
            NodeRef::Namespace(n) => n.span,
            NodeRef::Type(t) => t.span(),
            NodeRef::Member(m) => m.span(),
            NodeRef::EnumVariant(v) => v.span,
            NodeRef::Attribute(a) => a.span,
            NodeRef::Declarator(d) => d.span,
            NodeRef::Parameter(p) => p.span,
            NodeRef::Stmt(s) => s.span,
            NodeRef::Expr(e) => e.span,
            NodeRef::TypeRef(t) => t.span,
        }
    }

    pub fn children(&self) -> Vec<NodeRef<'a>> {
        let mut out = Vec::new();
        match *self {
            NodeRef::Using(_) | NodeRef::TypeRef(_) => {}
            NodeRef::Namespace(n) => out.extend(n.types.iter().map(NodeRef::Type)),
            NodeRef::Type(TypeDecl::Class(c)) => {
                out.extend(c.attributes.iter().map(NodeRef::Attribute));
                out.extend(c.members.iter().map(NodeRef::Member));
            }
            NodeRef::Type(TypeDecl::Enum(e)) => {
                out.extend(e.attributes.iter().map(NodeRef::Attribute));
                out.extend(e.variants.iter().map(NodeRef::EnumVariant));
            }
            NodeRef::Member(member) => member_children(member, &mut out),
            NodeRef::EnumVariant(v) => out.extend(v.value.iter().map(NodeRef::Expr)),
            NodeRef::Attribute(a) => {
                if let Some(args) = &a.args {
                    out.extend(args.args.iter().map(NodeRef::Expr));
                }
            }
            NodeRef::Declarator(d) => out.extend(d.init.iter().map(NodeRef::Expr)),
            NodeRef::Parameter(p) => {
                out.push(NodeRef::TypeRef(&p.ty));
                out.extend(p.default.iter().map(NodeRef::Expr));
            }
            NodeRef::Stmt(stmt) => stmt_children(stmt, &mut out),
            NodeRef::Expr(expr) => expr_children(expr, &mut out),
        }
        out
    }
}

fn member_children<'a>(member: &'a MemberDecl, out: &mut Vec<NodeRef<'a>>) {
    match member {
        MemberDecl::Field(f) => {
            out.extend(f.attributes.iter().map(NodeRef::Attribute));
            out.push(NodeRef::TypeRef(&f.ty));
            out.extend(f.declarators.iter().map(NodeRef::Declarator));
        }
        MemberDecl::Property(p) => {
            out.extend(p.attributes.iter().map(NodeRef::Attribute));
            out.push(NodeRef::TypeRef(&p.ty));
            out.extend(p.init.iter().map(NodeRef::Expr));
        }
        MemberDecl::Method(m) => method_children(m, out),
        MemberDecl::Constructor(c) => {
            out.extend(c.attributes.iter().map(NodeRef::Attribute));
            out.extend(c.params.params.iter().map(NodeRef::Parameter));
            body_children(c.body.as_ref(), out);
        }
    }
}

fn method_children<'a>(method: &'a MethodDecl, out: &mut Vec<NodeRef<'a>>) {
    out.extend(method.attributes.iter().map(NodeRef::Attribute));
    out.push(NodeRef::TypeRef(&method.return_ty));
    out.extend(method.params.params.iter().map(NodeRef::Parameter));
    body_children(method.body.as_ref(), out);
}

fn body_children<'a>(body: Option<&'a Body>, out: &mut Vec<NodeRef<'a>>) {
    match body {
        Some(Body::Block(block)) => out.extend(block.stmts.iter().map(NodeRef::Stmt)),
        Some(Body::Expr(expr)) => out.push(NodeRef::Expr(expr)),
        None => {}
    }
}

fn stmt_children<'a>(stmt: &'a Stmt, out: &mut Vec<NodeRef<'a>>) {
    match &stmt.kind {
        StmtKind::Block(block) => out.extend(block.stmts.iter().map(NodeRef::Stmt)),
        StmtKind::Local(local) => {
            out.push(NodeRef::TypeRef(&local.ty));
            out.extend(local.declarators.iter().map(NodeRef::Declarator));
        }
        StmtKind::LocalFunction(method) => method_children(method, out),
        StmtKind::Expr { expr, .. } => out.push(NodeRef::Expr(expr)),
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            out.push(NodeRef::Expr(cond));
            out.push(NodeRef::Stmt(then_branch));
            if let Some(else_branch) = else_branch {
                out.push(NodeRef::Stmt(else_branch));
            }
        }
        StmtKind::While { cond, body } => {
            out.push(NodeRef::Expr(cond));
            out.push(NodeRef::Stmt(body));
        }
        StmtKind::Return(value) => out.extend(value.iter().map(NodeRef::Expr)),
        StmtKind::Break | StmtKind::Continue | StmtKind::Empty => {}
    }
}

fn expr_children<'a>(expr: &'a Expr, out: &mut Vec<NodeRef<'a>>) {
    match &expr.kind {
        ExprKind::Member { target, .. } => out.push(NodeRef::Expr(target)),
        ExprKind::Invoke { callee, args } => {
            out.push(NodeRef::Expr(callee));
            out.extend(args.args.iter().map(NodeRef::Expr));
        }
        ExprKind::Index { target, args } => {
            out.push(NodeRef::Expr(target));
            out.extend(args.args.iter().map(NodeRef::Expr));
        }
        ExprKind::New { ty, args } => {
            out.push(NodeRef::TypeRef(ty));
            if let Some(args) = args {
                out.extend(args.args.iter().map(NodeRef::Expr));
            }
        }
        ExprKind::TypeOf(ty) => out.push(NodeRef::TypeRef(ty)),
        ExprKind::Unary { operand, .. } => out.push(NodeRef::Expr(operand)),
        ExprKind::Binary { lhs, rhs, .. } => {
            out.push(NodeRef::Expr(lhs));
            out.push(NodeRef::Expr(rhs));
        }
        ExprKind::Assign { target, value, .. } => {
            out.push(NodeRef::Expr(target));
            out.push(NodeRef::Expr(value));
        }
        ExprKind::Conditional {
            cond,
            when_true,
            when_false,
        } => {
            out.push(NodeRef::Expr(cond));
            out.push(NodeRef::Expr(when_true));
            out.push(NodeRef::Expr(when_false));
        }
        ExprKind::Paren(inner) => out.push(NodeRef::Expr(inner)),
        ExprKind::Literal(_)
        | ExprKind::Name(_)
        | ExprKind::PredefinedType(_)
        | ExprKind::This
        | ExprKind::Missing => {}
    }
}

/// Top-level nodes of a compilation unit
pub fn root_nodes(unit: &CompilationUnit) -> Vec<NodeRef<'_>> {
    let mut out: Vec<NodeRef<'_>> = unit.usings.iter().map(NodeRef::Using).collect();
    for item in &unit.items {
        out.push(match item {
            Item::Namespace(n) => NodeRef::Namespace(n),
            Item::Type(t) => NodeRef::Type(t),
            Item::Statement(s) => NodeRef::Stmt(s),
        });
    }
    out
}

/// Chain of nodes covering `target`, outermost first
pub fn node_path(unit: &CompilationUnit, target: TextSpan) -> Vec<NodeRef<'_>> {
    let mut path = Vec::new();
    let mut candidates = root_nodes(unit);
    while let Some(next) = candidates.iter().find(|n| n.span().covers(target)).copied() {
        path.push(next);
        candidates = next.children();
    }
    path
}

/// Pre-order visit of every node with its depth
pub fn walk<'a>(unit: &'a CompilationUnit, visit: &mut dyn FnMut(NodeRef<'a>, usize)) {
    fn go<'a>(node: NodeRef<'a>, depth: usize, visit: &mut dyn FnMut(NodeRef<'a>, usize)) {
        visit(node, depth);
        for child in node.children() {
            go(child, depth + 1, visit);
        }
    }
    for node in root_nodes(unit) {
        go(node, 0, visit);
    }
}

/// The member access whose `.` token sits at `dot`
pub fn member_access_at_dot(unit: &CompilationUnit, dot: TextSpan) -> Option<&Expr> {
    let mut found = None;
    walk(unit, &mut |node, _| {
        if let NodeRef::Expr(expr) = node {
            if matches!(&expr.kind, ExprKind::Member { dot: d, .. } if *d == dot) {
                found = Some(expr);
            }
        }
    });
    found
}

/// Innermost invocation, object creation or attribute whose argument list
/// contains `offset`
pub fn enclosing_call(unit: &CompilationUnit, offset: usize) -> Option<NodeRef<'_>> {
    let mut best: Option<(NodeRef<'_>, usize)> = None;
    walk(unit, &mut |node, depth| {
        let args = match node {
            NodeRef::Expr(Expr {
                kind: ExprKind::Invoke { args, .. },
                ..
            }) => Some(args),
            NodeRef::Expr(Expr {
                kind: ExprKind::New { args, .. },
                ..
            }) => args.as_ref(),
            NodeRef::Attribute(attribute) => attribute.args.as_ref(),
            _ => None,
        };
        let Some(args) = args else {
            return;
        };
        if args.contains_position(offset) && best.map_or(true, |(_, d)| depth >= d) {
            best = Some((node, depth));
        }
    });
    best.map(|(node, _)| node)
}
