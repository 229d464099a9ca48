use serde::{Deserialize, Serialize};

use crate::semantic::{display, CompiledDocument, Compilation, Declarations, Symbol, Ty};
use crate::syntax::finder::{self, NodeRef};
use crate::syntax::{text, ExprKind, MemberDecl, TextSpan, TypeRef};

/// Hover text for a span of the document; `[from, to)` in characters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoverInfo {
    pub text: String,
    pub from: usize,
    pub to: usize,
}

/// What to show when hovering at character `position`. `None` when the
/// cursor is not over anything with a type or a symbol.
pub fn hover(compilation: &Compilation, document: &str, position: usize) -> Option<HoverInfo> {
    let compiled = compilation.document(document)?;
    let tree = &compiled.tree;
    let offset = text::char_to_byte(&tree.text, position)?;
    let token = tree.token_at(offset)?;
    if token.kind.is_trivia() {
        return None;
    }

    let path = finder::node_path(&tree.root, token.span);
    let node = path.last()?;
    let decls = &compilation.decls;
    let model = &compiled.model;

    let (text, span) = match *node {
        NodeRef::Declarator(declarator) => {
            let init = declarator.init.as_ref()?;
            let ty = known(model.expr_type(init.id))?;
            (display::ty(decls, ty), declarator.span)
        }
        NodeRef::Member(MemberDecl::Property(property)) => {
            let declared = match model.declared(property.id) {
                Some(Symbol::Member(id)) => Some(&decls.member(*id).ty),
                _ => None,
            };
            (declared_type(decls, compiled, declared, &property.ty), property.span)
        }
        NodeRef::Parameter(parameter) => {
            let declared = match model.declared(parameter.id) {
                Some(Symbol::Local(id)) => Some(&model.local(*id).ty),
                _ => None,
            };
            (declared_type(decls, compiled, declared, &parameter.ty), parameter.span)
        }
        NodeRef::Expr(expr) => {
            let span = match &expr.kind {
                ExprKind::Name(ident) => ident.span,
                ExprKind::Member { name, .. } if name.span.covers(token.span) => name.span,
                _ => expr.span,
            };
            let identifier = matches!(&expr.kind, ExprKind::Name(_))
                || matches!(&expr.kind, ExprKind::Member { name, .. } if name.span.covers(token.span));
            let typed = identifier
                .then(|| known(model.expr_type(expr.id)))
                .flatten()
                .filter(|ty| **ty != Ty::Void);
            match typed {
                Some(ty) => (display::ty(decls, ty), span),
                None => {
                    let symbol = model.symbol(expr.id)?;
                    (display::describe_symbol(decls, model, symbol), span)
                }
            }
        }
        _ => return None,
    };

    let (from, to) = text::span_to_chars(&tree.text, span);
    Some(HoverInfo { text, from, to })
}

fn known(ty: Option<&Ty>) -> Option<&Ty> {
    ty.filter(|ty| !ty.is_error())
}

/// Resolved declared type, or the source text when it did not resolve
fn declared_type(
    decls: &Declarations,
    compiled: &CompiledDocument,
    declared: Option<&Ty>,
    syntax: &TypeRef,
) -> String {
    match known(declared) {
        Some(ty) => display::ty(decls, ty),
        None => source_text(compiled, syntax.span).to_string(),
    }
}

fn source_text(compiled: &CompiledDocument, span: TextSpan) -> &str {
    compiled.tree.text.get(span.start..span.end).unwrap_or_default()
}
