//! Signature help inside argument lists
//!
//! Overloads are enumerated in declaration order. Each is scored against
//! the arguments typed so far: an argument of exactly the parameter's type
//! earns 2, an argument of unknown type earns 1, and an overload with fewer
//! parameters than arguments is ruled out. On equal scores the overload
//! whose parameter count is closest to the argument count wins, then the
//! first one.

use serde::{Deserialize, Serialize};

use crate::semantic::types::{FunctionId, MemberId, ParamDef};
use crate::semantic::{display, CompiledDocument, Compilation, Declarations, Symbol, Ty, TypeId};
use crate::syntax::finder::{self, NodeRef};
use crate::syntax::{text, ArgList, Expr, ExprKind, Ident};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignatureCandidate {
    pub label: String,
    pub documentation: Option<String>,
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureResult {
    /// De-duplicated, in declaration order
    pub signatures: Vec<SignatureCandidate>,
    /// Index of the best matching signature; `None` when there are none
    pub active_signature: Option<usize>,
    pub active_parameter: usize,
}

#[derive(Debug, Clone, Copy)]
enum Overload {
    Member(MemberId),
    Function(FunctionId),
    /// Parameterless constructor of a type that declares none
    Implicit(TypeId),
}

impl Overload {
    fn params<'a>(&self, decls: &'a Declarations, compiled: &'a CompiledDocument) -> &'a [ParamDef] {
        match self {
            Overload::Member(id) => &decls.member(*id).params,
            Overload::Function(id) => &compiled.model.function(*id).params,
            Overload::Implicit(_) => &[],
        }
    }

    fn candidate(&self, decls: &Declarations, compiled: &CompiledDocument) -> SignatureCandidate {
        let (label, documentation) = match self {
            Overload::Member(id) => {
                let member = decls.member(*id);
                (display::signature_label(decls, member), member.doc.clone())
            }
            Overload::Function(id) => {
                let function = compiled.model.function(*id);
                (display::function_label(decls, function), function.doc.clone())
            }
            Overload::Implicit(id) => (format!("{}()", display::type_name(decls, *id)), None),
        };
        SignatureCandidate {
            label,
            documentation,
            parameters: self
                .params(decls, compiled)
                .iter()
                .map(|p| display::param(decls, p))
                .collect(),
        }
    }
}

/// Signature help at character `position`. `None` when the cursor is not
/// inside the argument list of a call, an object creation or an attribute.
pub fn signatures(compilation: &Compilation, document: &str, position: usize) -> Option<SignatureResult> {
    let compiled = compilation.document(document)?;
    let tree = &compiled.tree;
    let offset = text::char_to_byte(&tree.text, position)?;
    let decls = &compilation.decls;
    let model = &compiled.model;

    let (args, group) = match finder::enclosing_call(&tree.root, offset)? {
        NodeRef::Expr(expr) => match &expr.kind {
            ExprKind::Invoke { callee, args } => (args, invocation_group(decls, compiled, callee, offset)),
            ExprKind::New { args: Some(args), .. } => {
                let group = model
                    .expr_type(expr.id)
                    .and_then(Ty::as_named)
                    .map(|id| constructor_group(decls, compiled, id, offset))
                    .unwrap_or_default();
                (args, group)
            }
            _ => return None,
        },
        NodeRef::Attribute(attribute) => {
            let group = match model.symbol(attribute.id) {
                Some(Symbol::Type(id)) => constructor_group(decls, compiled, *id, offset),
                _ => Vec::new(),
            };
            (attribute.args.as_ref()?, group)
        }
        _ => return None,
    };

    let active_parameter = active_parameter(args, offset);
    let arg_types: Vec<Ty> = args
        .args
        .iter()
        .map(|arg| model.expr_type(arg.id).cloned().unwrap_or(Ty::Error))
        .collect();

    let mut signatures: Vec<SignatureCandidate> = Vec::new();
    let mut best: Option<(i32, usize, usize)> = None;
    for overload in &group {
        let params = overload.params(decls, compiled);
        let candidate = overload.candidate(decls, compiled);
        let index = match signatures.iter().position(|s| *s == candidate) {
            Some(index) => index,
            None => {
                signatures.push(candidate);
                signatures.len() - 1
            }
        };

        let score = score(params, &arg_types);
        let distance = params.len().abs_diff(arg_types.len());
        let better = match best {
            None => true,
            Some((best_score, best_distance, _)) => {
                score > best_score || (score == best_score && distance < best_distance)
            }
        };
        if better {
            best = Some((score, distance, index));
        }
    }

    tracing::debug!(
        document = %document,
        position,
        signatures = signatures.len(),
        active_parameter,
        "signature help computed"
    );
    Some(SignatureResult {
        signatures,
        active_signature: best.map(|(_, _, index)| index),
        active_parameter,
    })
}

/// Separators before the cursor
fn active_parameter(args: &ArgList, offset: usize) -> usize {
    args.separators.iter().filter(|s| s.start < offset).count()
}

fn score(params: &[ParamDef], arg_types: &[Ty]) -> i32 {
    if params.len() < arg_types.len() {
        return i32::MIN;
    }
    arg_types
        .iter()
        .zip(params)
        .map(|(arg, param)| {
            if arg.is_unknown() {
                1
            } else if *arg == param.ty {
                2
            } else {
                0
            }
        })
        .sum()
}

fn invocation_group(
    decls: &Declarations,
    compiled: &CompiledDocument,
    callee: &Expr,
    offset: usize,
) -> Vec<Overload> {
    let model = &compiled.model;
    let scope = model.innermost_scope(offset);
    let from_type = scope.and_then(|s| s.enclosing_type);

    match &callee.kind {
        ExprKind::Member { target, name, .. } => {
            if name.is_missing() {
                return Vec::new();
            }
            let (host, include_static, include_instance) = match model.symbol(target.id) {
                Some(Symbol::Type(id)) => (Some(*id), true, false),
                Some(Symbol::Global(id)) => (Some(*id), true, true),
                Some(Symbol::Namespace(_)) => return Vec::new(),
                _ => (
                    model.expr_type(target.id).and_then(|ty| decls.member_host(ty)),
                    false,
                    true,
                ),
            };
            let Some(host) = host else {
                return Vec::new();
            };
            decls
                .members_named(host, &name.name)
                .into_iter()
                .filter(|id| {
                    let member = decls.member(*id);
                    member.is_invocable()
                        && decls.is_accessible(member, from_type)
                        && ((member.is_static && include_static)
                            || (!member.is_static && include_instance))
                })
                .map(Overload::Member)
                .collect()
        }
        ExprKind::Name(ident) => simple_name_group(decls, compiled, ident, offset),
        _ => Vec::new(),
    }
}

/// Local functions shadow methods of the enclosing type; in a static
/// context only static methods are candidates
fn simple_name_group(
    decls: &Declarations,
    compiled: &CompiledDocument,
    ident: &Ident,
    offset: usize,
) -> Vec<Overload> {
    let model = &compiled.model;
    let scopes = model.scopes_at(offset);
    let functions: Vec<Overload> = scopes
        .iter()
        .rev()
        .flat_map(|scope| scope.functions.iter())
        .filter(|id| model.function(**id).name == ident.name)
        .take(1)
        .map(|id| Overload::Function(*id))
        .collect();
    if !functions.is_empty() {
        return functions;
    }

    let Some(scope) = scopes.last() else {
        return Vec::new();
    };
    let Some(owner) = scope.enclosing_type else {
        return Vec::new();
    };
    decls
        .members_named(owner, &ident.name)
        .into_iter()
        .filter(|id| {
            let member = decls.member(*id);
            member.is_invocable() && (!scope.is_static || member.is_static)
        })
        .map(Overload::Member)
        .collect()
}

fn constructor_group(
    decls: &Declarations,
    compiled: &CompiledDocument,
    id: TypeId,
    offset: usize,
) -> Vec<Overload> {
    let from_type = compiled
        .model
        .innermost_scope(offset)
        .and_then(|s| s.enclosing_type);
    let ctors = decls.constructors(id);
    if ctors.is_empty() {
        return vec![Overload::Implicit(id)];
    }
    let mut group: Vec<Overload> = ctors
        .into_iter()
        .filter(|c| decls.is_accessible(decls.member(*c), from_type))
        .map(Overload::Member)
        .collect();
    if decls.type_def(id).is_value_type() {
        group.insert(0, Overload::Implicit(id));
    }
    group
}
