//! Implicit conversions and operator result types

use super::declare::Declarations;
use super::types::Ty;
use crate::syntax::{BinaryOp, PredefinedType, UnaryOp};

/// Numeric types ordered by implicit widening
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Numeric {
    Char,
    Int,
    Long,
    Float,
    Double,
    Decimal,
}

impl Numeric {
    fn is_integral(self) -> bool {
        matches!(self, Numeric::Char | Numeric::Int | Numeric::Long)
    }

    fn predefined(self) -> PredefinedType {
        match self {
            Numeric::Char => PredefinedType::Char,
            Numeric::Int => PredefinedType::Int,
            Numeric::Long => PredefinedType::Long,
            Numeric::Float => PredefinedType::Float,
            Numeric::Double => PredefinedType::Double,
            Numeric::Decimal => PredefinedType::Decimal,
        }
    }

    fn widens_to(self, target: Numeric) -> bool {
        if self == target {
            return true;
        }
        match self {
            Numeric::Char => target != Numeric::Char,
            Numeric::Int => matches!(
                target,
                Numeric::Long | Numeric::Float | Numeric::Double | Numeric::Decimal
            ),
            Numeric::Long => matches!(target, Numeric::Float | Numeric::Double | Numeric::Decimal),
            Numeric::Float => target == Numeric::Double,
            Numeric::Double | Numeric::Decimal => false,
        }
    }
}

fn numeric(decls: &Declarations, ty: &Ty) -> Option<Numeric> {
    let predefined = decls.predefined_of(ty.as_named()?)?;
    match predefined {
        PredefinedType::Char => Some(Numeric::Char),
        PredefinedType::Int => Some(Numeric::Int),
        PredefinedType::Long => Some(Numeric::Long),
        PredefinedType::Float => Some(Numeric::Float),
        PredefinedType::Double => Some(Numeric::Double),
        PredefinedType::Decimal => Some(Numeric::Decimal),
        _ => None,
    }
}

fn is_predefined(decls: &Declarations, ty: &Ty, predefined: PredefinedType) -> bool {
    ty.as_named()
        .and_then(|id| decls.predefined_of(id))
        .map_or(false, |p| p == predefined)
}

pub fn is_bool(decls: &Declarations, ty: &Ty) -> bool {
    is_predefined(decls, ty, PredefinedType::Bool)
}

pub fn is_string(decls: &Declarations, ty: &Ty) -> bool {
    is_predefined(decls, ty, PredefinedType::String)
}

pub fn is_numeric(decls: &Declarations, ty: &Ty) -> bool {
    numeric(decls, ty).is_some()
}

/// Whether a value of type `from` may be used where `to` is expected
pub fn is_convertible(decls: &Declarations, from: &Ty, to: &Ty) -> bool {
    if from.is_error() || to.is_error() || from == to {
        return true;
    }
    match (from, to) {
        (Ty::Void, _) | (_, Ty::Void) => false,
        (Ty::Null, Ty::Nullable(_)) => true,
        (Ty::Null, target) => !decls.is_value_type(target),
        (_, target) if is_predefined(decls, target, PredefinedType::Object) => true,
        (source, Ty::Nullable(inner)) => is_convertible(decls, source.strip_nullable(), inner),
        (Ty::Nullable(_), _) => false,
        (Ty::Array(a), Ty::Array(b)) => a == b,
        (Ty::Array(_), Ty::Named(id)) => decls.system_type("Array").as_named() == Some(*id),
        (Ty::Named(_), Ty::Named(_)) => match (numeric(decls, from), numeric(decls, to)) {
            (Some(a), Some(b)) => a.widens_to(b),
            _ => false,
        },
        _ => false,
    }
}

/// Common type of two numeric operands, `None` when there is none
fn promote(a: Numeric, b: Numeric) -> Option<Numeric> {
    let wider = a.max(b).max(Numeric::Int);
    let mixes_decimal = wider == Numeric::Decimal
        && matches!(a.min(b), Numeric::Float | Numeric::Double);
    if mixes_decimal {
        None
    } else {
        Some(wider)
    }
}

fn numeric_ty(decls: &Declarations, n: Numeric) -> Ty {
    decls.predefined(n.predefined())
}

/// Result type of a binary operator; `None` when the operator does not
/// apply to the operand types
pub fn binary_result(decls: &Declarations, op: BinaryOp, lhs: &Ty, rhs: &Ty) -> Option<Ty> {
    if lhs.is_error() || rhs.is_error() {
        return Some(match op {
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::And
            | BinaryOp::Or => decls.predefined(PredefinedType::Bool),
            _ => Ty::Error,
        });
    }
    let bool_ty = decls.predefined(PredefinedType::Bool);

    match op {
        BinaryOp::Add if is_string(decls, lhs) || is_string(decls, rhs) => {
            if matches!(lhs, Ty::Void) || matches!(rhs, Ty::Void) {
                None
            } else {
                Some(decls.predefined(PredefinedType::String))
            }
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            lifted_numeric(decls, lhs, rhs)
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            lifted_numeric(decls, lhs, rhs).map(|_| bool_ty)
        }
        BinaryOp::Eq | BinaryOp::Ne => {
            let comparable = matches!(lhs, Ty::Null)
                || matches!(rhs, Ty::Null)
                || is_convertible(decls, lhs, rhs)
                || is_convertible(decls, rhs, lhs)
                || lifted_numeric(decls, lhs, rhs).is_some();
            comparable.then_some(bool_ty)
        }
        BinaryOp::And | BinaryOp::Or => {
            (is_bool(decls, lhs) && is_bool(decls, rhs)).then_some(bool_ty)
        }
        BinaryOp::BitAnd | BinaryOp::BitOr => {
            if is_bool(decls, lhs) && is_bool(decls, rhs) {
                return Some(bool_ty);
            }
            let a = numeric(decls, lhs)?;
            let b = numeric(decls, rhs)?;
            if a.is_integral() && b.is_integral() {
                promote(a, b).map(|n| numeric_ty(decls, n))
            } else {
                None
            }
        }
        BinaryOp::Coalesce => coalesce_result(decls, lhs, rhs),
    }
}

/// Numeric promotion, lifted over nullable operands
fn lifted_numeric(decls: &Declarations, lhs: &Ty, rhs: &Ty) -> Option<Ty> {
    let lifted = matches!(lhs, Ty::Nullable(_)) || matches!(rhs, Ty::Nullable(_));
    let a = numeric(decls, lhs.strip_nullable())?;
    let b = numeric(decls, rhs.strip_nullable())?;
    let ty = numeric_ty(decls, promote(a, b)?);
    Some(if lifted {
        Ty::Nullable(Box::new(ty))
    } else {
        ty
    })
}

fn coalesce_result(decls: &Declarations, lhs: &Ty, rhs: &Ty) -> Option<Ty> {
    match lhs {
        Ty::Null => Some(rhs.clone()),
        Ty::Nullable(inner) => {
            if is_convertible(decls, rhs, inner) {
                Some((**inner).clone())
            } else if is_convertible(decls, rhs, lhs) {
                Some(lhs.clone())
            } else {
                None
            }
        }
        other if decls.is_value_type(other) => None,
        other => is_convertible(decls, rhs, other).then(|| other.clone()),
    }
}

/// Result type of a unary operator
pub fn unary_result(decls: &Declarations, op: UnaryOp, operand: &Ty) -> Option<Ty> {
    if operand.is_error() {
        return Some(Ty::Error);
    }
    match op {
        UnaryOp::Not => is_bool(decls, operand).then(|| operand.clone()),
        UnaryOp::Negate | UnaryOp::Plus => {
            let n = numeric(decls, operand)?;
            Some(numeric_ty(decls, n.max(Numeric::Int)))
        }
        UnaryOp::PreIncrement
        | UnaryOp::PreDecrement
        | UnaryOp::PostIncrement
        | UnaryOp::PostDecrement => {
            numeric(decls, operand.strip_nullable()).map(|_| operand.clone())
        }
    }
}

/// Type of `c ? a : b`
pub fn conditional_result(decls: &Declarations, a: &Ty, b: &Ty) -> Option<Ty> {
    if a.is_error() || b.is_error() {
        return Some(Ty::Error);
    }
    if a == b {
        return Some(a.clone());
    }
    match (a, b) {
        (Ty::Null, other) | (other, Ty::Null) => {
            if decls.is_value_type(other) && !matches!(other, Ty::Nullable(_)) {
                Some(Ty::Nullable(Box::new(other.clone())))
            } else {
                Some(other.clone())
            }
        }
        _ if is_convertible(decls, b, a) => Some(a.clone()),
        _ if is_convertible(decls, a, b) => Some(b.clone()),
        _ => None,
    }
}
