//! Semantic entities: types, members, locals and the symbols names bind to

use crate::syntax::{Accessibility, NodeId, TextSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(pub u32);

/// Index into a document model's locals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u32);

/// Index into a document model's local functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

/// The type of an expression or declaration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Named(TypeId),
    Array(Box<Ty>),
    Nullable(Box<Ty>),
    /// Type of the `null` literal
    Null,
    Void,
    /// Unknown; already reported or not worth reporting
    Error,
}

impl Ty {
    pub fn is_error(&self) -> bool {
        matches!(self, Ty::Error)
    }

    /// `Error` or `Null`: any conversion involving it is plausible
    pub fn is_unknown(&self) -> bool {
        matches!(self, Ty::Error | Ty::Null)
    }

    pub fn as_named(&self) -> Option<TypeId> {
        match self {
            Ty::Named(id) => Some(*id),
            _ => None,
        }
    }

    /// `T` for `T?`, the type itself otherwise
    pub fn strip_nullable(&self) -> &Ty {
        match self {
            Ty::Nullable(inner) => inner,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Struct,
    Enum,
}

/// Where a declaration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Assembly(String),
    /// Index into the compilation's document list, plus the name span
    Document { index: usize, span: TextSpan },
}

impl Origin {
    pub fn is_assembly(&self) -> bool {
        matches!(self, Origin::Assembly(_))
    }

    pub fn document(&self) -> Option<usize> {
        match self {
            Origin::Document { index, .. } => Some(*index),
            Origin::Assembly(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub id: TypeId,
    pub name: String,
    /// Dotted namespace; empty for the global namespace
    pub namespace: String,
    pub kind: TypeKind,
    pub accessibility: Accessibility,
    pub is_static: bool,
    pub members: Vec<MemberId>,
    pub doc: Option<String>,
    pub origin: Origin,
}

impl TypeDef {
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeKind::Struct | TypeKind::Enum)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Property,
    Method,
    Constructor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub name: String,
    pub ty: Ty,
    pub has_default: bool,
}

#[derive(Debug, Clone)]
pub struct MemberDef {
    pub id: MemberId,
    pub owner: TypeId,
    pub name: String,
    pub kind: MemberKind,
    /// Field/property type, method return type; `Void` for constructors
    pub ty: Ty,
    pub params: Vec<ParamDef>,
    pub accessibility: Accessibility,
    pub is_static: bool,
    pub is_readonly: bool,
    pub is_const: bool,
    pub has_setter: bool,
    pub doc: Option<String>,
    pub origin: Origin,
}

impl MemberDef {
    pub fn is_invocable(&self) -> bool {
        matches!(self.kind, MemberKind::Method)
    }

    /// Arguments this member accepts: `(required, max)`
    pub fn arity(&self) -> (usize, usize) {
        arity(&self.params)
    }
}

pub fn arity(params: &[ParamDef]) -> (usize, usize) {
    let required = params.iter().filter(|p| !p.has_default).count();
    (required, params.len())
}

/// A local variable or parameter
#[derive(Debug, Clone)]
pub struct LocalDef {
    pub id: LocalId,
    pub name: String,
    pub ty: Ty,
    pub is_const: bool,
    pub is_param: bool,
    /// Declared directly in the script body (behaves like a script field)
    pub is_script_level: bool,
    /// Span of the name
    pub span: TextSpan,
    /// Usable from this offset on (end of its declarator)
    pub visible_from: usize,
    pub decl: NodeId,
}

/// A function declared inside a script or method body
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub id: FunctionId,
    pub name: String,
    pub return_ty: Ty,
    pub params: Vec<ParamDef>,
    pub is_static: bool,
    pub doc: Option<String>,
    pub span: TextSpan,
    pub decl: NodeId,
}

/// What a name, member access or declaration binds to
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Namespace(String),
    Type(TypeId),
    Member(MemberId),
    Local(LocalId),
    Function(FunctionId),
    /// A host-provided instance named after its type
    Global(TypeId),
}

/// Closed classification of symbols, used for completion icons and hover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Namespace,
    NamedType,
    Field,
    Property,
    Method,
    Local,
    Parameter,
    Keyword,
}
