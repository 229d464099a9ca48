//! Abstract Syntax Tree node types
//!
//! Every node carries the byte span it was parsed from. Expressions,
//! statements and declarations also carry a [`NodeId`] (unique within one
//! tree) that the semantic model keys its side tables on.

use super::token::TextSpan;

pub type NodeId = u32;

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: TextSpan,
}

impl Ident {
    /// Placeholder for an identifier the parser expected but did not find
    pub fn missing(at: usize) -> Self {
        Self {
            name: String::new(),
            span: TextSpan::empty(at),
        }
    }

    pub fn is_missing(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedName {
    pub parts: Vec<Ident>,
    pub span: TextSpan,
}

impl QualifiedName {
    pub fn dotted(&self) -> String {
        self.parts
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn last(&self) -> Option<&Ident> {
        self.parts.last()
    }
}

/// Built-in type keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredefinedType {
    Void,
    Int,
    Long,
    Float,
    Double,
    Decimal,
    Bool,
    String,
    Char,
    Object,
}

impl PredefinedType {
    pub fn keyword(self) -> &'static str {
        match self {
            PredefinedType::Void => "void",
            PredefinedType::Int => "int",
            PredefinedType::Long => "long",
            PredefinedType::Float => "float",
            PredefinedType::Double => "double",
            PredefinedType::Decimal => "decimal",
            PredefinedType::Bool => "bool",
            PredefinedType::String => "string",
            PredefinedType::Char => "char",
            PredefinedType::Object => "object",
        }
    }

    /// Name of the backing type in the `System` namespace
    pub fn metadata_name(self) -> &'static str {
        match self {
            PredefinedType::Void => "Void",
            PredefinedType::Int => "Int32",
            PredefinedType::Long => "Int64",
            PredefinedType::Float => "Single",
            PredefinedType::Double => "Double",
            PredefinedType::Decimal => "Decimal",
            PredefinedType::Bool => "Boolean",
            PredefinedType::String => "String",
            PredefinedType::Char => "Char",
            PredefinedType::Object => "Object",
        }
    }

    pub const ALL: &'static [PredefinedType] = &[
        PredefinedType::Int,
        PredefinedType::Long,
        PredefinedType::Float,
        PredefinedType::Double,
        PredefinedType::Decimal,
        PredefinedType::Bool,
        PredefinedType::String,
        PredefinedType::Char,
        PredefinedType::Object,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accessibility {
    Public,
    Private,
    Protected,
    Internal,
}

impl Accessibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Accessibility::Public => "public",
            Accessibility::Private => "private",
            Accessibility::Protected => "protected",
            Accessibility::Internal => "internal",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modifiers {
    pub accessibility: Option<Accessibility>,
    pub is_static: bool,
    pub is_readonly: bool,
    pub is_const: bool,
    pub span: Option<TextSpan>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    pub kind: TypeRefKind,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeRefKind {
    /// `var` (locals only)
    Var,
    Predefined(PredefinedType),
    Named(QualifiedName),
    Array(Box<TypeRef>),
    Nullable(Box<TypeRef>),
    Missing,
}

impl TypeRef {
    pub fn missing(at: usize) -> Self {
        Self {
            kind: TypeRefKind::Missing,
            span: TextSpan::empty(at),
        }
    }
}

/* ===================== Declarations ===================== */

#[derive(Debug, Clone, PartialEq)]
pub struct CompilationUnit {
    pub usings: Vec<UsingDirective>,
    pub items: Vec<Item>,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsingDirective {
    pub name: QualifiedName,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Namespace(NamespaceDecl),
    Type(TypeDecl),
    /// Script-level statement
    Statement(Stmt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceDecl {
    pub name: QualifiedName,
    pub types: Vec<TypeDecl>,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDecl {
    Class(ClassDecl),
    Enum(EnumDecl),
}

impl TypeDecl {
    pub fn name(&self) -> &Ident {
        match self {
            TypeDecl::Class(c) => &c.name,
            TypeDecl::Enum(e) => &e.name,
        }
    }

    pub fn span(&self) -> TextSpan {
        match self {
            TypeDecl::Class(c) => c.span,
            TypeDecl::Enum(e) => e.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub id: NodeId,
    pub name: QualifiedName,
    pub args: Option<ArgList>,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub id: NodeId,
    pub attributes: Vec<Attribute>,
    pub modifiers: Modifiers,
    /// Declared with `struct` (a value type)
    pub is_struct: bool,
    pub name: Ident,
    pub members: Vec<MemberDecl>,
    pub doc: Option<String>,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub id: NodeId,
    pub attributes: Vec<Attribute>,
    pub modifiers: Modifiers,
    pub name: Ident,
    pub variants: Vec<EnumVariant>,
    pub doc: Option<String>,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariant {
    pub id: NodeId,
    pub name: Ident,
    pub value: Option<Expr>,
    pub doc: Option<String>,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberDecl {
    Field(FieldDecl),
    Property(PropertyDecl),
    Method(MethodDecl),
    Constructor(ConstructorDecl),
}

impl MemberDecl {
    pub fn span(&self) -> TextSpan {
        match self {
            MemberDecl::Field(f) => f.span,
            MemberDecl::Property(p) => p.span,
            MemberDecl::Method(m) => m.span,
            MemberDecl::Constructor(c) => c.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub attributes: Vec<Attribute>,
    pub modifiers: Modifiers,
    pub ty: TypeRef,
    pub declarators: Vec<VariableDeclarator>,
    pub doc: Option<String>,
    pub span: TextSpan,
}

/// `name = init` inside a field or local declaration
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclarator {
    pub id: NodeId,
    pub name: Ident,
    pub init: Option<Expr>,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub id: NodeId,
    pub attributes: Vec<Attribute>,
    pub modifiers: Modifiers,
    pub ty: TypeRef,
    pub name: Ident,
    pub has_get: bool,
    pub has_set: bool,
    pub init: Option<Expr>,
    pub doc: Option<String>,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub id: NodeId,
    pub attributes: Vec<Attribute>,
    pub modifiers: Modifiers,
    pub return_ty: TypeRef,
    pub name: Ident,
    pub params: ParamList,
    pub body: Option<Body>,
    pub doc: Option<String>,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorDecl {
    pub id: NodeId,
    pub attributes: Vec<Attribute>,
    pub modifiers: Modifiers,
    pub name: Ident,
    pub params: ParamList,
    pub body: Option<Body>,
    pub doc: Option<String>,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Block(Block),
    /// `=> expr;`
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamList {
    pub params: Vec<Parameter>,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub id: NodeId,
    pub ty: TypeRef,
    pub name: Ident,
    pub default: Option<Expr>,
    pub span: TextSpan,
}

/* ===================== Statements ===================== */

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Block(Block),
    Local(LocalDecl),
    LocalFunction(MethodDecl),
    Expr {
        expr: Expr,
        /// false only for a trailing script result expression
        has_semicolon: bool,
    },
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalDecl {
    pub is_const: bool,
    pub ty: TypeRef,
    pub declarators: Vec<VariableDeclarator>,
}

/* ===================== Expressions ===================== */

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Name(Ident),
    /// `int` in `int.Parse(...)`
    PredefinedType(PredefinedType),
    Member {
        target: Box<Expr>,
        dot: TextSpan,
        name: Ident,
    },
    Invoke {
        callee: Box<Expr>,
        args: ArgList,
    },
    Index {
        target: Box<Expr>,
        args: ArgList,
    },
    New {
        ty: TypeRef,
        args: Option<ArgList>,
    },
    TypeOf(TypeRef),
    This,
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        when_true: Box<Expr>,
        when_false: Box<Expr>,
    },
    Paren(Box<Expr>),
    /// Placeholder for an expression the parser expected but did not find
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Long(i64),
    Float(f64),
    Double(f64),
    Decimal(f64),
    Bool(bool),
    String(String),
    Char(Option<char>),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
            UnaryOp::PreIncrement | UnaryOp::PostIncrement => "++",
            UnaryOp::PreDecrement | UnaryOp::PostDecrement => "--",
        }
    }

    pub fn mutates(self) -> bool {
        matches!(
            self,
            UnaryOp::PreIncrement
                | UnaryOp::PreDecrement
                | UnaryOp::PostIncrement
                | UnaryOp::PostDecrement
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    Coalesce,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::Coalesce => "??",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    /// The arithmetic operator a compound assignment applies
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
        }
    }
}

/// Parenthesised (or bracketed) argument list
#[derive(Debug, Clone, PartialEq)]
pub struct ArgList {
    pub open: TextSpan,
    pub args: Vec<Expr>,
    /// Spans of the `,` tokens between arguments
    pub separators: Vec<TextSpan>,
    pub close: Option<TextSpan>,
    pub span: TextSpan,
}

impl ArgList {
    /// Whether a cursor at `offset` sits between the delimiters. An
    /// unclosed list extends to the end of what was parsed.
    pub fn contains_position(&self, offset: usize) -> bool {
        if offset <= self.open.start {
            return false;
        }
        match self.close {
            Some(close) => offset <= close.start,
            None => offset <= self.span.end,
        }
    }
}
