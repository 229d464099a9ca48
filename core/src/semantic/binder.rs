//! Binding of document bodies
//!
//! The binder walks every script statement, member body and initializer of
//! one document, resolves names against the lexical frames, the enclosing
//! type, host globals and imports, types every expression and records the
//! results in a [`DocumentModel`]. Errors never stop binding; an
//! unresolvable expression gets the `Error` type, which is compatible with
//! everything so that one mistake is reported once.

use tokio_util::sync::CancellationToken;

use super::conversions::{self, is_convertible};
use super::declare::Declarations;
use super::display;
use super::flow;
use super::model::{DocumentFacts, DocumentModel, ScopeRecord, SemanticDiagnostic};
use super::scope::{resolve_type_ref, Frame, FrameKind, ImportSet};
use super::types::*;
use crate::error::{Result, WorkspaceError};
use crate::syntax::{
    ArgList, AssignOp, Attribute, BinaryOp, Body, ClassDecl, Expr, ExprKind, Ident, Item,
    Literal, LocalDecl, MemberDecl, MethodDecl, ParamList, PredefinedType, QualifiedName, Stmt,
    StmtKind, SyntaxTree, TextSpan, TypeDecl, TypeRef, TypeRefKind, UnaryOp,
};

/// What an expression denotes before it is used as a value
#[derive(Debug, Clone)]
enum Resolved {
    Value { ty: Ty, assignable: bool },
    Type(TypeId),
    Namespace(String),
    Global(TypeId),
    Methods {
        name: String,
        candidates: Vec<Callable>,
        receiver: Receiver,
    },
    Error,
}

impl Resolved {
    fn rvalue(ty: Ty) -> Self {
        Resolved::Value {
            ty,
            assignable: false,
        }
    }
}

/// How a member was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Receiver {
    /// Simple name inside a type body
    Implicit,
    Type,
    Instance,
    /// Host global: both static and instance members
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Callable {
    Member(MemberId),
    Function(FunctionId),
}

impl Callable {
    fn symbol(self) -> Symbol {
        match self {
            Callable::Member(id) => Symbol::Member(id),
            Callable::Function(id) => Symbol::Function(id),
        }
    }
}

enum Overload<'n> {
    Method(&'n str),
    Constructor(TypeId),
}

enum FrameHit {
    Local(LocalId),
    Function(FunctionId),
    Pending,
}

pub struct Binder<'a> {
    decls: &'a Declarations,
    document: usize,
    tree: &'a SyntaxTree,
    global_imports: &'a [String],
    cancel: &'a CancellationToken,
    imports: ImportSet,
    facts: DocumentFacts,
    model: DocumentModel,
    frames: Vec<Frame>,
    enclosing_type: Option<TypeId>,
    is_static: bool,
    in_constructor: bool,
}

impl<'a> Binder<'a> {
    pub fn new(
        decls: &'a Declarations,
        document: usize,
        tree: &'a SyntaxTree,
        global_imports: &'a [String],
        facts: DocumentFacts,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            decls,
            document,
            tree,
            global_imports,
            cancel,
            imports: ImportSet::default(),
            facts,
            model: DocumentModel::default(),
            frames: Vec::new(),
            enclosing_type: None,
            is_static: false,
            in_constructor: false,
        }
    }

    /// Bind every statement and declaration body. Cancellation is checked
    /// between top-level statements and between members.
    pub fn bind(mut self) -> Result<DocumentModel> {
        let tree = self.tree;
        let unit = &tree.root;
        self.imports = ImportSet::for_document("", unit, self.global_imports);
        self.model.imports = self.imports.clone();
        self.check_usings();

        let script: Vec<&Stmt> = unit
            .items
            .iter()
            .filter_map(|item| match item {
                Item::Statement(stmt) => Some(stmt),
                _ => None,
            })
            .collect();
        self.push_frame(FrameKind::Script, unit.span);
        self.predeclare(script.iter().copied());
        for stmt in &script {
            if self.cancel.is_cancelled() {
                return Err(WorkspaceError::Cancelled);
            }
            self.bind_stmt(stmt);
        }
        self.pop_frame();

        for item in &unit.items {
            if self.cancel.is_cancelled() {
                return Err(WorkspaceError::Cancelled);
            }
            match item {
                Item::Type(decl) => self.bind_type(decl),
                Item::Namespace(ns) => {
                    let inner = self.imports.within(&ns.name.dotted());
                    let outer = std::mem::replace(&mut self.imports, inner);
                    self.push_record(ns.span);
                    for decl in &ns.types {
                        self.bind_type(decl);
                    }
                    self.imports = outer;
                }
                Item::Statement(_) => {}
            }
        }
        if self.cancel.is_cancelled() {
            return Err(WorkspaceError::Cancelled);
        }

        let mut model = self.model;
        model.diagnostics = self.facts.diagnostics;
        model.used_usings = self.facts.used_usings;
        Ok(model)
    }

    // ========================================================================
    // Bookkeeping
    // ========================================================================

    fn error(&mut self, code: &'static str, message: impl Into<String>, span: TextSpan) {
        self.facts
            .diagnostics
            .push(SemanticDiagnostic::error(code, message, span));
    }

    fn show(&self, ty: &Ty) -> String {
        display::ty(self.decls, ty)
    }

    fn show_type(&self, id: TypeId) -> String {
        display::type_name(self.decls, id)
    }

    fn push_record(&mut self, span: TextSpan) -> usize {
        self.model.scopes.push(ScopeRecord {
            span,
            locals: Vec::new(),
            functions: Vec::new(),
            enclosing_type: self.enclosing_type,
            is_static: self.is_static,
            namespace: self.imports.namespace.clone(),
        });
        self.model.scopes.len() - 1
    }

    fn push_frame(&mut self, kind: FrameKind, span: TextSpan) {
        let record = self.push_record(span);
        self.frames.push(Frame::new(kind, record));
    }

    fn pop_frame(&mut self) {
        self.frames.pop();
    }

    fn resolve_type(&mut self, ty: &TypeRef) -> Ty {
        resolve_type_ref(ty, self.decls, &self.imports, &mut self.facts)
    }

    /// Unknown namespaces in `using` directives; they count as used so they
    /// are not also reported as unnecessary
    fn check_usings(&mut self) {
        let tree = self.tree;
        for (index, using) in tree.root.usings.iter().enumerate() {
            if using.name.parts.iter().any(Ident::is_missing) {
                self.facts.used_usings.insert(index);
                continue;
            }
            if self.decls.namespace_exists(&using.name.dotted()) {
                continue;
            }
            self.facts.used_usings.insert(index);

            let mut known = String::new();
            for part in &using.name.parts {
                let candidate = if known.is_empty() {
                    part.name.clone()
                } else {
                    format!("{}.{}", known, part.name)
                };
                if !self.decls.namespace_exists(&candidate) {
                    if known.is_empty() {
                        self.error(
                            "WS0246",
                            format!(
                                "The type or namespace name '{}' could not be found (are you missing a using directive or an assembly reference?)",
                                part.name
                            ),
                            using.name.span,
                        );
                    } else {
                        self.error(
                            "WS0234",
                            format!(
                                "The type or namespace name '{}' does not exist in the namespace '{}' (are you missing an assembly reference?)",
                                part.name, known
                            ),
                            using.name.span,
                        );
                    }
                    break;
                }
                known = candidate;
            }
        }
    }

    // ========================================================================
    // Locals and local functions
    // ========================================================================

    /// Register the names a statement list declares before binding it, so
    /// that uses ahead of a declaration are caught and local functions can
    /// be called before they appear
    fn predeclare<'s>(&mut self, stmts: impl IntoIterator<Item = &'s Stmt>) {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Local(decl) => {
                    if let Some(frame) = self.frames.last_mut() {
                        frame.pending.extend(
                            decl.declarators
                                .iter()
                                .filter(|d| !d.name.is_missing())
                                .map(|d| d.name.name.clone()),
                        );
                    }
                }
                StmtKind::LocalFunction(method) => self.declare_function(method),
                _ => {}
            }
        }
    }

    /// Whether `name` is already declared in the innermost function (or
    /// script) body
    fn is_name_taken(&self, name: &str) -> bool {
        for frame in self.frames.iter().rev() {
            if frame.locals.contains_key(name) || frame.functions.contains_key(name) {
                return true;
            }
            if matches!(frame.kind, FrameKind::Function { .. } | FrameKind::Script) {
                break;
            }
        }
        false
    }

    fn report_duplicate(&mut self, name: &Ident) {
        self.error(
            "WS0128",
            format!(
                "A local variable or function named '{}' is already defined in this scope",
                name.name
            ),
            name.span,
        );
    }

    fn declare_local(
        &mut self,
        name: &Ident,
        ty: Ty,
        is_const: bool,
        is_param: bool,
        decl: crate::syntax::NodeId,
        visible_from: usize,
    ) {
        if name.is_missing() {
            return;
        }
        if self.is_name_taken(&name.name) {
            self.report_duplicate(name);
        }

        let is_script_level = !is_param
            && matches!(self.frames.last().map(|f| &f.kind), Some(FrameKind::Script));
        let id = LocalId(self.model.locals.len() as u32);
        self.model.locals.push(LocalDef {
            id,
            name: name.name.clone(),
            ty,
            is_const,
            is_param,
            is_script_level,
            span: name.span,
            visible_from,
            decl,
        });
        self.model.declared.insert(decl, Symbol::Local(id));

        if let Some(frame) = self.frames.last_mut() {
            if let Some(pos) = frame.pending.iter().position(|p| p == &name.name) {
                frame.pending.remove(pos);
            }
            frame.locals.insert(name.name.clone(), id);
            let record = frame.record;
            self.model.scopes[record].locals.push(id);
        }
    }

    fn declare_function(&mut self, method: &MethodDecl) {
        if method.name.is_missing() {
            return;
        }
        if self.is_name_taken(&method.name.name) {
            self.report_duplicate(&method.name);
        }

        let return_ty = self.resolve_type(&method.return_ty);
        let mut params = Vec::with_capacity(method.params.params.len());
        for param in &method.params.params {
            let ty = self.resolve_type(&param.ty);
            params.push(ParamDef {
                name: param.name.name.clone(),
                ty,
                has_default: param.default.is_some(),
            });
        }

        let id = FunctionId(self.model.functions.len() as u32);
        self.model.functions.push(FunctionDef {
            id,
            name: method.name.name.clone(),
            return_ty,
            params,
            is_static: method.modifiers.is_static || self.is_static,
            doc: method.doc.clone(),
            span: method.name.span,
            decl: method.id,
        });
        self.model.declared.insert(method.id, Symbol::Function(id));

        if let Some(frame) = self.frames.last_mut() {
            frame.functions.insert(method.name.name.clone(), id);
            let record = frame.record;
            self.model.scopes[record].functions.push(id);
        }
    }

    // ========================================================================
    // Types and members
    // ========================================================================

    fn bind_type(&mut self, decl: &TypeDecl) {
        let node = match decl {
            TypeDecl::Class(class) => class.id,
            TypeDecl::Enum(decl) => decl.id,
        };
        let Some(type_id) = self.decls.declared_type(self.document, node) else {
            return;
        };
        self.model.declared.insert(node, Symbol::Type(type_id));

        let saved = (self.enclosing_type, self.is_static);
        self.enclosing_type = Some(type_id);
        match decl {
            TypeDecl::Class(class) => {
                self.is_static = class.modifiers.is_static;
                self.push_record(class.span);
                self.bind_attributes(&class.attributes);
                for member in &class.members {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    self.bind_member(class, member);
                }
            }
            TypeDecl::Enum(decl) => {
                self.is_static = true;
                self.push_record(decl.span);
                self.bind_attributes(&decl.attributes);
                for variant in &decl.variants {
                    if let Some(member) = self.decls.declared_member(self.document, variant.id) {
                        self.model.declared.insert(variant.id, Symbol::Member(member));
                    }
                    if let Some(value) = &variant.value {
                        self.bind_value(value);
                    }
                }
            }
        }
        (self.enclosing_type, self.is_static) = saved;
    }

    fn declared_member(&mut self, node: crate::syntax::NodeId) -> Option<MemberId> {
        let id = self.decls.declared_member(self.document, node)?;
        self.model.declared.insert(node, Symbol::Member(id));
        Some(id)
    }

    fn bind_member(&mut self, class: &ClassDecl, member: &MemberDecl) {
        let class_static = class.modifiers.is_static;
        match member {
            MemberDecl::Field(field) => {
                self.bind_attributes(&field.attributes);
                let saved = self.is_static;
                self.is_static =
                    class_static || field.modifiers.is_static || field.modifiers.is_const;
                for declarator in &field.declarators {
                    let target = self
                        .declared_member(declarator.id)
                        .map(|id| self.decls.member(id).ty.clone());
                    match &declarator.init {
                        Some(init) => {
                            let ty = self.bind_value(init);
                            if let Some(target) = target {
                                self.check_conversion(&ty, &target, init.span);
                            }
                        }
                        None if field.modifiers.is_const => self.error(
                            "WS0145",
                            "A const field requires a value to be provided",
                            declarator.name.span,
                        ),
                        None => {}
                    }
                }
                self.is_static = saved;
            }
            MemberDecl::Property(property) => {
                self.bind_attributes(&property.attributes);
                let target = self
                    .declared_member(property.id)
                    .map(|id| self.decls.member(id).ty.clone());
                if let Some(init) = &property.init {
                    let saved = self.is_static;
                    self.is_static = class_static || property.modifiers.is_static;
                    let ty = self.bind_value(init);
                    if let Some(target) = target {
                        self.check_conversion(&ty, &target, init.span);
                    }
                    self.is_static = saved;
                }
            }
            MemberDecl::Method(method) => {
                self.bind_attributes(&method.attributes);
                let (return_ty, params) = match self.declared_member(method.id) {
                    Some(id) => {
                        let def = self.decls.member(id);
                        (def.ty.clone(), def.params.clone())
                    }
                    None => (Ty::Error, self.param_defs(&method.params)),
                };
                self.bind_function_body(
                    &method.name,
                    return_ty,
                    &params,
                    &method.params,
                    method.body.as_ref(),
                    method.span,
                    class_static || method.modifiers.is_static,
                    false,
                );
            }
            MemberDecl::Constructor(ctor) => {
                self.bind_attributes(&ctor.attributes);
                let params = match self.declared_member(ctor.id) {
                    Some(id) => self.decls.member(id).params.clone(),
                    None => self.param_defs(&ctor.params),
                };
                self.bind_function_body(
                    &ctor.name,
                    Ty::Void,
                    &params,
                    &ctor.params,
                    ctor.body.as_ref(),
                    ctor.span,
                    ctor.modifiers.is_static,
                    true,
                );
            }
        }
    }

    fn param_defs(&mut self, list: &ParamList) -> Vec<ParamDef> {
        let mut params = Vec::with_capacity(list.params.len());
        for param in &list.params {
            let ty = self.resolve_type(&param.ty);
            params.push(ParamDef {
                name: param.name.name.clone(),
                ty,
                has_default: param.default.is_some(),
            });
        }
        params
    }

    #[allow(clippy::too_many_arguments)]
    fn bind_function_body(
        &mut self,
        name: &Ident,
        return_ty: Ty,
        params: &[ParamDef],
        syntax: &ParamList,
        body: Option<&Body>,
        span: TextSpan,
        is_static: bool,
        in_constructor: bool,
    ) {
        let saved = (self.is_static, self.in_constructor);
        self.is_static = is_static;
        self.in_constructor = in_constructor;
        self.push_frame(
            FrameKind::Function {
                name: name.name.clone(),
                return_ty: return_ty.clone(),
            },
            span,
        );

        for (param, def) in syntax.params.iter().zip(params) {
            if let Some(default) = &param.default {
                let ty = self.bind_value(default);
                self.check_conversion(&ty, &def.ty, default.span);
            }
            self.declare_local(&param.name, def.ty.clone(), false, true, param.id, param.span.end);
        }

        match body {
            Some(Body::Block(block)) => {
                self.bind_stmts(&block.stmts);
                let needs_value = !matches!(return_ty, Ty::Void | Ty::Error);
                if needs_value && !name.is_missing() && flow::block_completes(&block.stmts) {
                    self.error(
                        "WS0161",
                        format!("'{}': not all code paths return a value", name.name),
                        name.span,
                    );
                }
            }
            Some(Body::Expr(expr)) => {
                let ty = self.bind_value(expr);
                if return_ty != Ty::Void {
                    self.check_conversion(&ty, &return_ty, expr.span);
                }
            }
            None => {}
        }

        self.pop_frame();
        (self.is_static, self.in_constructor) = saved;
    }

    fn bind_attributes(&mut self, attributes: &[Attribute]) {
        for attribute in attributes {
            let arg_types = match &attribute.args {
                Some(args) => self.bind_args(args),
                None => Vec::new(),
            };
            let Some(type_id) = self.resolve_attribute_type(&attribute.name) else {
                if !attribute.name.parts.iter().any(Ident::is_missing) {
                    self.error(
                        "WS0246",
                        format!(
                            "The type or namespace name '{}' could not be found (are you missing a using directive or an assembly reference?)",
                            attribute.name.dotted()
                        ),
                        attribute.name.span,
                    );
                }
                continue;
            };
            self.model.symbols.insert(attribute.id, Symbol::Type(type_id));

            let ctors = self.decls.constructors(type_id);
            if ctors.is_empty() {
                if !arg_types.is_empty() {
                    self.report_constructor_arity(type_id, arg_types.len(), attribute.name.span);
                }
                continue;
            }
            if let Some(args) = &attribute.args {
                let candidates: Vec<Callable> = ctors.into_iter().map(Callable::Member).collect();
                self.resolve_overload(
                    Overload::Constructor(type_id),
                    &candidates,
                    args,
                    &arg_types,
                    attribute.name.span,
                );
            }
        }
    }

    /// `[Description]` finds `DescriptionAttribute` first, then `Description`
    fn resolve_attribute_type(&mut self, name: &QualifiedName) -> Option<TypeId> {
        if name.parts.iter().any(Ident::is_missing) {
            return None;
        }
        let last = &name.last()?.name;
        let candidates = [format!("{}Attribute", last), last.clone()];
        if name.parts.len() == 1 {
            for candidate in &candidates {
                if let Some((id, using)) = self.imports.lookup_type(self.decls, candidate) {
                    if let Some(using) = using {
                        self.facts.used_usings.insert(using);
                    }
                    return Some(id);
                }
            }
            return None;
        }
        let prefix: Vec<&str> = name.parts[..name.parts.len() - 1]
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        let namespace = self.imports.lookup_namespace(self.decls, &prefix.join("."))?;
        candidates
            .iter()
            .find_map(|candidate| self.decls.find_type(&namespace, candidate))
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn bind_stmts(&mut self, stmts: &[Stmt]) {
        self.predeclare(stmts);
        for stmt in stmts {
            self.bind_stmt(stmt);
        }
    }

    /// The body of an `if`/`else` gets its own scope even without braces
    fn bind_embedded(&mut self, stmt: &Stmt, kind: FrameKind) {
        self.push_frame(kind, stmt.span);
        self.bind_stmts(std::slice::from_ref(stmt));
        self.pop_frame();
    }

    fn bind_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Block(block) => {
                self.push_frame(FrameKind::Block, block.span);
                self.bind_stmts(&block.stmts);
                self.pop_frame();
            }
            StmtKind::Local(decl) => self.bind_local(decl),
            StmtKind::LocalFunction(method) => self.bind_local_function(method),
            StmtKind::Expr {
                expr,
                has_semicolon,
            } => {
                let ty = self.bind_value(expr);
                if *has_semicolon && !ty.is_error() && !is_statement_expression(expr) {
                    self.error(
                        "WS0201",
                        "Only assignment, call, increment, decrement, and new object expressions can be used as a statement",
                        expr.span,
                    );
                }
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.bind_condition(cond);
                self.bind_embedded(then_branch, FrameKind::Block);
                if let Some(else_branch) = else_branch {
                    self.bind_embedded(else_branch, FrameKind::Block);
                }
            }
            StmtKind::While { cond, body } => {
                self.bind_condition(cond);
                self.bind_embedded(body, FrameKind::Loop);
            }
            StmtKind::Return(value) => self.bind_return(value.as_ref(), stmt.span),
            StmtKind::Break | StmtKind::Continue => {
                if !self.in_loop() {
                    self.error(
                        "WS0139",
                        "No enclosing loop out of which to break or continue",
                        stmt.span,
                    );
                }
            }
            StmtKind::Empty => {}
        }
    }

    fn in_loop(&self) -> bool {
        for frame in self.frames.iter().rev() {
            match frame.kind {
                FrameKind::Loop => return true,
                FrameKind::Function { .. } | FrameKind::Script => return false,
                FrameKind::Block => {}
            }
        }
        false
    }

    fn bind_local(&mut self, decl: &LocalDecl) {
        let declared = match decl.ty.kind {
            TypeRefKind::Var => None,
            _ => Some(self.resolve_type(&decl.ty)),
        };

        for declarator in &decl.declarators {
            let ty = match (&declared, &declarator.init) {
                (None, None) => {
                    self.error(
                        "WS0818",
                        "Implicitly-typed variables must be initialized",
                        declarator.name.span,
                    );
                    Ty::Error
                }
                (None, Some(init)) => self.bind_inferred(init, declarator.span),
                (Some(target), Some(init)) => {
                    let ty = self.bind_value(init);
                    self.check_conversion(&ty, target, init.span);
                    target.clone()
                }
                (Some(target), None) => {
                    if decl.is_const {
                        self.error(
                            "WS0145",
                            "A const field requires a value to be provided",
                            declarator.name.span,
                        );
                    }
                    target.clone()
                }
            };
            self.declare_local(
                &declarator.name,
                ty,
                decl.is_const,
                false,
                declarator.id,
                declarator.span.end,
            );
        }
    }

    /// Type of a `var` initializer
    fn bind_inferred(&mut self, init: &Expr, span: TextSpan) -> Ty {
        let resolved = self.bind_expr(init);
        if let Resolved::Methods { .. } = resolved {
            self.error(
                "WS0815",
                "Cannot assign method group to an implicitly-typed variable",
                span,
            );
            return Ty::Error;
        }
        match self.value_of(resolved, init) {
            Ty::Null => {
                self.error(
                    "WS0815",
                    "Cannot assign <null> to an implicitly-typed variable",
                    span,
                );
                Ty::Error
            }
            Ty::Void => {
                self.error(
                    "WS0815",
                    "Cannot assign void to an implicitly-typed variable",
                    span,
                );
                Ty::Error
            }
            ty => ty,
        }
    }

    fn bind_local_function(&mut self, method: &MethodDecl) {
        let Some(Symbol::Function(id)) = self.model.declared.get(&method.id).cloned() else {
            return;
        };
        let function = self.model.function(id).clone();
        let in_constructor = self.in_constructor;
        self.bind_function_body(
            &method.name,
            function.return_ty,
            &function.params,
            &method.params,
            method.body.as_ref(),
            method.span,
            function.is_static,
            in_constructor && !function.is_static,
        );
    }

    fn bind_return(&mut self, value: Option<&Expr>, span: TextSpan) {
        let function = self.frames.iter().rev().find_map(|frame| match &frame.kind {
            FrameKind::Function { name, return_ty } => Some((name.clone(), return_ty.clone())),
            _ => None,
        });

        match (function, value) {
            (None, Some(value)) => {
                self.bind_value(value);
            }
            (None, None) => {}
            (Some((name, Ty::Void)), Some(value)) => {
                self.bind_value(value);
                self.error(
                    "WS0127",
                    format!(
                        "Since '{}' returns void, a return keyword must not be followed by an object expression",
                        name
                    ),
                    value.span,
                );
            }
            (Some((_, Ty::Void)), None) => {}
            (Some((_, return_ty)), None) => {
                if !return_ty.is_error() {
                    let shown = self.show(&return_ty);
                    self.error(
                        "WS0126",
                        format!("An object of a type convertible to '{}' is required", shown),
                        span,
                    );
                }
            }
            (Some((_, return_ty)), Some(value)) => {
                let ty = self.bind_value(value);
                self.check_conversion(&ty, &return_ty, value.span);
            }
        }
    }

    fn bind_condition(&mut self, cond: &Expr) {
        let ty = self.bind_value(cond);
        let bool_ty = self.decls.predefined(PredefinedType::Bool);
        self.check_conversion(&ty, &bool_ty, cond.span);
    }

    fn check_conversion(&mut self, from: &Ty, to: &Ty, span: TextSpan) {
        if is_convertible(self.decls, from, to) {
            return;
        }
        let target = self.show(to);
        if matches!(from, Ty::Null) {
            self.error(
                "WS0037",
                format!(
                    "Cannot convert null to '{}' because it is a non-nullable value type",
                    target
                ),
                span,
            );
        } else {
            let source = self.show(from);
            self.error(
                "WS0029",
                format!("Cannot implicitly convert type '{}' to '{}'", source, target),
                span,
            );
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Bind `expr` and use it as a value
    fn bind_value(&mut self, expr: &Expr) -> Ty {
        let resolved = self.bind_expr(expr);
        self.value_of(resolved, expr)
    }

    fn value_of(&mut self, resolved: Resolved, expr: &Expr) -> Ty {
        match resolved {
            Resolved::Value { ty, .. } => ty,
            Resolved::Global(id) => Ty::Named(id),
            Resolved::Type(id) => {
                let shown = self.show_type(id);
                self.error(
                    "WS0119",
                    format!("'{}' is a type, which is not valid in the given context", shown),
                    expr.span,
                );
                Ty::Error
            }
            Resolved::Namespace(namespace) => {
                self.error(
                    "WS0118",
                    format!("'{}' is a namespace but is used like a variable", namespace),
                    expr.span,
                );
                Ty::Error
            }
            Resolved::Methods { name, .. } => {
                self.error(
                    "WS0428",
                    format!(
                        "Cannot convert method group '{}' to non-delegate type. Did you intend to invoke the method?",
                        name
                    ),
                    expr.span,
                );
                Ty::Error
            }
            Resolved::Error => Ty::Error,
        }
    }

    fn bind_args(&mut self, args: &ArgList) -> Vec<Ty> {
        let mut types = Vec::with_capacity(args.args.len());
        for arg in &args.args {
            types.push(self.bind_value(arg));
        }
        types
    }

    fn bind_expr(&mut self, expr: &Expr) -> Resolved {
        let resolved = match &expr.kind {
            ExprKind::Literal(literal) => Resolved::rvalue(self.literal_type(literal)),
            ExprKind::Name(ident) => self.bind_name(expr.id, ident),
            ExprKind::PredefinedType(predefined) => match self.decls.predefined(*predefined) {
                Ty::Named(id) => {
                    self.model.symbols.insert(expr.id, Symbol::Type(id));
                    Resolved::Type(id)
                }
                _ => Resolved::Error,
            },
            ExprKind::Member { target, name, .. } => self.bind_member_access(expr.id, target, name),
            ExprKind::Invoke { callee, args } => self.bind_invoke(callee, args),
            ExprKind::Index { target, args } => self.bind_index(target, args),
            ExprKind::New { ty, args } => self.bind_new(expr, ty, args.as_ref()),
            ExprKind::TypeOf(ty) => {
                self.resolve_type(ty);
                Resolved::rvalue(self.decls.system_type("Type"))
            }
            ExprKind::This => self.bind_this(expr.span),
            ExprKind::Unary { op, operand } => self.bind_unary(*op, operand, expr.span),
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_ty = self.bind_value(lhs);
                let rhs_ty = self.bind_value(rhs);
                self.binary(*op, op.symbol(), &lhs_ty, &rhs_ty, expr.span)
            }
            ExprKind::Assign { op, target, value } => {
                self.bind_assign(*op, target, value, expr.span)
            }
            ExprKind::Conditional {
                cond,
                when_true,
                when_false,
            } => {
                self.bind_condition(cond);
                let a = self.bind_value(when_true);
                let b = self.bind_value(when_false);
                match conversions::conditional_result(self.decls, &a, &b) {
                    Some(ty) => Resolved::rvalue(ty),
                    None => {
                        let (a, b) = (self.show(&a), self.show(&b));
                        self.error(
                            "WS0173",
                            format!(
                                "Type of conditional expression cannot be determined because there is no implicit conversion between '{}' and '{}'",
                                a, b
                            ),
                            expr.span,
                        );
                        Resolved::Error
                    }
                }
            }
            ExprKind::Paren(inner) => Resolved::rvalue(self.bind_value(inner)),
            ExprKind::Missing => Resolved::Error,
        };

        match &resolved {
            Resolved::Value { ty, .. } => {
                self.model.expr_types.insert(expr.id, ty.clone());
            }
            Resolved::Type(id) | Resolved::Global(id) => {
                self.model.expr_types.insert(expr.id, Ty::Named(*id));
            }
            _ => {}
        }
        resolved
    }

    fn literal_type(&self, literal: &Literal) -> Ty {
        let predefined = match literal {
            Literal::Int(_) => PredefinedType::Int,
            Literal::Long(_) => PredefinedType::Long,
            Literal::Float(_) => PredefinedType::Float,
            Literal::Double(_) => PredefinedType::Double,
            Literal::Decimal(_) => PredefinedType::Decimal,
            Literal::Bool(_) => PredefinedType::Bool,
            Literal::String(_) => PredefinedType::String,
            Literal::Char(_) => PredefinedType::Char,
            Literal::Null => return Ty::Null,
        };
        self.decls.predefined(predefined)
    }

    fn bind_name(&mut self, node: crate::syntax::NodeId, ident: &Ident) -> Resolved {
        if ident.is_missing() {
            return Resolved::Error;
        }
        let name = ident.name.as_str();

        let hit = self.frames.iter().rev().find_map(|frame| {
            if let Some(id) = frame.locals.get(name) {
                Some(FrameHit::Local(*id))
            } else if let Some(id) = frame.functions.get(name) {
                Some(FrameHit::Function(*id))
            } else if frame.pending.iter().any(|p| p == name) {
                Some(FrameHit::Pending)
            } else {
                None
            }
        });
        match hit {
            Some(FrameHit::Local(id)) => {
                self.model.referenced_locals.insert(id);
                self.model.symbols.insert(node, Symbol::Local(id));
                let local = self.model.local(id);
                return Resolved::Value {
                    ty: local.ty.clone(),
                    assignable: !local.is_const,
                };
            }
            Some(FrameHit::Function(id)) => {
                self.model.symbols.insert(node, Symbol::Function(id));
                return Resolved::Methods {
                    name: name.to_string(),
                    candidates: vec![Callable::Function(id)],
                    receiver: Receiver::Implicit,
                };
            }
            Some(FrameHit::Pending) => {
                self.error(
                    "WS0841",
                    format!("Cannot use local variable '{}' before it is declared", name),
                    ident.span,
                );
                return Resolved::Error;
            }
            None => {}
        }

        if let Some(owner) = self.enclosing_type {
            let members = self.decls.members_named(owner, name);
            if !members.is_empty() {
                return self.member_group(node, owner, ident, members, Receiver::Implicit);
            }
        }

        if let Some(id) = self.decls.global_named(name) {
            self.model.symbols.insert(node, Symbol::Global(id));
            return Resolved::Global(id);
        }

        if let Some((id, using)) = self.imports.lookup_type(self.decls, name) {
            if let Some(using) = using {
                self.facts.used_usings.insert(using);
            }
            self.model.symbols.insert(node, Symbol::Type(id));
            return Resolved::Type(id);
        }

        if let Some(namespace) = self.imports.lookup_namespace(self.decls, name) {
            self.model
                .symbols
                .insert(node, Symbol::Namespace(namespace.clone()));
            return Resolved::Namespace(namespace);
        }

        self.error(
            "WS0103",
            format!("The name '{}' does not exist in the current context", name),
            ident.span,
        );
        Resolved::Error
    }

    fn bind_member_access(
        &mut self,
        node: crate::syntax::NodeId,
        target: &Expr,
        name: &Ident,
    ) -> Resolved {
        let receiver = self.bind_expr(target);
        if name.is_missing() {
            return Resolved::Error;
        }

        match receiver {
            Resolved::Namespace(namespace) => {
                if let Some(id) = self.decls.find_type(&namespace, &name.name) {
                    self.model.symbols.insert(node, Symbol::Type(id));
                    return Resolved::Type(id);
                }
                let child = format!("{}.{}", namespace, name.name);
                if self.decls.namespace_exists(&child) {
                    self.model
                        .symbols
                        .insert(node, Symbol::Namespace(child.clone()));
                    return Resolved::Namespace(child);
                }
                self.error(
                    "WS0234",
                    format!(
                        "The type or namespace name '{}' does not exist in the namespace '{}' (are you missing an assembly reference?)",
                        name.name, namespace
                    ),
                    name.span,
                );
                Resolved::Error
            }
            Resolved::Type(owner) => {
                let shown = self.show_type(owner);
                self.lookup_member(node, owner, &shown, name, Receiver::Type)
            }
            Resolved::Global(owner) => {
                let shown = self.show_type(owner);
                self.lookup_member(node, owner, &shown, name, Receiver::Global)
            }
            Resolved::Value { ty, .. } => match self.decls.member_host(&ty) {
                Some(owner) => {
                    let shown = self.show(&ty);
                    self.lookup_member(node, owner, &shown, name, Receiver::Instance)
                }
                None => {
                    if matches!(ty, Ty::Void | Ty::Null) {
                        let shown = if ty == Ty::Null { "<null>".to_string() } else { self.show(&ty) };
                        self.error(
                            "WS0023",
                            format!("Operator '.' cannot be applied to operand of type '{}'", shown),
                            target.span,
                        );
                    }
                    Resolved::Error
                }
            },
            Resolved::Methods { name: method, .. } => {
                self.error(
                    "WS0119",
                    format!("'{}' is a method, which is not valid in the given context", method),
                    target.span,
                );
                Resolved::Error
            }
            Resolved::Error => Resolved::Error,
        }
    }

    fn lookup_member(
        &mut self,
        node: crate::syntax::NodeId,
        owner: TypeId,
        shown: &str,
        name: &Ident,
        receiver: Receiver,
    ) -> Resolved {
        let members = self.decls.members_named(owner, &name.name);
        if members.is_empty() {
            self.error(
                "WS0117",
                format!("'{}' does not contain a definition for '{}'", shown, name.name),
                name.span,
            );
            return Resolved::Error;
        }
        self.member_group(node, owner, name, members, receiver)
    }

    /// Resolve a non-empty set of same-named members reached through
    /// `receiver`: a value for fields and properties, a method group
    /// otherwise
    fn member_group(
        &mut self,
        node: crate::syntax::NodeId,
        owner: TypeId,
        name: &Ident,
        members: Vec<MemberId>,
        receiver: Receiver,
    ) -> Resolved {
        let accessible: Vec<MemberId> = members
            .into_iter()
            .filter(|m| {
                self.decls
                    .is_accessible(self.decls.member(*m), self.enclosing_type)
            })
            .collect();
        let Some(first) = accessible.first().copied() else {
            let shown = self.show_type(owner);
            self.error(
                "WS0122",
                format!(
                    "'{}.{}' is inaccessible due to its protection level",
                    shown, name.name
                ),
                name.span,
            );
            return Resolved::Error;
        };

        self.model.symbols.insert(node, Symbol::Member(first));
        let decls = self.decls;
        let member = decls.member(first);
        if member.is_invocable() {
            let candidates = accessible
                .into_iter()
                .filter(|m| self.decls.member(*m).is_invocable())
                .map(Callable::Member)
                .collect();
            return Resolved::Methods {
                name: name.name.clone(),
                candidates,
                receiver,
            };
        }

        self.check_static_access(first, receiver, name.span);
        Resolved::Value {
            ty: member.ty.clone(),
            assignable: self.is_assignable(member),
        }
    }

    fn check_static_access(&mut self, id: MemberId, receiver: Receiver, span: TextSpan) {
        let decls = self.decls;
        let member = decls.member(id);
        let qualified = format!("{}.{}", self.show_type(member.owner), member.name);
        match receiver {
            Receiver::Type if !member.is_static => self.error(
                "WS0120",
                format!(
                    "An object reference is required for the non-static field, method, or property '{}'",
                    qualified
                ),
                span,
            ),
            Receiver::Implicit if !member.is_static && self.is_static => self.error(
                "WS0120",
                format!(
                    "An object reference is required for the non-static field, method, or property '{}'",
                    qualified
                ),
                span,
            ),
            Receiver::Instance if member.is_static => self.error(
                "WS0176",
                format!(
                    "Member '{}' cannot be accessed with an instance reference; qualify it with a type name instead",
                    qualified
                ),
                span,
            ),
            _ => {}
        }
    }

    fn is_assignable(&self, member: &MemberDef) -> bool {
        let own_constructor = self.in_constructor && self.enclosing_type == Some(member.owner);
        match member.kind {
            MemberKind::Field => !member.is_const && (!member.is_readonly || own_constructor),
            MemberKind::Property => member.has_setter || own_constructor,
            MemberKind::Method | MemberKind::Constructor => false,
        }
    }

    fn params_of(&self, callable: Callable) -> &[ParamDef] {
        match callable {
            Callable::Member(id) => &self.decls.member(id).params,
            Callable::Function(id) => &self.model.function(id).params,
        }
    }

    fn return_type(&self, callable: Callable) -> Ty {
        match callable {
            Callable::Member(id) => self.decls.member(id).ty.clone(),
            Callable::Function(id) => self.model.function(id).return_ty.clone(),
        }
    }

    fn is_static_callable(&self, callable: Callable) -> bool {
        match callable {
            Callable::Member(id) => self.decls.member(id).is_static,
            Callable::Function(_) => true,
        }
    }

    fn bind_invoke(&mut self, callee: &Expr, args: &ArgList) -> Resolved {
        let target = self.bind_expr(callee);
        let arg_types = self.bind_args(args);

        match target {
            Resolved::Methods {
                name,
                candidates,
                receiver,
            } => {
                let filtered: Vec<Callable> = candidates
                    .iter()
                    .copied()
                    .filter(|c| match receiver {
                        Receiver::Type => self.is_static_callable(*c),
                        Receiver::Instance => !self.is_static_callable(*c),
                        Receiver::Implicit | Receiver::Global => true,
                    })
                    .collect();
                let candidates = if filtered.is_empty() { candidates } else { filtered };

                let name_span = callee_name_span(callee);
                let Some(chosen) = self.resolve_overload(
                    Overload::Method(&name),
                    &candidates,
                    args,
                    &arg_types,
                    name_span,
                ) else {
                    return Resolved::Error;
                };
                self.model.symbols.insert(callee.id, chosen.symbol());
                if let Callable::Member(id) = chosen {
                    self.check_static_access(id, receiver, name_span);
                }
                Resolved::rvalue(self.return_type(chosen))
            }
            Resolved::Error => Resolved::Error,
            _ => {
                self.error("WS0149", "Method name expected", callee.span);
                Resolved::Error
            }
        }
    }

    /// Pick the overload applicable to `arg_types` with the most exact
    /// matches. Reports arity and argument errors; on an argument error the
    /// first overload of the right arity is still returned so the call's
    /// type flows on.
    fn resolve_overload(
        &mut self,
        overload: Overload<'_>,
        candidates: &[Callable],
        args: &ArgList,
        arg_types: &[Ty],
        span: TextSpan,
    ) -> Option<Callable> {
        let count = arg_types.len();
        let by_count: Vec<Callable> = candidates
            .iter()
            .copied()
            .filter(|c| {
                let (required, max) = arity(self.params_of(*c));
                count >= required && count <= max
            })
            .collect();

        if by_count.is_empty() {
            match overload {
                Overload::Method(name) => self.error(
                    "WS1501",
                    format!("No overload for method '{}' takes {} arguments", name, count),
                    span,
                ),
                Overload::Constructor(owner) => self.report_constructor_arity(owner, count, span),
            }
            return None;
        }

        let mut best: Option<(Callable, usize)> = None;
        for candidate in &by_count {
            let params = self.params_of(*candidate);
            let applicable = arg_types
                .iter()
                .zip(params)
                .all(|(arg, param)| is_convertible(self.decls, arg, &param.ty));
            if !applicable {
                continue;
            }
            let exact = arg_types
                .iter()
                .zip(params)
                .filter(|(arg, param)| **arg == param.ty)
                .count();
            if best.map_or(true, |(_, score)| exact > score) {
                best = Some((*candidate, exact));
            }
        }
        if let Some((chosen, _)) = best {
            return Some(chosen);
        }

        let fallback = by_count[0];
        let params = self.params_of(fallback).to_vec();
        let mismatch = arg_types
            .iter()
            .zip(&params)
            .enumerate()
            .find(|(_, (arg, param))| !is_convertible(self.decls, arg, &param.ty));
        if let Some((index, (arg, param))) = mismatch {
            let (from, to) = (self.show(arg), self.show(&param.ty));
            let at = args.args.get(index).map_or(span, |a| a.span);
            self.error(
                "WS1503",
                format!("Argument {}: cannot convert from '{}' to '{}'", index + 1, from, to),
                at,
            );
        }
        Some(fallback)
    }

    fn report_constructor_arity(&mut self, owner: TypeId, count: usize, span: TextSpan) {
        let shown = self.show_type(owner);
        self.error(
            "WS1729",
            format!(
                "'{}' does not contain a constructor that takes {} arguments",
                shown, count
            ),
            span,
        );
    }

    fn bind_index(&mut self, target: &Expr, args: &ArgList) -> Resolved {
        let ty = self.bind_value(target);
        let arg_types = self.bind_args(args);
        let int_ty = self.decls.predefined(PredefinedType::Int);

        let element = match &ty {
            Ty::Error => return Resolved::Error,
            Ty::Array(element) => Some(((**element).clone(), true)),
            other if conversions::is_string(self.decls, other) => {
                Some((self.decls.predefined(PredefinedType::Char), false))
            }
            _ => None,
        };
        let Some((element, assignable)) = element else {
            let shown = self.show(&ty);
            self.error(
                "WS0021",
                format!("Cannot apply indexing with [] to an expression of type '{}'", shown),
                target.span,
            );
            return Resolved::Error;
        };

        if arg_types.len() != 1 {
            self.error(
                "WS0022",
                "Wrong number of indices inside []; expected 1",
                args.span,
            );
        } else if let Some(arg) = args.args.first() {
            self.check_conversion(&arg_types[0], &int_ty, arg.span);
        }
        Resolved::Value {
            ty: element,
            assignable,
        }
    }

    fn bind_new(&mut self, expr: &Expr, ty: &TypeRef, args: Option<&ArgList>) -> Resolved {
        let target = self.resolve_type(ty);
        let arg_types = match args {
            Some(args) => self.bind_args(args),
            None => Vec::new(),
        };
        let Ty::Named(id) = target else {
            return Resolved::rvalue(target);
        };

        let decls = self.decls;
        let def = decls.type_def(id);
        if def.is_static {
            let shown = self.show_type(id);
            self.error(
                "WS0712",
                format!("Cannot create an instance of the static class '{}'", shown),
                ty.span,
            );
            return Resolved::rvalue(target);
        }

        let ctors = self.decls.constructors(id);
        if ctors.is_empty() {
            if !arg_types.is_empty() {
                self.report_constructor_arity(id, arg_types.len(), ty.span);
            }
            return Resolved::rvalue(target);
        }
        // Value types always have an implicit parameterless constructor
        if def.is_value_type() && arg_types.is_empty() {
            return Resolved::rvalue(target);
        }

        let accessible: Vec<Callable> = ctors
            .iter()
            .copied()
            .filter(|c| {
                self.decls
                    .is_accessible(self.decls.member(*c), self.enclosing_type)
            })
            .map(Callable::Member)
            .collect();
        if accessible.is_empty() {
            let shown = self.show_type(id);
            self.error(
                "WS0122",
                format!("'{}.{}' is inaccessible due to its protection level", shown, shown),
                ty.span,
            );
            return Resolved::rvalue(target);
        }

        if let Some(args) = args {
            if let Some(chosen) = self.resolve_overload(
                Overload::Constructor(id),
                &accessible,
                args,
                &arg_types,
                ty.span,
            ) {
                self.model.symbols.insert(expr.id, chosen.symbol());
            }
        }
        Resolved::rvalue(target)
    }

    fn bind_this(&mut self, span: TextSpan) -> Resolved {
        match self.enclosing_type {
            None => {
                self.error(
                    "WS0027",
                    "Keyword 'this' is not available in the current context",
                    span,
                );
                Resolved::Error
            }
            Some(_) if self.is_static => {
                self.error(
                    "WS0026",
                    "Keyword 'this' is not valid in a static property, static method, or static field initializer",
                    span,
                );
                Resolved::Error
            }
            Some(id) => Resolved::rvalue(Ty::Named(id)),
        }
    }

    fn bind_unary(&mut self, op: UnaryOp, operand: &Expr, span: TextSpan) -> Resolved {
        let ty = if op.mutates() {
            let resolved = self.bind_expr(operand);
            let assignable = matches!(resolved, Resolved::Value { assignable: true, .. });
            let ty = self.value_of(resolved, operand);
            if !assignable && !ty.is_error() {
                self.error(
                    "WS0131",
                    "The operand of an increment or decrement operator must be a variable, property or indexer",
                    operand.span,
                );
            }
            ty
        } else {
            self.bind_value(operand)
        };

        match conversions::unary_result(self.decls, op, &ty) {
            Some(result) => Resolved::rvalue(result),
            None => {
                let shown = self.show(&ty);
                self.error(
                    "WS0023",
                    format!(
                        "Operator '{}' cannot be applied to operand of type '{}'",
                        op.symbol(),
                        shown
                    ),
                    span,
                );
                Resolved::Error
            }
        }
    }

    fn binary(&mut self, op: BinaryOp, symbol: &str, lhs: &Ty, rhs: &Ty, span: TextSpan) -> Resolved {
        match conversions::binary_result(self.decls, op, lhs, rhs) {
            Some(ty) => Resolved::rvalue(ty),
            None => {
                let (a, b) = (self.show(lhs), self.show(rhs));
                self.error(
                    "WS0019",
                    format!(
                        "Operator '{}' cannot be applied to operands of type '{}' and '{}'",
                        symbol, a, b
                    ),
                    span,
                );
                Resolved::Error
            }
        }
    }

    fn bind_assign(&mut self, op: AssignOp, target: &Expr, value: &Expr, span: TextSpan) -> Resolved {
        let resolved = self.bind_expr(target);
        let assignable = matches!(resolved, Resolved::Value { assignable: true, .. });
        let unresolved = matches!(resolved, Resolved::Error);
        let target_ty = self.value_of(resolved, target);
        let value_ty = self.bind_value(value);

        if !assignable && !unresolved && !target_ty.is_error() {
            self.report_not_assignable(target);
        }

        match op.binary() {
            None => self.check_conversion(&value_ty, &target_ty, value.span),
            Some(binary) => {
                let symbol = match op {
                    AssignOp::Add => "+=",
                    AssignOp::Sub => "-=",
                    AssignOp::Mul => "*=",
                    _ => "/=",
                };
                if let Resolved::Value { ty, .. } =
                    self.binary(binary, symbol, &target_ty, &value_ty, span)
                {
                    self.check_conversion(&ty, &target_ty, value.span);
                }
            }
        }
        Resolved::rvalue(target_ty)
    }

    fn report_not_assignable(&mut self, target: &Expr) {
        let decls = self.decls;
        let member = match self.model.symbols.get(&target.id) {
            Some(Symbol::Member(id)) => Some(decls.member(*id)),
            _ => None,
        };
        match member {
            Some(member) if member.kind == MemberKind::Field && member.is_readonly && !member.is_const => {
                self.error(
                    "WS0191",
                    "A readonly field cannot be assigned to (except in a constructor or a variable initializer)",
                    target.span,
                );
            }
            Some(member) if member.kind == MemberKind::Property => {
                let qualified = format!("{}.{}", self.show_type(member.owner), member.name);
                self.error(
                    "WS0200",
                    format!(
                        "Property or indexer '{}' cannot be assigned to -- it is read only",
                        qualified
                    ),
                    target.span,
                );
            }
            _ => self.error(
                "WS0131",
                "The left-hand side of an assignment must be a variable, property or indexer",
                target.span,
            ),
        }
    }
}

/// Expressions allowed as statements
fn is_statement_expression(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Assign { .. } | ExprKind::Invoke { .. } | ExprKind::New { .. } => true,
        ExprKind::Unary { op, .. } => op.mutates(),
        ExprKind::Missing => true,
        _ => false,
    }
}

/// Span of the method name in a callee expression
fn callee_name_span(callee: &Expr) -> TextSpan {
    match &callee.kind {
        ExprKind::Member { name, .. } if !name.is_missing() => name.span,
        ExprKind::Name(ident) => ident.span,
        _ => callee.span,
    }
}
