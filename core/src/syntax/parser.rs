//! Recursive descent parser over the significant token stream
//!
//! The parser never gives up. A missing token is reported and replaced by a
//! zero-width placeholder; a token that cannot start anything is reported
//! and skipped by the caller's progress guard.

use super::ast::*;
use super::lexer::{char_value, string_value};
use super::token::{Keyword, TextSpan, Token, TokenKind};
use super::SyntaxDiagnostic;

/// Deepest nesting of statements, expressions and type suffixes the parser
/// builds. Deeper input is skipped and reported, which also bounds every
/// recursive walk over the tree.
pub(crate) const MAX_NESTING: usize = 128;

const NESTED_TOO_DEEPLY: &str = "WS1005";

static EOF_TOKEN: Token = Token {
    kind: TokenKind::Eof,
    span: TextSpan { start: 0, end: 0 },
    text: String::new(),
};

/// Shape detected by the statement lookahead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclShape {
    Local,
    Function,
}

pub(super) struct Parser<'t> {
    tokens: Vec<&'t Token>,
    /// `///` text attached to the significant token at the same index
    docs: Vec<Option<String>>,
    pos: usize,
    next_id: NodeId,
    source_len: usize,
    /// Current nesting level, see [`MAX_NESTING`]
    depth: usize,
    diagnostics: Vec<SyntaxDiagnostic>,
}

impl<'t> Parser<'t> {
    pub(super) fn new(all: &'t [Token], source_len: usize) -> Self {
        let mut tokens = Vec::with_capacity(all.len());
        let mut docs = Vec::with_capacity(all.len());
        let mut pending_doc: Vec<&str> = Vec::new();

        for token in all {
            match token.kind {
                TokenKind::DocComment => {
                    pending_doc.push(token.text.trim_start_matches('/').trim());
                }
                kind if kind.is_trivia() => {}
                _ => {
                    docs.push(if pending_doc.is_empty() {
                        None
                    } else {
                        Some(pending_doc.join("\n"))
                    });
                    pending_doc.clear();
                    tokens.push(token);
                }
            }
        }

        Self {
            tokens,
            docs,
            pos: 0,
            next_id: 0,
            source_len,
            depth: 0,
            diagnostics: Vec::new(),
        }
    }

    // ========================================================================
    // Token cursor
    // ========================================================================

    fn nth(&self, n: usize) -> &'t Token {
        self.tokens
            .get(self.pos + n)
            .or_else(|| self.tokens.last())
            .copied()
            .unwrap_or(&EOF_TOKEN)
    }

    fn peek(&self) -> &'t Token {
        self.nth(0)
    }

    fn kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn nth_kind(&self, n: usize) -> TokenKind {
        self.nth(n).kind
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    fn at_kw(&self, keyword: Keyword) -> bool {
        self.kind() == TokenKind::Keyword(keyword)
    }

    fn at_eof(&self) -> bool {
        self.at(TokenKind::Eof)
    }

    fn bump(&mut self) -> &'t Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> Option<TextSpan> {
        if self.at(kind) {
            Some(self.bump().span)
        } else {
            None
        }
    }

    fn eat_kw(&mut self, keyword: Keyword) -> Option<TextSpan> {
        self.eat(TokenKind::Keyword(keyword))
    }

    fn expect(&mut self, kind: TokenKind) -> Option<TextSpan> {
        let span = self.eat(kind);
        if span.is_none() {
            let at = self.prev_end();
            self.error(
                "WS1001",
                format!("'{}' expected", kind.describe()),
                TextSpan::empty(at),
            );
        }
        span
    }

    fn expect_ident(&mut self) -> Ident {
        if self.at(TokenKind::Ident) {
            let token = self.bump();
            return Ident {
                name: token.text.clone(),
                span: token.span,
            };
        }
        let at = self.prev_end();
        self.error("WS1001", "Identifier expected", TextSpan::empty(at));
        Ident::missing(at)
    }

    /// End of the last consumed token
    fn prev_end(&self) -> usize {
        match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(token) => token.span.end,
            None => 0,
        }
    }

    fn start(&self) -> usize {
        self.peek().span.start
    }

    fn span_from(&self, start: usize) -> TextSpan {
        TextSpan::new(start, self.prev_end().max(start))
    }

    fn id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn doc(&self) -> Option<String> {
        self.docs.get(self.pos).cloned().flatten()
    }

    fn error(&mut self, code: &'static str, message: impl Into<String>, span: TextSpan) {
        self.diagnostics.push(SyntaxDiagnostic::new(code, message, span));
    }

    fn unexpected(&mut self) {
        let token = self.peek();
        self.error(
            "WS1001",
            format!("Unexpected token '{}'", token.text),
            token.span,
        );
    }

    /// Progress guard for list loops: when nothing was consumed since
    /// `before`, skip one token (reporting it unless the failed attempt
    /// already did).
    fn recover(&mut self, before: usize, diagnostics_before: usize) {
        if self.pos == before && !self.at_eof() {
            if self.diagnostics.len() == diagnostics_before {
                self.unexpected();
            }
            self.bump();
        }
    }

    /// Skip the construct at the cursor, balancing brackets, up to the
    /// first unmatched closer, `,` or `;`. Used once nesting passes
    /// [`MAX_NESTING`]; yields a placeholder spanning the skipped text.
    fn too_deep(&mut self) -> Expr {
        let start = self.start();
        let mut open = 0usize;
        loop {
            match self.kind() {
                TokenKind::Eof => break,
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => open += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    if open == 0 {
                        break;
                    }
                    open -= 1;
                }
                TokenKind::Comma | TokenKind::Semi if open == 0 => break,
                _ => {}
            }
            self.bump();
        }

        let span = self.span_from(start);
        self.error(NESTED_TOO_DEEPLY, "Expression is nested too deeply", span);
        let id = self.id();
        Expr {
            id,
            kind: ExprKind::Missing,
            span,
        }
    }

    /// Run `parse` one nesting level deeper
    fn nested(&mut self, parse: fn(&mut Self) -> Expr) -> Expr {
        if self.depth >= MAX_NESTING {
            return self.too_deep();
        }
        self.depth += 1;
        let expr = parse(self);
        self.depth -= 1;
        expr
    }

    // ========================================================================
    // Compilation unit and declarations
    // ========================================================================

    pub(super) fn parse_unit(mut self) -> (CompilationUnit, Vec<SyntaxDiagnostic>) {
        let mut usings = Vec::new();
        let mut items = Vec::new();

        while self.at_kw(Keyword::Using) {
            usings.push(self.parse_using());
        }

        while !self.at_eof() {
            let before = self.pos;
            let errors = self.diagnostics.len();

            if self.at_kw(Keyword::Using) {
                let using = self.parse_using();
                self.error(
                    "WS1001",
                    "A using clause must precede all other elements defined in the namespace",
                    using.span,
                );
                usings.push(using);
            } else if self.at_kw(Keyword::Namespace) {
                items.push(Item::Namespace(self.parse_namespace()));
            } else if self.at_type_decl() {
                items.push(Item::Type(self.parse_type_decl()));
            } else {
                items.push(Item::Statement(self.parse_stmt(true)));
            }

            self.recover(before, errors);
        }

        let unit = CompilationUnit {
            usings,
            items,
            span: TextSpan::new(0, self.source_len),
        };
        (unit, self.diagnostics)
    }

    fn parse_using(&mut self) -> UsingDirective {
        let start = self.start();
        self.bump();
        let name = self.parse_qualified_name();
        self.expect(TokenKind::Semi);
        UsingDirective {
            name,
            span: self.span_from(start),
        }
    }

    fn parse_qualified_name(&mut self) -> QualifiedName {
        let start = self.start();
        let mut parts = vec![self.expect_ident()];
        while self.at(TokenKind::Dot) {
            self.bump();
            parts.push(self.expect_ident());
        }
        QualifiedName {
            parts,
            span: self.span_from(start),
        }
    }

    fn parse_namespace(&mut self) -> NamespaceDecl {
        let start = self.start();
        self.bump();
        let name = self.parse_qualified_name();
        let mut types = Vec::new();

        let file_scoped = self.eat(TokenKind::Semi).is_some();
        if !file_scoped && self.expect(TokenKind::LBrace).is_none() {
            return NamespaceDecl {
                name,
                types,
                span: self.span_from(start),
            };
        }

        loop {
            if self.at_eof() || (!file_scoped && self.at(TokenKind::RBrace)) {
                break;
            }
            if self.at_type_decl() {
                types.push(self.parse_type_decl());
            } else {
                self.unexpected();
                self.bump();
            }
        }
        if !file_scoped {
            self.expect(TokenKind::RBrace);
        }

        NamespaceDecl {
            name,
            types,
            span: self.span_from(start),
        }
    }

    /// Attributes and modifiers followed by `class`, `struct` or `enum`
    fn at_type_decl(&self) -> bool {
        let mut i = 0;
        loop {
            match self.nth_kind(i) {
                TokenKind::LBracket => {
                    let mut depth = 0usize;
                    loop {
                        match self.nth_kind(i) {
                            TokenKind::LBracket => depth += 1,
                            TokenKind::RBracket => {
                                depth -= 1;
                                if depth == 0 {
                                    i += 1;
                                    break;
                                }
                            }
                            TokenKind::Eof => return false,
                            _ => {}
                        }
                        i += 1;
                    }
                }
                TokenKind::Keyword(k) if k.is_modifier() => i += 1,
                _ => break,
            }
        }
        matches!(
            self.nth_kind(i),
            TokenKind::Keyword(Keyword::Class | Keyword::Struct | Keyword::Enum)
        )
    }

    fn parse_attributes(&mut self) -> Vec<Attribute> {
        let mut attributes = Vec::new();
        while self.at(TokenKind::LBracket) {
            self.bump();
            loop {
                let start = self.start();
                let id = self.id();
                let name = self.parse_qualified_name();
                let args = if self.at(TokenKind::LParen) {
                    Some(self.parse_arg_list(TokenKind::RParen))
                } else {
                    None
                };
                attributes.push(Attribute {
                    id,
                    name,
                    args,
                    span: self.span_from(start),
                });
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RBracket);
        }
        attributes
    }

    fn parse_modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers::default();
        while let TokenKind::Keyword(keyword) = self.kind() {
            if !keyword.is_modifier() {
                break;
            }
            let span = self.bump().span;
            match keyword {
                Keyword::Public => modifiers.accessibility = Some(Accessibility::Public),
                Keyword::Private => modifiers.accessibility = Some(Accessibility::Private),
                Keyword::Protected => modifiers.accessibility = Some(Accessibility::Protected),
                Keyword::Internal => modifiers.accessibility = Some(Accessibility::Internal),
                Keyword::Static => modifiers.is_static = true,
                Keyword::Readonly => modifiers.is_readonly = true,
                Keyword::Const => modifiers.is_const = true,
                _ => {}
            }
            modifiers.span = Some(modifiers.span.map_or(span, |s| s.merge(span)));
        }
        modifiers
    }

    fn parse_type_decl(&mut self) -> TypeDecl {
        let doc = self.doc();
        let start = self.start();
        let attributes = self.parse_attributes();
        let modifiers = self.parse_modifiers();

        if self.at_kw(Keyword::Enum) {
            return TypeDecl::Enum(self.parse_enum(start, attributes, modifiers, doc));
        }

        let is_struct = self.at_kw(Keyword::Struct);
        self.bump();
        let id = self.id();
        let name = self.expect_ident();
        let mut members = Vec::new();

        if self.expect(TokenKind::LBrace).is_some() {
            while !self.at(TokenKind::RBrace) && !self.at_eof() {
                let before = self.pos;
                let errors = self.diagnostics.len();
                if let Some(member) = self.parse_member(&name.name) {
                    members.push(member);
                }
                self.recover(before, errors);
            }
            self.expect(TokenKind::RBrace);
            self.eat(TokenKind::Semi);
        }

        TypeDecl::Class(ClassDecl {
            id,
            attributes,
            modifiers,
            is_struct,
            name,
            members,
            doc,
            span: self.span_from(start),
        })
    }

    fn parse_enum(
        &mut self,
        start: usize,
        attributes: Vec<Attribute>,
        modifiers: Modifiers,
        doc: Option<String>,
    ) -> EnumDecl {
        self.bump();
        let id = self.id();
        let name = self.expect_ident();
        let mut variants = Vec::new();

        if self.expect(TokenKind::LBrace).is_some() {
            while !self.at(TokenKind::RBrace) && !self.at_eof() {
                let variant_doc = self.doc();
                let variant_start = self.start();
                let variant_id = self.id();
                let variant_name = self.expect_ident();
                let value = if self.eat(TokenKind::Eq).is_some() {
                    Some(self.parse_expr())
                } else {
                    None
                };
                variants.push(EnumVariant {
                    id: variant_id,
                    name: variant_name,
                    value,
                    doc: variant_doc,
                    span: self.span_from(variant_start),
                });
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RBrace);
            self.eat(TokenKind::Semi);
        }

        EnumDecl {
            id,
            attributes,
            modifiers,
            name,
            variants,
            doc,
            span: self.span_from(start),
        }
    }

    fn parse_member(&mut self, class_name: &str) -> Option<MemberDecl> {
        let doc = self.doc();
        let start = self.start();
        let attributes = self.parse_attributes();
        let modifiers = self.parse_modifiers();

        if self.at(TokenKind::Ident)
            && self.peek().text == class_name
            && self.nth_kind(1) == TokenKind::LParen
        {
            let id = self.id();
            let name = self.expect_ident();
            let params = self.parse_params();
            let body = self.parse_body();
            return Some(MemberDecl::Constructor(ConstructorDecl {
                id,
                attributes,
                modifiers,
                name,
                params,
                body,
                doc,
                span: self.span_from(start),
            }));
        }

        let ty = self.parse_type(false);
        if ty.kind == TypeRefKind::Missing {
            return None;
        }
        let name = self.expect_ident();

        if self.at(TokenKind::LParen) {
            let id = self.id();
            let params = self.parse_params();
            let body = self.parse_body();
            return Some(MemberDecl::Method(MethodDecl {
                id,
                attributes,
                modifiers,
                return_ty: ty,
                name,
                params,
                body,
                doc,
                span: self.span_from(start),
            }));
        }

        if self.at(TokenKind::LBrace) {
            let id = self.id();
            let (has_get, has_set) = self.parse_accessors();
            let init = if self.eat(TokenKind::Eq).is_some() {
                let init = self.parse_expr();
                self.expect(TokenKind::Semi);
                Some(init)
            } else {
                None
            };
            return Some(MemberDecl::Property(PropertyDecl {
                id,
                attributes,
                modifiers,
                ty,
                name,
                has_get,
                has_set,
                init,
                doc,
                span: self.span_from(start),
            }));
        }

        let declarators = self.parse_declarators(Some(name));
        self.expect(TokenKind::Semi);
        Some(MemberDecl::Field(FieldDecl {
            attributes,
            modifiers,
            ty,
            declarators,
            doc,
            span: self.span_from(start),
        }))
    }

    /// `{ get; set; }`
    fn parse_accessors(&mut self) -> (bool, bool) {
        let mut has_get = false;
        let mut has_set = false;
        self.bump();
        while !self.at(TokenKind::RBrace) && !self.at_eof() {
            let token = self.peek();
            match (token.kind, token.text.as_str()) {
                (TokenKind::Ident, "get") => has_get = true,
                (TokenKind::Ident, "set") => has_set = true,
                _ => {
                    self.error(
                        "WS1001",
                        "A get or set accessor expected",
                        token.span,
                    );
                    self.bump();
                    continue;
                }
            }
            self.bump();
            self.expect(TokenKind::Semi);
        }
        self.expect(TokenKind::RBrace);
        (has_get, has_set)
    }

    fn parse_declarators(&mut self, first: Option<Ident>) -> Vec<VariableDeclarator> {
        let mut declarators = Vec::new();
        let mut first = first;
        loop {
            let start = first
                .as_ref()
                .map(|f| f.span.start)
                .unwrap_or_else(|| self.start());
            let id = self.id();
            let name = match first.take() {
                Some(name) => name,
                None => self.expect_ident(),
            };
            let init = if self.eat(TokenKind::Eq).is_some() {
                Some(self.parse_expr())
            } else {
                None
            };
            declarators.push(VariableDeclarator {
                id,
                name,
                init,
                span: self.span_from(start),
            });
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        declarators
    }

    fn parse_params(&mut self) -> ParamList {
        let start = self.start();
        let mut params = Vec::new();
        self.expect(TokenKind::LParen);

        if !self.at(TokenKind::RParen) && !self.at_eof() {
            loop {
                let before = self.pos;
                let param_start = self.start();
                let id = self.id();
                let ty = self.parse_type(false);
                let name = self.expect_ident();
                let default = if self.eat(TokenKind::Eq).is_some() {
                    Some(self.parse_expr())
                } else {
                    None
                };
                params.push(Parameter {
                    id,
                    ty,
                    name,
                    default,
                    span: self.span_from(param_start),
                });
                if self.pos == before || self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen);

        ParamList {
            params,
            span: self.span_from(start),
        }
    }

    /// Block body, `=> expr;` body, or `;` for a declaration without body
    fn parse_body(&mut self) -> Option<Body> {
        if self.at(TokenKind::LBrace) {
            return Some(Body::Block(self.parse_block()));
        }
        if self.eat(TokenKind::FatArrow).is_some() {
            let expr = self.parse_expr();
            self.expect(TokenKind::Semi);
            return Some(Body::Expr(expr));
        }
        self.expect(TokenKind::Semi);
        None
    }

    // ========================================================================
    // Types
    // ========================================================================

    fn parse_type(&mut self, allow_var: bool) -> TypeRef {
        let start = self.start();
        let kind = match self.kind() {
            TokenKind::Keyword(Keyword::Var) if allow_var => {
                self.bump();
                TypeRefKind::Var
            }
            TokenKind::Keyword(keyword) if keyword.predefined_type().is_some() => {
                self.bump();
                match keyword.predefined_type() {
                    Some(predefined) => TypeRefKind::Predefined(predefined),
                    None => TypeRefKind::Missing,
                }
            }
            TokenKind::Ident => TypeRefKind::Named(self.parse_qualified_name()),
            _ => {
                let span = self.peek().span;
                self.error("WS1001", "Type expected", span);
                return TypeRef::missing(self.prev_end());
            }
        };

        let mut ty = TypeRef {
            kind,
            span: self.span_from(start),
        };
        let mut suffixes = 0;
        loop {
            let suffix_start = self.start();
            let array = if self.at(TokenKind::Question) {
                self.bump();
                false
            } else if self.at(TokenKind::LBracket) && self.nth_kind(1) == TokenKind::RBracket {
                self.bump();
                self.bump();
                true
            } else {
                break;
            };

            suffixes += 1;
            if suffixes > MAX_NESTING {
                if suffixes == MAX_NESTING + 1 {
                    let span = self.span_from(suffix_start);
                    self.error(NESTED_TOO_DEEPLY, "Type is nested too deeply", span);
                }
                continue;
            }
            let inner = Box::new(ty);
            ty = TypeRef {
                kind: if array {
                    TypeRefKind::Array(inner)
                } else {
                    TypeRefKind::Nullable(inner)
                },
                span: self.span_from(start),
            };
        }
        ty
    }

    /// Index just past a type starting `offset` tokens ahead, and whether
    /// it carried a `?` suffix
    fn scan_type(&self, offset: usize) -> Option<(usize, bool)> {
        let mut i = offset;
        match self.nth_kind(i) {
            TokenKind::Keyword(Keyword::Var) => i += 1,
            TokenKind::Keyword(k) if k.predefined_type().is_some() => i += 1,
            TokenKind::Ident => {
                i += 1;
                while self.nth_kind(i) == TokenKind::Dot && self.nth_kind(i + 1) == TokenKind::Ident {
                    i += 2;
                }
            }
            _ => return None,
        }
        let mut nullable = false;
        loop {
            match self.nth_kind(i) {
                TokenKind::Question => {
                    nullable = true;
                    i += 1;
                }
                TokenKind::LBracket if self.nth_kind(i + 1) == TokenKind::RBracket => i += 2,
                _ => break,
            }
        }
        Some((i, nullable))
    }

    /// `Type name ...` starts a declaration: a local when followed by
    /// `=`, `;` or `,`, a local function when followed by `(`
    fn decl_shape(&self, offset: usize) -> Option<DeclShape> {
        let (end, nullable) = self.scan_type(offset)?;
        if self.nth_kind(end) != TokenKind::Ident {
            return None;
        }
        match self.nth_kind(end + 1) {
            TokenKind::LParen if !nullable => Some(DeclShape::Function),
            TokenKind::Eq | TokenKind::Semi | TokenKind::Comma | TokenKind::Eof => {
                Some(DeclShape::Local)
            }
            _ if nullable => None,
            _ => Some(DeclShape::Local),
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_block(&mut self) -> Block {
        let start = self.start();
        self.expect(TokenKind::LBrace);
        let mut stmts = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at_eof() {
            let before = self.pos;
            let errors = self.diagnostics.len();
            stmts.push(self.parse_stmt(false));
            self.recover(before, errors);
        }
        self.expect(TokenKind::RBrace);
        Block {
            stmts,
            span: self.span_from(start),
        }
    }

    /// `top_level` statements belong to the script body, where a final
    /// expression without `;` is the script's result
    fn parse_stmt(&mut self, top_level: bool) -> Stmt {
        if self.depth >= MAX_NESTING {
            let start = self.start();
            let id = self.id();
            self.too_deep();
            self.eat(TokenKind::Semi);
            return Stmt {
                id,
                kind: StmtKind::Empty,
                span: self.span_from(start),
            };
        }
        self.depth += 1;
        let stmt = self.parse_stmt_inner(top_level);
        self.depth -= 1;
        stmt
    }

    fn parse_stmt_inner(&mut self, top_level: bool) -> Stmt {
        let start = self.start();
        let id = self.id();

        let kind = match self.kind() {
            TokenKind::LBrace => StmtKind::Block(self.parse_block()),
            TokenKind::Semi => {
                self.bump();
                StmtKind::Empty
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::While) => {
                self.bump();
                self.expect(TokenKind::LParen);
                let cond = self.parse_expr();
                self.expect(TokenKind::RParen);
                let body = Box::new(self.parse_stmt(false));
                StmtKind::While { cond, body }
            }
            TokenKind::Keyword(Keyword::Return) => {
                self.bump();
                let value = if self.at(TokenKind::Semi) || self.at(TokenKind::RBrace) || self.at_eof() {
                    None
                } else {
                    Some(self.parse_expr())
                };
                self.expect(TokenKind::Semi);
                StmtKind::Return(value)
            }
            TokenKind::Keyword(Keyword::Break) => {
                self.bump();
                self.expect(TokenKind::Semi);
                StmtKind::Break
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.bump();
                self.expect(TokenKind::Semi);
                StmtKind::Continue
            }
            TokenKind::Keyword(Keyword::Const) => {
                self.bump();
                let ty = self.parse_type(false);
                let declarators = self.parse_declarators(None);
                self.expect(TokenKind::Semi);
                StmtKind::Local(LocalDecl {
                    is_const: true,
                    ty,
                    declarators,
                })
            }
            TokenKind::Keyword(Keyword::Static)
                if self.decl_shape(1) == Some(DeclShape::Function) =>
            {
                let modifiers = self.parse_modifiers();
                StmtKind::LocalFunction(self.parse_local_function(start, modifiers))
            }
            TokenKind::Keyword(Keyword::Var) => self.parse_local(),
            _ => match self.decl_shape(0) {
                Some(DeclShape::Local) => self.parse_local(),
                Some(DeclShape::Function) => {
                    StmtKind::LocalFunction(self.parse_local_function(start, Modifiers::default()))
                }
                None => return self.parse_expr_stmt(start, id, top_level),
            },
        };

        Stmt {
            id,
            kind,
            span: self.span_from(start),
        }
    }

    fn parse_if(&mut self) -> StmtKind {
        self.bump();
        self.expect(TokenKind::LParen);
        let cond = self.parse_expr();
        self.expect(TokenKind::RParen);
        let then_branch = Box::new(self.parse_stmt(false));
        let else_branch = if self.eat_kw(Keyword::Else).is_some() {
            Some(Box::new(self.parse_stmt(false)))
        } else {
            None
        };
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        }
    }

    fn parse_local(&mut self) -> StmtKind {
        let ty = self.parse_type(true);
        let declarators = self.parse_declarators(None);
        self.expect(TokenKind::Semi);
        StmtKind::Local(LocalDecl {
            is_const: false,
            ty,
            declarators,
        })
    }

    fn parse_local_function(&mut self, start: usize, modifiers: Modifiers) -> MethodDecl {
        let doc = self.doc();
        let id = self.id();
        let return_ty = self.parse_type(false);
        let name = self.expect_ident();
        let params = self.parse_params();
        let body = self.parse_body();
        MethodDecl {
            id,
            attributes: Vec::new(),
            modifiers,
            return_ty,
            name,
            params,
            body,
            doc,
            span: self.span_from(start),
        }
    }

    fn parse_expr_stmt(&mut self, start: usize, id: NodeId, top_level: bool) -> Stmt {
        let before = self.pos;
        let expr = self.parse_expr();

        let has_semicolon = if self.pos == before {
            // Nothing parsed; leave the token to the caller's recovery.
            false
        } else if self.eat(TokenKind::Semi).is_some() {
            true
        } else if top_level && self.at_eof() {
            false
        } else {
            self.expect(TokenKind::Semi);
            true
        };

        Stmt {
            id,
            kind: StmtKind::Expr {
                expr,
                has_semicolon,
            },
            span: self.span_from(start),
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub(super) fn parse_expr(&mut self) -> Expr {
        self.nested(Self::parse_assignment)
    }

    fn expr(&mut self, kind: ExprKind, start: usize) -> Expr {
        let id = self.id();
        Expr {
            id,
            kind,
            span: self.span_from(start),
        }
    }

    fn parse_assignment(&mut self) -> Expr {
        let start = self.start();
        let target = self.parse_conditional();
        let op = match self.kind() {
            TokenKind::Eq => AssignOp::Assign,
            TokenKind::PlusEq => AssignOp::Add,
            TokenKind::MinusEq => AssignOp::Sub,
            TokenKind::StarEq => AssignOp::Mul,
            TokenKind::SlashEq => AssignOp::Div,
            _ => return target,
        };
        self.bump();
        let value = self.nested(Self::parse_assignment);
        self.expr(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            start,
        )
    }

    fn parse_conditional(&mut self) -> Expr {
        let start = self.start();
        let cond = self.parse_coalesce();
        if !self.at(TokenKind::Question) {
            return cond;
        }
        self.bump();
        let when_true = self.parse_expr();
        self.expect(TokenKind::Colon);
        let when_false = self.parse_expr();
        self.expr(
            ExprKind::Conditional {
                cond: Box::new(cond),
                when_true: Box::new(when_true),
                when_false: Box::new(when_false),
            },
            start,
        )
    }

    fn parse_coalesce(&mut self) -> Expr {
        let start = self.start();
        let lhs = self.parse_binary(1);
        if !self.at(TokenKind::QuestionQuestion) {
            return lhs;
        }
        self.bump();
        let rhs = self.nested(Self::parse_coalesce);
        self.expr(
            ExprKind::Binary {
                op: BinaryOp::Coalesce,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            start,
        )
    }

    fn parse_binary(&mut self, min_prec: u8) -> Expr {
        let start = self.start();
        let outer = self.depth;
        let mut lhs = self.parse_unary();
        while let Some((op, prec)) = binary_op(self.kind()) {
            if prec < min_prec {
                break;
            }
            // every link of a chain nests the left operand one level deeper
            if self.depth >= MAX_NESTING {
                self.depth = outer;
                return self.too_deep();
            }
            self.depth += 1;
            self.bump();
            let rhs = self.parse_binary(prec + 1);
            lhs = self.expr(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                start,
            );
        }
        self.depth = outer;
        lhs
    }

    fn parse_unary(&mut self) -> Expr {
        let start = self.start();
        let op = match self.kind() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::PlusPlus => UnaryOp::PreIncrement,
            TokenKind::MinusMinus => UnaryOp::PreDecrement,
            _ => return self.parse_postfix(),
        };
        self.bump();
        let operand = self.nested(Self::parse_unary);
        self.expr(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            start,
        )
    }

    fn parse_postfix(&mut self) -> Expr {
        let start = self.start();
        let outer = self.depth;
        let mut expr = self.parse_primary();
        loop {
            let postfix = matches!(
                self.kind(),
                TokenKind::Dot
                    | TokenKind::LParen
                    | TokenKind::LBracket
                    | TokenKind::PlusPlus
                    | TokenKind::MinusMinus
            );
            if postfix && self.depth >= MAX_NESTING {
                self.depth = outer;
                return self.too_deep();
            }
            self.depth += 1;
            let kind = match self.kind() {
                TokenKind::Dot => {
                    let dot = self.bump().span;
                    let name = self.expect_ident();
                    ExprKind::Member {
                        target: Box::new(expr),
                        dot,
                        name,
                    }
                }
                TokenKind::LParen => {
                    let args = self.parse_arg_list(TokenKind::RParen);
                    ExprKind::Invoke {
                        callee: Box::new(expr),
                        args,
                    }
                }
                TokenKind::LBracket => {
                    let args = self.parse_arg_list(TokenKind::RBracket);
                    ExprKind::Index {
                        target: Box::new(expr),
                        args,
                    }
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let op = if self.at(TokenKind::PlusPlus) {
                        UnaryOp::PostIncrement
                    } else {
                        UnaryOp::PostDecrement
                    };
                    self.bump();
                    ExprKind::Unary {
                        op,
                        operand: Box::new(expr),
                    }
                }
                _ => break,
            };
            expr = self.expr(kind, start);
        }
        self.depth = outer;
        expr
    }

    fn parse_primary(&mut self) -> Expr {
        let start = self.start();
        let token = self.peek();

        let kind = match token.kind {
            TokenKind::IntLiteral => {
                self.bump();
                ExprKind::Literal(self.int_literal(token))
            }
            TokenKind::RealLiteral => {
                self.bump();
                ExprKind::Literal(self.real_literal(token))
            }
            TokenKind::StringLiteral => {
                self.bump();
                ExprKind::Literal(Literal::String(string_value(&token.text)))
            }
            TokenKind::CharLiteral => {
                self.bump();
                ExprKind::Literal(Literal::Char(char_value(&token.text)))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.bump();
                ExprKind::Literal(Literal::Bool(true))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.bump();
                ExprKind::Literal(Literal::Bool(false))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.bump();
                ExprKind::Literal(Literal::Null)
            }
            TokenKind::Keyword(Keyword::This) => {
                self.bump();
                ExprKind::This
            }
            TokenKind::Keyword(Keyword::New) => {
                self.bump();
                let ty = self.parse_type(false);
                let args = if self.at(TokenKind::LParen) {
                    Some(self.parse_arg_list(TokenKind::RParen))
                } else {
                    self.expect(TokenKind::LParen);
                    None
                };
                ExprKind::New { ty, args }
            }
            TokenKind::Keyword(Keyword::Typeof) => {
                self.bump();
                self.expect(TokenKind::LParen);
                let ty = self.parse_type(false);
                self.expect(TokenKind::RParen);
                ExprKind::TypeOf(ty)
            }
            TokenKind::Keyword(keyword) if keyword.predefined_type().is_some() && keyword != Keyword::Void => {
                self.bump();
                match keyword.predefined_type() {
                    Some(predefined) => ExprKind::PredefinedType(predefined),
                    None => ExprKind::Missing,
                }
            }
            TokenKind::Ident => {
                self.bump();
                ExprKind::Name(Ident {
                    name: token.text.clone(),
                    span: token.span,
                })
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr();
                self.expect(TokenKind::RParen);
                ExprKind::Paren(Box::new(inner))
            }
            TokenKind::Eof => {
                let at = self.prev_end();
                self.error("WS1001", "Expression expected", TextSpan::empty(at));
                return self.missing_expr(at);
            }
            _ => {
                self.error(
                    "WS1001",
                    format!("Invalid expression term '{}'", token.text),
                    token.span,
                );
                let at = self.prev_end();
                return self.missing_expr(at);
            }
        };

        self.expr(kind, start)
    }

    fn missing_expr(&mut self, at: usize) -> Expr {
        let id = self.id();
        Expr {
            id,
            kind: ExprKind::Missing,
            span: TextSpan::empty(at),
        }
    }

    fn int_literal(&mut self, token: &Token) -> Literal {
        let text = token.text.as_str();
        let (digits, long_suffix) = match text.strip_suffix(['l', 'L']) {
            Some(digits) => (digits, true),
            None => (text, false),
        };
        match digits.parse::<i64>() {
            Ok(value) if long_suffix || value > i64::from(i32::MAX) => Literal::Long(value),
            Ok(value) => Literal::Int(value),
            Err(_) => {
                self.error("WS1004", "Integral constant is too large", token.span);
                Literal::Int(0)
            }
        }
    }

    fn real_literal(&mut self, token: &Token) -> Literal {
        let text = token.text.as_str();
        let suffix = text.chars().last().map(|c| c.to_ascii_lowercase());
        let digits = match suffix {
            Some('f' | 'd' | 'm') => &text[..text.len() - 1],
            _ => text,
        };
        let Ok(value) = digits.parse::<f64>() else {
            self.error("WS1004", "Invalid real literal", token.span);
            return Literal::Double(0.0);
        };
        match suffix {
            Some('f') => Literal::Float(value),
            Some('m') => Literal::Decimal(value),
            _ => Literal::Double(value),
        }
    }

    /// `(a, b)` or `[a, b]`. An unclosed list extends up to the next
    /// unconsumed token so a cursor after trailing whitespace is inside it.
    fn parse_arg_list(&mut self, close_kind: TokenKind) -> ArgList {
        let open = self.bump().span;
        let mut args = Vec::new();
        let mut separators = Vec::new();

        if !self.at(close_kind) && !self.at_eof() {
            loop {
                args.push(self.parse_expr());
                match self.eat(TokenKind::Comma) {
                    Some(comma) => separators.push(comma),
                    None => break,
                }
            }
        }

        let close = self.expect(close_kind);
        let end = match close {
            Some(close) => close.end,
            None => self.start().max(self.prev_end()),
        };
        ArgList {
            open,
            args,
            separators,
            close,
            span: TextSpan::new(open.start, end),
        }
    }
}

/// Binary operator and its precedence (higher binds tighter)
fn binary_op(kind: TokenKind) -> Option<(BinaryOp, u8)> {
    let op = match kind {
        TokenKind::PipePipe => (BinaryOp::Or, 1),
        TokenKind::AmpAmp => (BinaryOp::And, 2),
        TokenKind::Pipe => (BinaryOp::BitOr, 3),
        TokenKind::Amp => (BinaryOp::BitAnd, 4),
        TokenKind::EqEq => (BinaryOp::Eq, 5),
        TokenKind::BangEq => (BinaryOp::Ne, 5),
        TokenKind::Lt => (BinaryOp::Lt, 6),
        TokenKind::LtEq => (BinaryOp::Le, 6),
        TokenKind::Gt => (BinaryOp::Gt, 6),
        TokenKind::GtEq => (BinaryOp::Ge, 6),
        TokenKind::Plus => (BinaryOp::Add, 7),
        TokenKind::Minus => (BinaryOp::Sub, 7),
        TokenKind::Star => (BinaryOp::Mul, 8),
        TokenKind::Slash => (BinaryOp::Div, 8),
        TokenKind::Percent => (BinaryOp::Rem, 8),
        _ => return None,
    };
    Some(op)
}
