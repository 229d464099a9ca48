//! Canonical layout of script text
//!
//! Layout is decided token by token. The syntax tree contributes a few
//! hints: which braces open property accessor lists or enum bodies, which
//! brackets close attribute sections, and which tokens sit inside a type.
//! Comments are kept; runs of blank lines collapse to one.
//!
//! # Examples
//!
//! ```
//! use wfscript_core::ide::{format, FormatOptions};
//! use wfscript_core::syntax;
//!
//! let tree = syntax::parse("var x=1;if(x>0){x++;}");
//! let formatted = format(&tree, &FormatOptions::default());
//! assert_eq!(formatted, "var x = 1;\nif (x > 0)\n{\n    x++;\n}\n");
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::syntax::finder::{self, NodeRef};
use crate::syntax::{Keyword, MemberDecl, SyntaxTree, TextSpan, Token, TokenKind, TypeDecl};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Spaces per nesting level
    pub indent_size: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self { indent_size: 4 }
    }
}

/// Canonical text for `tree`. Text with syntax errors comes back unchanged.
pub fn format(tree: &SyntaxTree, options: &FormatOptions) -> String {
    if tree.has_errors() {
        tracing::debug!(
            errors = tree.diagnostics.len(),
            "text has syntax errors, leaving it unformatted"
        );
        return tree.text.clone();
    }

    let layout = Layout::of(tree);
    let mut writer = Writer::new(options.indent_size);
    let tokens = &tree.tokens;
    let mut newlines = 0;

    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Eof => break,
            TokenKind::Whitespace => {
                newlines += token.text.matches('\n').count();
                continue;
            }
            kind if kind.is_comment() => {
                writer.comment(token, newlines, newline_follows(tokens, index), &layout);
            }
            _ => writer.token(token, newlines, next_significant(tokens, index), &layout),
        }
        newlines = 0;
    }
    writer.finish()
}

fn next_significant(tokens: &[Token], index: usize) -> Option<TokenKind> {
    tokens[index + 1..]
        .iter()
        .map(|t| t.kind)
        .find(|kind| !kind.is_trivia())
}

fn newline_follows(tokens: &[Token], index: usize) -> bool {
    match tokens.get(index + 1) {
        Some(next) if next.kind == TokenKind::Whitespace => next.text.contains('\n'),
        Some(next) => next.kind == TokenKind::Eof,
        None => true,
    }
}

/// Tokens that can end an operand; a `-` after one of them is binary
fn ends_operand(kind: TokenKind) -> bool {
    match kind {
        TokenKind::Ident
        | TokenKind::IntLiteral
        | TokenKind::RealLiteral
        | TokenKind::StringLiteral
        | TokenKind::CharLiteral
        | TokenKind::RParen
        | TokenKind::RBracket => true,
        TokenKind::Keyword(Keyword::True | Keyword::False | Keyword::Null | Keyword::This) => true,
        TokenKind::Keyword(keyword) => keyword.predefined_type().is_some(),
        _ => false,
    }
}

// ============================================================================
// Layout hints
// ============================================================================

#[derive(Debug, Default)]
struct Layout {
    accessor_braces: HashSet<usize>,
    enum_braces: HashSet<usize>,
    attribute_ends: HashSet<usize>,
    type_spans: Vec<TextSpan>,
}

impl Layout {
    fn of(tree: &SyntaxTree) -> Self {
        let mut layout = Layout::default();
        finder::walk(&tree.root, &mut |node, _| match node {
            NodeRef::Member(MemberDecl::Property(property)) => {
                if let Some(brace) = first_brace(tree, property.name.span.end, property.span) {
                    layout.accessor_braces.insert(brace);
                }
            }
            NodeRef::Type(TypeDecl::Enum(decl)) => {
                if let Some(brace) = first_brace(tree, decl.name.span.end, decl.span) {
                    layout.enum_braces.insert(brace);
                }
            }
            NodeRef::Attribute(attribute) => {
                layout.attribute_ends.insert(attribute.span.end);
            }
            NodeRef::TypeRef(ty) => layout.type_spans.push(ty.span),
            _ => {}
        });
        layout
    }

    fn in_type(&self, offset: usize) -> bool {
        self.type_spans.iter().any(|span| span.contains(offset))
    }

    fn opener(&self, offset: usize) -> Open {
        if self.accessor_braces.contains(&offset) {
            Open::Accessor
        } else if self.enum_braces.contains(&offset) {
            Open::Enum
        } else {
            Open::Block
        }
    }
}

fn first_brace(tree: &SyntaxTree, from: usize, within: TextSpan) -> Option<usize> {
    tree.significant_tokens()
        .skip_while(|t| t.span.start < from)
        .take_while(|t| t.span.end <= within.end)
        .find(|t| t.kind == TokenKind::LBrace)
        .map(|t| t.span.start)
}

// ============================================================================
// Writer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Break {
    None,
    Line,
    Blank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Open {
    Block,
    Accessor,
    Enum,
    Paren,
    Bracket,
}

struct Writer {
    out: String,
    indent_size: usize,
    depth: usize,
    pending: Break,
    line_start: bool,
    prev: Option<TokenKind>,
    prev_end: usize,
    /// The previous token was a prefix operator
    prev_prefix: bool,
    opens: Vec<Open>,
}

impl Writer {
    fn new(indent_size: usize) -> Self {
        Self {
            out: String::new(),
            indent_size,
            depth: 0,
            pending: Break::None,
            line_start: true,
            prev: None,
            prev_end: 0,
            prev_prefix: false,
            opens: Vec::new(),
        }
    }

    fn request(&mut self, brk: Break) {
        self.pending = self.pending.max(brk);
    }

    /// Keep a blank line from the source where a break happens anyway
    fn keep_blank(&mut self, newlines: usize, closing: bool) {
        if newlines >= 2
            && self.pending != Break::None
            && self.prev != Some(TokenKind::LBrace)
            && !closing
        {
            self.pending = Break::Blank;
        }
    }

    fn write(&mut self, text: &str, space: bool) {
        let brk = std::mem::replace(&mut self.pending, Break::None);
        if !self.out.is_empty() {
            match brk {
                Break::None => {}
                Break::Line => self.out.push('\n'),
                Break::Blank => self.out.push_str("\n\n"),
            }
            if brk != Break::None {
                self.line_start = true;
            }
        }
        if self.line_start {
            let width = self.depth * self.indent_size;
            self.out.extend(std::iter::repeat(' ').take(width));
        } else if space {
            self.out.push(' ');
        }
        self.out.push_str(text);
        self.line_start = false;
    }

    fn space_before(&self, kind: TokenKind, offset: usize, layout: &Layout) -> bool {
        let Some(prev) = self.prev else {
            return false;
        };
        if self.prev_prefix {
            return false;
        }
        if matches!(
            kind,
            TokenKind::Semi | TokenKind::Comma | TokenKind::RParen | TokenKind::RBracket | TokenKind::Dot
        ) {
            return false;
        }
        if matches!(prev, TokenKind::LParen | TokenKind::LBracket | TokenKind::Dot) {
            return false;
        }
        match kind {
            TokenKind::PlusPlus | TokenKind::MinusMinus => !ends_operand(prev),
            TokenKind::LParen => match prev {
                TokenKind::Ident | TokenKind::RParen | TokenKind::RBracket => false,
                TokenKind::Keyword(Keyword::Typeof | Keyword::This) => false,
                _ => true,
            },
            TokenKind::LBracket => !(ends_operand(prev) || layout.in_type(offset)),
            TokenKind::Question => !layout.in_type(offset),
            _ => true,
        }
    }

    fn token(&mut self, token: &Token, newlines: usize, next: Option<TokenKind>, layout: &Layout) {
        let kind = token.kind;
        let offset = token.span.start;

        let closed = match kind {
            TokenKind::LBrace => {
                if layout.opener(offset) != Open::Accessor {
                    self.request(Break::Line);
                }
                None
            }
            TokenKind::RBrace => {
                let closed = self.opens.pop().unwrap_or(Open::Block);
                if closed != Open::Accessor {
                    self.depth = self.depth.saturating_sub(1);
                    self.request(Break::Line);
                }
                Some(closed)
            }
            TokenKind::RParen | TokenKind::RBracket => {
                self.opens.pop();
                None
            }
            _ => None,
        };
        self.keep_blank(newlines, kind == TokenKind::RBrace);

        let space = self.space_before(kind, offset, layout);
        let prefix = match kind {
            TokenKind::Bang => true,
            TokenKind::Minus | TokenKind::Plus | TokenKind::PlusPlus | TokenKind::MinusMinus => {
                !self.prev.is_some_and(ends_operand)
            }
            _ => false,
        };
        let closes_attribute = kind == TokenKind::RBracket && layout.attribute_ends.contains(&self.prev_end);

        self.write(&token.text, space);
        self.prev = Some(kind);
        self.prev_end = token.span.end;
        self.prev_prefix = prefix;

        match kind {
            TokenKind::LBrace => {
                let open = layout.opener(offset);
                if open != Open::Accessor {
                    self.depth += 1;
                    self.request(Break::Line);
                }
                self.opens.push(open);
            }
            TokenKind::RBrace => {
                let glued = match closed {
                    Some(Open::Accessor) => matches!(next, Some(TokenKind::Eq)),
                    _ => matches!(
                        next,
                        Some(TokenKind::Semi | TokenKind::Comma | TokenKind::RParen)
                    ),
                };
                if !glued {
                    self.request(Break::Line);
                }
            }
            TokenKind::LParen => self.opens.push(Open::Paren),
            TokenKind::LBracket => self.opens.push(Open::Bracket),
            TokenKind::RBracket if closes_attribute => self.request(Break::Line),
            TokenKind::Semi if self.opens.last() != Some(&Open::Accessor) => {
                self.request(Break::Line)
            }
            TokenKind::Comma if self.opens.last() == Some(&Open::Enum) => self.request(Break::Line),
            _ => {}
        }
    }

    fn comment(&mut self, token: &Token, newlines: usize, newline_after: bool, layout: &Layout) {
        let text = token.text.trim_end();
        let own_line = self.out.is_empty() || newlines > 0;

        if own_line {
            self.request(Break::Line);
            self.keep_blank(newlines, false);
            self.write(text, false);
        } else {
            // Trailing comment: stays on the current line, ahead of any break
            let pending = std::mem::replace(&mut self.pending, Break::None);
            let space = self.space_before(token.kind, token.span.start, layout);
            self.write(text, space);
            self.pending = pending;
        }
        self.prev = Some(token.kind);
        self.prev_end = token.span.end;
        self.prev_prefix = false;

        let line_comment = matches!(token.kind, TokenKind::LineComment | TokenKind::DocComment);
        if line_comment || (own_line && newline_after) {
            self.request(Break::Line);
        }
    }

    fn finish(mut self) -> String {
        if self.out.is_empty() {
            return self.out;
        }
        self.out.push('\n');
        self.out
    }
}
