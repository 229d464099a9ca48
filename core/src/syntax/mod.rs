//! Workflow script syntax: tokens, lexer, AST and the error tolerant parser
//!
//! [`parse`] never fails. Every input yields a [`SyntaxTree`] whose
//! diagnostics describe what had to be recovered from.

pub mod ast;
pub mod finder;
pub mod lexer;
mod parser;
pub mod text;
pub mod token;

#[cfg(test)]
mod tests;

pub use ast::*;
pub use token::{Keyword, TextSpan, Token, TokenKind};

/// A lexical or structural error found while parsing
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxDiagnostic {
    pub code: &'static str,
    pub message: String,
    pub span: TextSpan,
}

impl SyntaxDiagnostic {
    pub fn new(code: &'static str, message: impl Into<String>, span: TextSpan) -> Self {
        Self {
            code,
            message: message.into(),
            span,
        }
    }
}

/// A parsed document
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    pub text: String,
    /// Full token stream, trivia included, terminated by `Eof`
    pub tokens: Vec<Token>,
    pub root: CompilationUnit,
    pub diagnostics: Vec<SyntaxDiagnostic>,
}

impl SyntaxTree {
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Tokens the parser sees (no whitespace or comments)
    pub fn significant_tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| !t.kind.is_trivia())
    }

    /// The token containing `offset`. When `offset` sits on a boundary, a
    /// word-like token ending there wins over the punctuation starting
    /// there, so the cursor in `x|.` is "on" `x`.
    pub fn token_at(&self, offset: usize) -> Option<&Token> {
        let mut containing = None;
        for token in &self.tokens {
            if token.kind == TokenKind::Eof {
                break;
            }
            if token.span.end == offset && token.kind.is_word() {
                return Some(token);
            }
            if token.span.contains(offset) {
                containing = Some(token);
            }
            if token.span.start > offset {
                break;
            }
        }
        containing
    }

    /// Last significant token ending at or before `offset`
    pub fn token_before(&self, offset: usize) -> Option<&Token> {
        self.significant_tokens()
            .take_while(|t| t.span.end <= offset && t.kind != TokenKind::Eof)
            .last()
    }

    /// Whether `offset` falls strictly inside a comment or a string/char
    /// literal (where completion makes no sense)
    pub fn in_comment_or_literal(&self, offset: usize) -> bool {
        self.tokens.iter().any(|t| {
            let interesting = t.kind.is_comment()
                || matches!(t.kind, TokenKind::StringLiteral | TokenKind::CharLiteral);
            if !interesting || offset <= t.span.start {
                return false;
            }
            if offset < t.span.end {
                return true;
            }
            // A line comment or an unterminated literal runs on to the
            // cursor when it ends exactly there.
            offset == t.span.end && !is_closed(t)
        })
    }
}

fn is_closed(token: &Token) -> bool {
    match token.kind {
        TokenKind::LineComment | TokenKind::DocComment => false,
        TokenKind::BlockComment => token.text.len() >= 4 && token.text.ends_with("*/"),
        TokenKind::StringLiteral | TokenKind::CharLiteral => literal_closed(&token.text),
        _ => true,
    }
}

fn literal_closed(text: &str) -> bool {
    if let Some(body) = text.strip_prefix("@\"") {
        let mut chars = body.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                } else {
                    return true;
                }
            }
        }
        return false;
    }
    let mut chars = text.chars();
    let Some(quote) = chars.next() else {
        return false;
    };
    let mut escaped = false;
    for c in chars {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return true;
        }
    }
    false
}

/// Lex and parse a document
pub fn parse(text: &str) -> SyntaxTree {
    let lexed = lexer::lex(text);
    let mut diagnostics = lexed.diagnostics;
    let (root, parse_diagnostics) = parser::Parser::new(&lexed.tokens, text.len()).parse_unit();
    diagnostics.extend(parse_diagnostics);
    diagnostics.sort_by_key(|d| d.span.start);

    SyntaxTree {
        text: text.to_string(),
        tokens: lexed.tokens,
        root,
        diagnostics,
    }
}
