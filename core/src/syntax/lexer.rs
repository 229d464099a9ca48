//! PEST-based lexer for workflow scripts
//!
//! Produces the full token stream, trivia included, so the parser can skip
//! it and the formatter can keep comments where the author put them.

use pest::Parser;
use pest_derive::Parser;

use super::token::{Keyword, TextSpan, Token, TokenKind};
use super::SyntaxDiagnostic;

#[derive(Parser)]
#[grammar = "syntax/script.pest"]
struct ScriptLexer;

/// Output of [`lex`]: every token (trivia included, terminated by `Eof`)
/// plus lexical diagnostics
#[derive(Debug, Clone)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<SyntaxDiagnostic>,
}

/// Split `source` into tokens. Never fails: malformed input becomes
/// `Unknown` tokens and diagnostics.
pub fn lex(source: &str) -> Lexed {
    let mut tokens = Vec::new();
    let mut diagnostics = Vec::new();

    let file = match ScriptLexer::parse(Rule::file, source) {
        Ok(mut pairs) => pairs.next(),
        Err(err) => {
            // The grammar accepts any input; treat a failure as one opaque token.
            tracing::warn!(error = %err, "lexer grammar rejected input");
            None
        }
    };

    let Some(file) = file else {
        if !source.is_empty() {
            let span = TextSpan::new(0, source.len());
            tokens.push(Token::new(TokenKind::Unknown, span, source));
            diagnostics.push(SyntaxDiagnostic::new(
                "WS1003",
                "Unexpected character sequence",
                span,
            ));
        }
        tokens.push(Token::new(TokenKind::Eof, TextSpan::empty(source.len()), ""));
        return Lexed {
            tokens,
            diagnostics,
        };
    };

    for pair in file.into_inner() {
        let pest_span = pair.as_span();
        let span = TextSpan::new(pest_span.start(), pest_span.end());
        let text = pair.as_str();

        let kind = match pair.as_rule() {
            Rule::EOI => continue,
            Rule::ws => TokenKind::Whitespace,
            Rule::doc_comment => TokenKind::DocComment,
            Rule::line_comment => TokenKind::LineComment,
            Rule::block_comment => {
                let closed = pair.into_inner().any(|p| p.as_rule() == Rule::block_close);
                if !closed {
                    diagnostics.push(SyntaxDiagnostic::new(
                        "WS1002",
                        "End-of-file found, '*/' expected",
                        span,
                    ));
                }
                TokenKind::BlockComment
            }
            Rule::string | Rule::verbatim_string => {
                let closed = pair.into_inner().any(|p| p.as_rule() == Rule::string_close);
                if !closed {
                    diagnostics.push(SyntaxDiagnostic::new(
                        "WS1002",
                        "Newline in constant",
                        span,
                    ));
                }
                TokenKind::StringLiteral
            }
            Rule::char_lit => {
                let mut closed = false;
                let mut body_len = 0;
                for inner in pair.into_inner() {
                    match inner.as_rule() {
                        Rule::char_close => closed = true,
                        Rule::char_body => body_len = inner.as_str().chars().count(),
                        _ => {}
                    }
                }
                if !closed {
                    diagnostics.push(SyntaxDiagnostic::new(
                        "WS1002",
                        "Newline in constant",
                        span,
                    ));
                } else if body_len == 0 {
                    diagnostics.push(SyntaxDiagnostic::new("WS1004", "Empty character literal", span));
                }
                TokenKind::CharLiteral
            }
            Rule::real => TokenKind::RealLiteral,
            Rule::int => TokenKind::IntLiteral,
            Rule::ident => match Keyword::from_ident(text) {
                Some(keyword) => TokenKind::Keyword(keyword),
                None => TokenKind::Ident,
            },
            Rule::punct => TokenKind::from_punct(text).unwrap_or(TokenKind::Unknown),
            _ => {
                diagnostics.push(SyntaxDiagnostic::new(
                    "WS1003",
                    format!("Unexpected character '{}'", text.escape_debug()),
                    span,
                ));
                TokenKind::Unknown
            }
        };

        tokens.push(Token::new(kind, span, text));
    }

    tokens.push(Token::new(TokenKind::Eof, TextSpan::empty(source.len()), ""));

    Lexed {
        tokens,
        diagnostics,
    }
}

/// Decode the value of a string literal token (escapes resolved, quotes
/// stripped). Verbatim strings only collapse doubled quotes.
pub fn string_value(text: &str) -> String {
    if let Some(body) = text.strip_prefix("@\"") {
        let mut out = String::with_capacity(body.len());
        let mut chars = body.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '"' {
                out.push(c);
            } else if chars.peek() == Some(&'"') {
                chars.next();
                out.push('"');
            } else {
                break;
            }
        }
        return out;
    }
    let body = text.strip_prefix('"').unwrap_or(text);
    decode_until(body, '"')
}

/// Decode a char literal token; `None` when it does not hold exactly one char
pub fn char_value(text: &str) -> Option<char> {
    let body = text.strip_prefix('\'')?;
    let mut chars = decode_until(body, '\'').chars().collect::<Vec<_>>();
    if chars.len() == 1 {
        chars.pop()
    } else {
        None
    }
}

fn decode_until(body: &str, close: char) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == close {
            break;
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
