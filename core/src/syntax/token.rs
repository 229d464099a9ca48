//! Token types produced by the lexer

use serde::{Deserialize, Serialize};

use super::ast::PredefinedType;

/// Half-open byte range `[start, end)` into a document's text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

impl TextSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Zero-width span at `offset`
    pub fn empty(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// `start <= offset < end`
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// `start <= offset <= end`, used where a cursor sitting right after a
    /// construct still counts as "on" it
    pub fn touches(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }

    pub fn covers(&self, other: TextSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Smallest span covering both
    pub fn merge(&self, other: TextSpan) -> TextSpan {
        TextSpan {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Reserved words of the script language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Using,
    Namespace,
    Class,
    Struct,
    Enum,
    Public,
    Private,
    Protected,
    Internal,
    Static,
    Readonly,
    Const,
    Var,
    New,
    Return,
    If,
    Else,
    While,
    Break,
    Continue,
    True,
    False,
    Null,
    This,
    Typeof,
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

impl Keyword {
    pub const ALL: &'static [Keyword] = &[
        Keyword::Using,
        Keyword::Namespace,
        Keyword::Class,
        Keyword::Struct,
        Keyword::Enum,
        Keyword::Public,
        Keyword::Private,
        Keyword::Protected,
        Keyword::Internal,
        Keyword::Static,
        Keyword::Readonly,
        Keyword::Const,
        Keyword::Var,
        Keyword::New,
        Keyword::Return,
        Keyword::If,
        Keyword::Else,
        Keyword::While,
        Keyword::Break,
        Keyword::Continue,
        Keyword::True,
        Keyword::False,
        Keyword::Null,
        Keyword::This,
        Keyword::Typeof,
        Keyword::Void,
        Keyword::Int,
        Keyword::Long,
        Keyword::Float,
        Keyword::Double,
        Keyword::Decimal,
        Keyword::Bool,
        Keyword::String,
        Keyword::Char,
        Keyword::Object,
    ];

    pub fn from_ident(text: &str) -> Option<Keyword> {
        Keyword::ALL.iter().copied().find(|k| k.as_str() == text)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Using => "using",
            Keyword::Namespace => "namespace",
            Keyword::Class => "class",
            Keyword::Struct => "struct",
            Keyword::Enum => "enum",
            Keyword::Public => "public",
            Keyword::Private => "private",
            Keyword::Protected => "protected",
            Keyword::Internal => "internal",
            Keyword::Static => "static",
            Keyword::Readonly => "readonly",
            Keyword::Const => "const",
            Keyword::Var => "var",
            Keyword::New => "new",
            Keyword::Return => "return",
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::Null => "null",
            Keyword::This => "this",
            Keyword::Typeof => "typeof",
            Keyword::Void => "void",
            Keyword::Int => "int",
            Keyword::Long => "long",
            Keyword::Float => "float",
            Keyword::Double => "double",
            Keyword::Decimal => "decimal",
            Keyword::Bool => "bool",
            Keyword::String => "string",
            Keyword::Char => "char",
            Keyword::Object => "object",
        }
    }

    /// The predefined type this keyword names, if any
    pub fn predefined_type(self) -> Option<PredefinedType> {
        match self {
            Keyword::Void => Some(PredefinedType::Void),
            Keyword::Int => Some(PredefinedType::Int),
            Keyword::Long => Some(PredefinedType::Long),
            Keyword::Float => Some(PredefinedType::Float),
            Keyword::Double => Some(PredefinedType::Double),
            Keyword::Decimal => Some(PredefinedType::Decimal),
            Keyword::Bool => Some(PredefinedType::Bool),
            Keyword::String => Some(PredefinedType::String),
            Keyword::Char => Some(PredefinedType::Char),
            Keyword::Object => Some(PredefinedType::Object),
            _ => None,
        }
    }

    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            Keyword::Public
                | Keyword::Private
                | Keyword::Protected
                | Keyword::Internal
                | Keyword::Static
                | Keyword::Readonly
                | Keyword::Const
        )
    }

    /// Keywords that read as statement heads and want a space before `(`
    pub fn is_control_flow(self) -> bool {
        matches!(self, Keyword::If | Keyword::While | Keyword::Return)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // trivia
    Whitespace,
    LineComment,
    DocComment,
    BlockComment,

    Ident,
    Keyword(Keyword),
    IntLiteral,
    RealLiteral,
    StringLiteral,
    CharLiteral,

    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Dot,
    Colon,
    Question,
    QuestionQuestion,
    Eq,
    EqEq,
    BangEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    AmpAmp,
    PipePipe,
    Amp,
    Pipe,
    PlusPlus,
    MinusMinus,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    FatArrow,

    Unknown,
    Eof,
}

impl TokenKind {
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace
                | TokenKind::LineComment
                | TokenKind::DocComment
                | TokenKind::BlockComment
        )
    }

    pub fn is_comment(self) -> bool {
        matches!(
            self,
            TokenKind::LineComment | TokenKind::DocComment | TokenKind::BlockComment
        )
    }

    /// Identifiers, keywords and literals: tokens a cursor can be "on"
    pub fn is_word(self) -> bool {
        matches!(
            self,
            TokenKind::Ident
                | TokenKind::Keyword(_)
                | TokenKind::IntLiteral
                | TokenKind::RealLiteral
                | TokenKind::StringLiteral
                | TokenKind::CharLiteral
        )
    }

    pub fn is_literal(self) -> bool {
        matches!(
            self,
            TokenKind::IntLiteral
                | TokenKind::RealLiteral
                | TokenKind::StringLiteral
                | TokenKind::CharLiteral
        )
    }

    pub fn from_punct(text: &str) -> Option<TokenKind> {
        let kind = match text {
            "{" => TokenKind::LBrace,
            "}" => TokenKind::RBrace,
            "(" => TokenKind::LParen,
            ")" => TokenKind::RParen,
            "[" => TokenKind::LBracket,
            "]" => TokenKind::RBracket,
            ";" => TokenKind::Semi,
            "," => TokenKind::Comma,
            "." => TokenKind::Dot,
            ":" => TokenKind::Colon,
            "?" => TokenKind::Question,
            "??" => TokenKind::QuestionQuestion,
            "=" => TokenKind::Eq,
            "==" => TokenKind::EqEq,
            "!=" => TokenKind::BangEq,
            "<" => TokenKind::Lt,
            "<=" => TokenKind::LtEq,
            ">" => TokenKind::Gt,
            ">=" => TokenKind::GtEq,
            "+" => TokenKind::Plus,
            "-" => TokenKind::Minus,
            "*" => TokenKind::Star,
            "/" => TokenKind::Slash,
            "%" => TokenKind::Percent,
            "!" => TokenKind::Bang,
            "&&" => TokenKind::AmpAmp,
            "||" => TokenKind::PipePipe,
            "&" => TokenKind::Amp,
            "|" => TokenKind::Pipe,
            "++" => TokenKind::PlusPlus,
            "--" => TokenKind::MinusMinus,
            "+=" => TokenKind::PlusEq,
            "-=" => TokenKind::MinusEq,
            "*=" => TokenKind::StarEq,
            "/=" => TokenKind::SlashEq,
            "=>" => TokenKind::FatArrow,
            _ => return None,
        };
        Some(kind)
    }

    /// Human readable form used in "`x` expected" messages
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Whitespace => "whitespace",
            TokenKind::LineComment | TokenKind::DocComment | TokenKind::BlockComment => "comment",
            TokenKind::Ident => "identifier",
            TokenKind::Keyword(k) => k.as_str(),
            TokenKind::IntLiteral | TokenKind::RealLiteral => "number",
            TokenKind::StringLiteral => "string",
            TokenKind::CharLiteral => "character",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Semi => ";",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::Question => "?",
            TokenKind::QuestionQuestion => "??",
            TokenKind::Eq => "=",
            TokenKind::EqEq => "==",
            TokenKind::BangEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Bang => "!",
            TokenKind::AmpAmp => "&&",
            TokenKind::PipePipe => "||",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::SlashEq => "/=",
            TokenKind::FatArrow => "=>",
            TokenKind::Unknown => "unknown character",
            TokenKind::Eof => "end of file",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: TextSpan,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, span: TextSpan, text: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            text: text.into(),
        }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }
}
