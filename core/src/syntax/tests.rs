//! Tests for the lexer, parser and position helpers

use super::finder::{enclosing_call, member_access_at_dot, node_path, NodeRef};
use super::*;

// ============================================================================
// Helper Functions
// ============================================================================

fn kinds(source: &str) -> Vec<TokenKind> {
    lexer::lex(source)
        .tokens
        .into_iter()
        .map(|t| t.kind)
        .filter(|k| !k.is_trivia())
        .collect()
}

fn statements(tree: &SyntaxTree) -> Vec<&Stmt> {
    tree.root
        .items
        .iter()
        .filter_map(|item| match item {
            Item::Statement(stmt) => Some(stmt),
            _ => None,
        })
        .collect()
}

fn codes(tree: &SyntaxTree) -> Vec<&'static str> {
    tree.diagnostics.iter().map(|d| d.code).collect()
}

fn tree_depth(tree: &SyntaxTree) -> usize {
    let mut deepest = 0;
    finder::walk(&tree.root, &mut |_, depth| deepest = deepest.max(depth));
    deepest
}

// ============================================================================
// Lexer Tests
// ============================================================================

#[test]
fn test_lex_keywords_and_punctuation() {
    assert_eq!(
        kinds("var x = a ?? b;"),
        vec![
            TokenKind::Keyword(Keyword::Var),
            TokenKind::Ident,
            TokenKind::Eq,
            TokenKind::Ident,
            TokenKind::QuestionQuestion,
            TokenKind::Ident,
            TokenKind::Semi,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_lex_literals() {
    assert_eq!(
        kinds(r#"1 2L 1.5 2f "s" @"v""q" 'c'"#),
        vec![
            TokenKind::IntLiteral,
            TokenKind::IntLiteral,
            TokenKind::RealLiteral,
            TokenKind::RealLiteral,
            TokenKind::StringLiteral,
            TokenKind::StringLiteral,
            TokenKind::CharLiteral,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_lex_keeps_trivia_spans_contiguous() {
    let source = "int a; // note\n/* block */ a";
    let lexed = lexer::lex(source);
    let mut end = 0;
    for token in &lexed.tokens {
        assert_eq!(token.span.start, end, "gap before {:?}", token);
        end = token.span.end;
    }
    assert_eq!(end, source.len());
    assert!(lexed
        .tokens
        .iter()
        .any(|t| t.kind == TokenKind::LineComment && t.text == "// note"));
}

#[test]
fn test_lex_unterminated_string_reports() {
    let lexed = lexer::lex("var s = \"abc");
    assert!(lexed.diagnostics.iter().any(|d| d.code == "WS1002"));
}

#[test]
fn test_lex_unknown_character_reports() {
    let lexed = lexer::lex("var s = #;");
    assert!(lexed.diagnostics.iter().any(|d| d.code == "WS1003"));
}

#[test]
fn test_string_values() {
    assert_eq!(lexer::string_value(r#""a\tb\"c""#), "a\tb\"c");
    assert_eq!(lexer::string_value(r#"@"x""y""#), "x\"y");
    assert_eq!(lexer::char_value(r"'\n'"), Some('\n'));
    assert_eq!(lexer::char_value("''"), None);
}

// ============================================================================
// Parser Tests
// ============================================================================

#[test]
fn test_parse_class_members() {
    let tree = parse(
        r#"
/// The workflow
public class Workflow
{
    public int Counter;
    public string Name { get; set; } = "x";
    public static int Twice(int value) => value * 2;
    public Workflow(int start) { Counter = start; }
}
"#,
    );
    assert!(tree.diagnostics.is_empty(), "{:?}", tree.diagnostics);

    let Item::Type(TypeDecl::Class(class)) = &tree.root.items[0] else {
        panic!("expected a class");
    };
    assert_eq!(class.name.name, "Workflow");
    assert_eq!(class.doc.as_deref(), Some("The workflow"));
    assert_eq!(class.members.len(), 4);
    assert!(matches!(class.members[0], MemberDecl::Field(_)));
    assert!(matches!(&class.members[1], MemberDecl::Property(p) if p.has_get && p.has_set && p.init.is_some()));
    assert!(matches!(&class.members[2], MemberDecl::Method(m) if m.modifiers.is_static));
    assert!(matches!(class.members[3], MemberDecl::Constructor(_)));
}

#[test]
fn test_parse_namespace_and_enum() {
    let tree = parse("namespace A.B { enum Color { Red, Green = 2, } }");
    assert!(tree.diagnostics.is_empty(), "{:?}", tree.diagnostics);
    let Item::Namespace(ns) = &tree.root.items[0] else {
        panic!("expected a namespace");
    };
    assert_eq!(ns.name.dotted(), "A.B");
    let TypeDecl::Enum(color) = &ns.types[0] else {
        panic!("expected an enum");
    };
    assert_eq!(color.variants.len(), 2);
}

#[test]
fn test_parse_script_statements() {
    let tree = parse(
        r#"
using System;
var total = 0;
int Add(int a, int b) => a + b;
if (total > 1) { total += Add(1, 2); } else total--;
while (total < 10) total++;
total
"#,
    );
    assert!(tree.diagnostics.is_empty(), "{:?}", tree.diagnostics);
    assert_eq!(tree.root.usings.len(), 1);

    let stmts = statements(&tree);
    assert!(matches!(stmts[0].kind, StmtKind::Local(_)));
    assert!(matches!(stmts[1].kind, StmtKind::LocalFunction(_)));
    assert!(matches!(stmts[2].kind, StmtKind::If { .. }));
    assert!(matches!(stmts[3].kind, StmtKind::While { .. }));
    assert!(matches!(
        stmts[4].kind,
        StmtKind::Expr {
            has_semicolon: false,
            ..
        }
    ));
}

#[test]
fn test_parse_precedence() {
    let tree = parse("var r = 1 + 2 * 3 == 7 && !done;");
    let stmts = statements(&tree);
    let StmtKind::Local(local) = &stmts[0].kind else {
        panic!("expected a local");
    };
    let Some(init) = &local.declarators[0].init else {
        panic!("expected an initializer");
    };
    let ExprKind::Binary { op, lhs, .. } = &init.kind else {
        panic!("expected a binary expression");
    };
    assert_eq!(*op, BinaryOp::And);
    assert!(matches!(&lhs.kind, ExprKind::Binary { op: BinaryOp::Eq, .. }));
}

#[test]
fn test_parse_nullable_declaration_vs_conditional() {
    let tree = parse("int? a = null; var b = c ? d : e;");
    let stmts = statements(&tree);
    let StmtKind::Local(first) = &stmts[0].kind else {
        panic!("expected a local");
    };
    assert!(matches!(first.ty.kind, TypeRefKind::Nullable(_)));
    let StmtKind::Local(second) = &stmts[1].kind else {
        panic!("expected a local");
    };
    assert!(matches!(
        second.declarators[0].init.as_ref().map(|e| &e.kind),
        Some(ExprKind::Conditional { .. })
    ));
}

// ============================================================================
// Recovery Tests
// ============================================================================

#[test]
fn test_recover_trailing_dot() {
    let tree = parse("var x = 5; x.");
    assert_eq!(codes(&tree), vec!["WS1001"]);

    let dot = tree
        .significant_tokens()
        .find(|t| t.kind == TokenKind::Dot)
        .map(|t| t.span)
        .expect("dot token");
    let member = member_access_at_dot(&tree.root, dot).expect("member access");
    let ExprKind::Member { name, .. } = &member.kind else {
        panic!("expected member access");
    };
    assert!(name.is_missing());
}

#[test]
fn test_recover_missing_semicolon_in_block() {
    let tree = parse("if (a) { b = 1 }\nvar c = 2;");
    assert!(tree.diagnostics.iter().any(|d| d.message == "';' expected"));
    assert_eq!(statements(&tree).len(), 2);
}

#[test]
fn test_recover_garbage_terminates() {
    let tree = parse(") ] } ; class { ( ");
    assert!(tree.has_errors());
}

#[test]
fn test_recover_unclosed_call_contains_trailing_space() {
    let source = "Math.Max(1, ";
    let tree = parse(source);
    let call = enclosing_call(&tree.root, source.len()).expect("call");
    assert!(matches!(
        call,
        NodeRef::Expr(Expr {
            kind: ExprKind::Invoke { .. },
            ..
        })
    ));
}

// ============================================================================
// Nesting Limit Tests
// ============================================================================

#[test]
fn test_moderate_nesting_parses_cleanly() {
    let source = format!("var x = {}1{};", "(".repeat(100), ")".repeat(100));
    let tree = parse(&source);
    assert!(tree.diagnostics.is_empty(), "{:?}", tree.diagnostics);
}

#[test]
fn test_deep_parentheses_are_cut_off() {
    let source = format!("var x = {}1{}; var y = 2;", "(".repeat(400), ")".repeat(400));
    let tree = parse(&source);

    assert_eq!(codes(&tree), vec!["WS1005"]);
    assert_eq!(statements(&tree).len(), 2);
    assert!(tree_depth(&tree) <= 2 * parser::MAX_NESTING);
}

#[test]
fn test_long_operator_chain_is_cut_off() {
    let source = format!("var x = 1{}; var y = 2;", " + 1".repeat(5000));
    let tree = parse(&source);

    assert_eq!(codes(&tree), vec!["WS1005"]);
    assert_eq!(statements(&tree).len(), 2);
    assert!(tree_depth(&tree) <= 2 * parser::MAX_NESTING);
}

#[test]
fn test_deep_unary_and_member_chains_are_cut_off() {
    let unary = parse(&format!("var b = {}true;", "!".repeat(5000)));
    assert_eq!(codes(&unary), vec!["WS1005"]);
    assert!(tree_depth(&unary) <= 2 * parser::MAX_NESTING);

    let members = parse(&format!("var n = s{};", ".Length".repeat(5000)));
    assert_eq!(codes(&members), vec!["WS1005"]);
    assert!(tree_depth(&members) <= 2 * parser::MAX_NESTING);
}

#[test]
fn test_deep_blocks_are_cut_off() {
    let source = format!("{}x = 1;{}", "{".repeat(5000), "}".repeat(5000));
    let tree = parse(&source);

    assert!(codes(&tree).contains(&"WS1005"));
    assert!(tree_depth(&tree) <= 2 * parser::MAX_NESTING + 4);
}

#[test]
fn test_deep_type_suffixes_are_cut_off() {
    let source = format!("int{} a;", "[]".repeat(500));
    let tree = parse(&source);

    assert_eq!(codes(&tree), vec!["WS1005"]);
    assert!(tree_depth(&tree) <= 2 * parser::MAX_NESTING);
}

// ============================================================================
// Position Tests
// ============================================================================

#[test]
fn test_token_at_prefers_word_before_dot() {
    let tree = parse("var x = 5; x.");
    let offset = "var x = 5; x".len();
    let token = tree.token_at(offset).expect("token");
    assert_eq!(token.text, "x");
}

#[test]
fn test_node_path_reaches_declarator() {
    let source = "var total = 1;";
    let tree = parse(source);
    let token = tree.token_at(5).expect("token");
    let path = node_path(&tree.root, token.span);
    assert!(matches!(path.last(), Some(NodeRef::Declarator(_))));
}

#[test]
fn test_in_comment_or_literal() {
    let source = "var s = \"abc\"; // done";
    let tree = parse(source);
    assert!(tree.in_comment_or_literal(10));
    assert!(!tree.in_comment_or_literal(14));
    assert!(tree.in_comment_or_literal(source.len()));
}
