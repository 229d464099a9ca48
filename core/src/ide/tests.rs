//! Tests for the editor queries

use std::collections::BTreeSet;
use std::sync::Arc;

use maplit::btreeset;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::error::WorkspaceError;
use crate::semantic::{AssemblyCatalog, Compilation, NativeSeverity};
use crate::syntax;

const GENERATED: &str = "GeneratedTypes";
const SCRIPT: &str = "Script";
const CURSOR: &str = "$$";

// ============================================================================
// Helper Functions
// ============================================================================

fn compile(generated: &str, script: &str) -> Compilation {
    let documents = vec![
        (GENERATED.to_string(), Arc::new(syntax::parse(generated))),
        (SCRIPT.to_string(), Arc::new(syntax::parse(script))),
    ];
    Compilation::build(
        &AssemblyCatalog::builtin(),
        &BTreeSet::new(),
        &btreeset! {"System".to_string()},
        documents,
        GENERATED,
        &CancellationToken::new(),
    )
    .expect("compilation is not cancelled")
}

/// Strip the `$$` marker and return the text with the marker's character
/// position
fn marked(script: &str) -> (String, usize) {
    let byte = script.find(CURSOR).expect("cursor marker");
    let position = script[..byte].chars().count();
    (script.replacen(CURSOR, "", 1), position)
}

fn complete_at(generated: &str, script: &str) -> Vec<CompletionCandidate> {
    let (text, position) = marked(script);
    let compilation = compile(generated, &text);
    let candidates = complete(
        &compilation,
        SCRIPT,
        position,
        &CompletionOptions::default(),
        &CancellationToken::new(),
    );
    assert_ok!(candidates)
}

fn labels(candidates: &[CompletionCandidate]) -> Vec<&str> {
    candidates.iter().map(|c| c.label.as_str()).collect()
}

fn hover_at(generated: &str, document: &str, script: &str) -> Option<HoverInfo> {
    let (text, position) = marked(script);
    let (generated, script) = if document == GENERATED {
        (text, String::new())
    } else {
        (generated.to_string(), text)
    };
    let compilation = compile(&generated, &script);
    hover(&compilation, document, position)
}

fn signatures_at(generated: &str, script: &str) -> Option<SignatureResult> {
    let (text, position) = marked(script);
    let compilation = compile(generated, &text);
    signatures(&compilation, SCRIPT, position)
}

fn labels_of(result: &SignatureResult) -> Vec<&str> {
    result.signatures.iter().map(|s| s.label.as_str()).collect()
}

fn format_text(text: &str) -> String {
    format(&syntax::parse(text), &FormatOptions::default())
}

const WORKFLOW: &str = "class Workflow { public int Counter; }";

const OVERLOADS: &str = "public static class Fns
{
    public static int F(int a) => a;
    public static int F(int a, int b) => a + b;
}";

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn test_diagnostics_clean_script_is_empty() {
    let compilation = compile(WORKFLOW, "var next = Workflow.Counter + 1;\nnext");
    assert!(diagnostics(&compilation, SCRIPT).is_empty());
}

#[test]
fn test_diagnostics_use_character_offsets() {
    let compilation = compile("", "var s = \"ééé\";\nvar t = s + foo;\nt");
    let found = diagnostics(&compilation, SCRIPT);

    assert_eq!(found.len(), 1, "{:?}", found);
    assert_eq!(found[0].code, "WS0103");
    assert_eq!(found[0].severity, DiagnosticSeverity::Error);
    assert_eq!((found[0].from, found[0].to), (27, 30));
}

#[test]
fn test_diagnostics_exclude_generated_document() {
    let compilation = compile("class Workflow { public Missing Broken; }", "1");
    assert!(!compilation.diagnostics(GENERATED).is_empty());
    assert!(diagnostics(&compilation, SCRIPT).is_empty());
}

#[test]
fn test_diagnostics_unknown_document_is_empty() {
    let compilation = compile("", "var x = ;");
    assert!(diagnostics(&compilation, "Other").is_empty());
}

#[test]
fn test_severity_mapping() {
    assert_eq!(DiagnosticSeverity::from(NativeSeverity::Error), DiagnosticSeverity::Error);
    assert_eq!(DiagnosticSeverity::from(NativeSeverity::Warning), DiagnosticSeverity::Warning);
    assert_eq!(DiagnosticSeverity::from(NativeSeverity::Info), DiagnosticSeverity::Info);
    assert_eq!(DiagnosticSeverity::from(NativeSeverity::Hidden), DiagnosticSeverity::Hint);
}

#[test]
fn test_unnecessary_using_is_a_hint() {
    let compilation = compile("", "using System;\nvar x = 1;\nx");
    let found = diagnostics(&compilation, SCRIPT);
    let hint = found.iter().find(|d| d.code == "WS8019").expect("unnecessary using");
    assert_eq!(hint.severity, DiagnosticSeverity::Hint);
}

// ============================================================================
// Completion
// ============================================================================

#[test]
fn test_completion_workflow_member_prefix() {
    let candidates = complete_at(WORKFLOW, "Workflow.Cou$$");

    let counter = candidates
        .iter()
        .find(|c| c.label == "Counter")
        .expect("Counter offered");
    assert_eq!(counter.kind, CompletionKind::Field);
    assert_eq!((counter.from, counter.to), (9, 12));
    assert_eq!(counter.description.as_deref(), Some("Counter : public int"));
}

#[test]
fn test_completion_after_dot_lists_only_members() {
    let candidates = complete_at("", "var s = \"text\";\ns.$$");
    let labels = labels(&candidates);

    assert!(labels.contains(&"Length"));
    assert!(labels.contains(&"Substring"));
    assert!(labels.contains(&"ToString"));
    // static members and unrelated names stay out
    assert!(!labels.contains(&"Empty"));
    assert!(!labels.contains(&"s"));
    assert!(!labels.contains(&"var"));
    assert!(!labels.contains(&"Math"));
}

#[test]
fn test_completion_type_receiver_lists_statics() {
    let candidates = complete_at("", "var m = Math.$$");
    let labels = labels(&candidates);

    assert!(labels.contains(&"Max"));
    assert!(labels.contains(&"PI"));
    assert!(!labels.contains(&"ToString"));
}

#[test]
fn test_completion_predefined_type_receiver_lists_statics() {
    let candidates = complete_at("", "var e = string.$$");
    let labels = labels(&candidates);

    assert!(labels.contains(&"Empty"));
    assert!(!labels.contains(&"Length"));
}

#[test]
fn test_completion_groups_overloads() {
    let candidates = complete_at("", "var m = Math.Ma$$");

    assert_eq!(labels(&candidates), vec!["Max"]);
    assert_eq!(candidates[0].kind, CompletionKind::Function);
    assert_eq!(
        candidates[0].description.as_deref(),
        Some("(method) public static Max(int val1, int val2) : int (+ 1 overload)")
    );
}

#[test]
fn test_completion_namespace_receiver() {
    let candidates = complete_at("", "var n = System.$$");
    let labels = labels(&candidates);

    assert!(labels.contains(&"Math"));
    assert!(labels.contains(&"Console"));
}

#[test]
fn test_completion_general_includes_locals_and_keywords() {
    let candidates = complete_at(WORKFLOW, "var count = 1;\nco$$");

    let local = candidates.iter().find(|c| c.label == "count").expect("local offered");
    assert_eq!(local.kind, CompletionKind::Variable);
    assert_eq!(local.description.as_deref(), Some("count : int"));

    let keyword = candidates.iter().find(|c| c.label == "const").expect("keyword offered");
    assert_eq!(keyword.kind, CompletionKind::Other);
    assert_eq!(keyword.description.as_deref(), Some("const keyword"));
}

#[test]
fn test_completion_includes_host_globals() {
    let candidates = complete_at(WORKFLOW, "Wor$$");
    let workflow = candidates
        .iter()
        .find(|c| c.label == "Workflow")
        .expect("global offered");
    assert_eq!(workflow.kind, CompletionKind::Field);
}

#[test]
fn test_completion_skips_locals_declared_later() {
    let candidates = complete_at("", "var a = la$$;\nvar later = 2;");
    assert!(!labels(&candidates).contains(&"later"));
}

#[test]
fn test_completion_camel_humps_rank_after_prefix() {
    let candidates = complete_at("", "var isReady = true;\nvar iR = 1;\niR$$");
    let labels = labels(&candidates);

    let prefix = labels.iter().position(|l| *l == "iR").expect("prefix match");
    let humps = labels.iter().position(|l| *l == "isReady").expect("camel hump match");
    assert!(prefix < humps);
}

#[test]
fn test_completion_suppressed_in_comments_and_literals() {
    assert!(complete_at(WORKFLOW, "// Work$$").is_empty());
    assert!(complete_at(WORKFLOW, "var s = \"Wo$$\";").is_empty());
}

#[test]
fn test_completion_after_punctuation_lists_names_in_scope() {
    let after_paren = complete_at("", "var total = 1;\nvar m = Math.Max($$");
    assert!(labels(&after_paren).contains(&"total"));
    assert!(labels(&after_paren).contains(&"Math"));

    let after_space = complete_at("", "var total = 1;\nvar x = $$");
    assert!(labels(&after_space).contains(&"total"));
    assert!(labels(&after_space).contains(&"Math"));

    let after_operator = complete_at("", "var total = 1;\nvar x = 1 +$$");
    assert!(labels(&after_operator).contains(&"total"));

    let after_comma = complete_at("", "var total = 1;\nvar m = Math.Max(1,$$");
    assert!(labels(&after_comma).contains(&"total"));
}

#[test]
fn test_completion_trigger_classification() {
    assert_eq!(CompletionTrigger::at("Workflow.Cou", 12), CompletionTrigger::Insertion('u'));
    assert_eq!(CompletionTrigger::at("Math.Max(", 9), CompletionTrigger::Insertion('('));
    assert_eq!(CompletionTrigger::at("x.", 2), CompletionTrigger::Invoke);
    assert_eq!(CompletionTrigger::at("", 0), CompletionTrigger::Invoke);
}

#[test]
fn test_completion_inside_number_is_empty() {
    assert!(complete_at("", "var x = (1$$").is_empty());
}

#[test]
fn test_completion_respects_options() {
    let (text, position) = marked("var alpha = 1;\na$$");
    let compilation = compile(WORKFLOW, &text);

    let options = CompletionOptions {
        max_items: 3,
        include_keywords: false,
    };
    let candidates = assert_ok!(complete(
        &compilation,
        SCRIPT,
        position,
        &options,
        &CancellationToken::new()
    ));
    assert_eq!(candidates.len(), 3);
    assert!(candidates
        .iter()
        .all(|c| !c.description.as_deref().unwrap_or_default().ends_with(" keyword")));
}

#[test]
fn test_completion_cancelled() {
    let (text, position) = marked("var alpha = 1;\na$$");
    let compilation = compile(WORKFLOW, &text);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = complete(&compilation, SCRIPT, position, &CompletionOptions::default(), &cancel);
    assert!(matches!(assert_err!(result), WorkspaceError::Cancelled));
}

#[test]
fn test_match_rank() {
    assert_eq!(match_rank("Counter", "cou"), Some(0));
    assert_eq!(match_rank("GetHashCode", "ghc"), Some(1));
    assert_eq!(match_rank("Counter", "unt"), Some(2));
    assert_eq!(match_rank("Counter", "xyz"), None);
    assert_eq!(match_rank("Ärger", "är"), Some(0));
}

// ============================================================================
// Hover
// ============================================================================

#[test]
fn test_hover_local_before_dot() {
    let info = hover_at("", SCRIPT, "var x = 5; x$$.").expect("hover info");
    assert_eq!(info.text, "int");
    assert_eq!((info.from, info.to), (11, 12));
}

#[test]
fn test_hover_declarator_uses_initializer_type() {
    let info = hover_at("", SCRIPT, "var to$$tal = 1.5;").expect("hover info");
    assert_eq!(info.text, "double");
    assert_eq!((info.from, info.to), (4, 15));
}

#[test]
fn test_hover_method_describes_overload() {
    let info = hover_at("", SCRIPT, "var m = Math.Ma$$x(1, 2);").expect("hover info");
    assert_eq!(info.text, "(method) public static Max(int val1, int val2) : int");
}

#[test]
fn test_hover_property_declaration() {
    let info = hover_at(
        "",
        GENERATED,
        "class Variables { public decimal Amo$$unt { get; set; } }",
    )
    .expect("hover info");
    assert_eq!(info.text, "decimal");
}

#[test]
fn test_hover_parameter_declaration() {
    let info = hover_at("", SCRIPT, "int Twice(int va$$lue) => value * 2;").expect("hover info");
    assert_eq!(info.text, "int");
}

#[test]
fn test_hover_member_of_global() {
    let info = hover_at(WORKFLOW, SCRIPT, "var c = Workflow.Coun$$ter;").expect("hover info");
    assert_eq!(info.text, "int");
    assert_eq!((info.from, info.to), (17, 24));
}

#[test]
fn test_hover_nothing_on_whitespace_or_keywords() {
    assert!(hover_at("", SCRIPT, "var x = 5;  $$ ").is_none());
    assert!(hover_at("", SCRIPT, "re$$turn;").is_none());
}

// ============================================================================
// Signature Help
// ============================================================================

#[test]
fn test_signatures_prefer_closest_arity_on_tie() {
    let result = signatures_at(OVERLOADS, "var r = Fns.F(1$$);").expect("signature help");

    assert_eq!(labels_of(&result), vec!["int Fns.F(int a)", "int Fns.F(int a, int b)"]);
    assert_eq!(result.active_signature, Some(0));
    assert_eq!(result.active_parameter, 0);
    assert_eq!(result.signatures[1].parameters, vec!["int a", "int b"]);
}

#[test]
fn test_signatures_disqualify_short_overloads() {
    let result = signatures_at(OVERLOADS, "var r = Fns.F(1, $$").expect("signature help");
    assert_eq!(result.active_signature, Some(1));
    assert_eq!(result.active_parameter, 1);
}

#[test]
fn test_signatures_exact_types_win() {
    let result = signatures_at("", "var m = Math.Max(1.5, $$").expect("signature help");

    assert_eq!(
        labels_of(&result),
        vec![
            "int Math.Max(int val1, int val2)",
            "double Math.Max(double val1, double val2)"
        ]
    );
    assert_eq!(result.active_signature, Some(1));
    assert_eq!(
        result.signatures[1].documentation.as_deref(),
        Some("Returns the larger of two double-precision floating-point numbers.")
    );
}

#[test]
fn test_signatures_active_parameter_counts_preceding_separators() {
    let result = signatures_at("", "var m = Math.Max(1,$$ 2);").expect("signature help");
    assert_eq!(result.active_parameter, 1);

    let result = signatures_at("", "var m = Math.Max(1$$, 2);").expect("signature help");
    assert_eq!(result.active_parameter, 0);
}

#[test]
fn test_signatures_for_object_creation() {
    let result = signatures_at("", "var d = new DateTime(2024, $$").expect("signature help");

    assert_eq!(labels_of(&result), vec!["DateTime()", "DateTime(int year, int month, int day)"]);
    assert_eq!(result.active_signature, Some(1));
}

#[test]
fn test_signatures_for_local_function() {
    let result = signatures_at("", "int Twice(int value) => value * 2;\nvar t = Twice($$").expect("signature help");
    assert_eq!(labels_of(&result), vec!["int Twice(int value)"]);
    assert_eq!(result.active_signature, Some(0));
}

#[test]
fn test_signatures_innermost_call_wins() {
    let result = signatures_at("", "var m = Math.Max(Math.Abs($$), 2);").expect("signature help");
    assert!(labels_of(&result).iter().all(|l| l.contains("Abs")));
}

#[test]
fn test_signatures_outside_call_is_none() {
    assert!(signatures_at("", "var x = 1;$$").is_none());
    assert!(signatures_at("", "var m = Math.Max(1, 2);$$").is_none());
}

#[test]
fn test_signatures_unknown_method_is_empty() {
    let result = signatures_at("", "Math.Nope($$").expect("signature help");
    assert!(result.signatures.is_empty());
    assert_eq!(result.active_signature, None);
}

// ============================================================================
// Formatting
// ============================================================================

#[test]
fn test_format_statements_and_blocks() {
    assert_eq!(
        format_text("var x=1;if(x>0){x++;}else{x=-x;}"),
        "var x = 1;\nif (x > 0)\n{\n    x++;\n}\nelse\n{\n    x = -x;\n}\n"
    );
}

#[test]
fn test_format_accessors_and_enums() {
    assert_eq!(
        format_text("class A{public int? X{get;set;}=null;public int[] Items;}"),
        "class A\n{\n    public int? X { get; set; } = null;\n    public int[] Items;\n}\n"
    );
    assert_eq!(
        format_text("enum Color{Red,Green=2}"),
        "enum Color\n{\n    Red,\n    Green = 2\n}\n"
    );
}

#[test]
fn test_format_keeps_comments_and_collapses_blank_lines() {
    assert_eq!(
        format_text("x = 1; // one\n\n\n\n// two\ny = 2;"),
        "x = 1; // one\n\n// two\ny = 2;\n"
    );
}

#[test]
fn test_format_attributes_on_their_own_line() {
    assert_eq!(
        format_text("class V{[Description(\"Total\")] public decimal Amount{get;set;}}"),
        "class V\n{\n    [Description(\"Total\")]\n    public decimal Amount { get; set; }\n}\n"
    );
}

#[test]
fn test_format_is_idempotent() {
    let source = "using System;
// leading comment
class Calc{
  /// Adds.
  public static int Add(int a,int b){return a+b;} // trailing


  public int? Value{get;set;}=null;
  public int[] Items;
}
enum Color{Red,Green=2}
var c=new Calc();
if(c.Value==null&&!false){c.Value=-1;}else{c.Value++;}
/* done */";
    let once = format_text(source);
    assert_ne!(once, source);
    assert_eq!(format_text(&once), once);

    assert!(once.contains("    public static int Add(int a, int b)\n    {\n        return a + b;\n    } // trailing\n\n    public int? Value"));
    assert!(once.contains("if (c.Value == null && !false)"));
    assert!(once.contains("c.Value = -1;"));
    assert!(once.ends_with("/* done */\n"));
}

#[test]
fn test_format_leaves_broken_text_alone() {
    let source = "class {";
    assert_eq!(format_text(source), source);
}

#[test]
fn test_format_empty_text() {
    assert_eq!(format_text(""), "");
}

#[test]
fn test_format_indent_size() {
    let options = FormatOptions { indent_size: 2 };
    assert_eq!(
        format(&syntax::parse("if(true){return;}"), &options),
        "if (true)\n{\n  return;\n}\n"
    );
}
