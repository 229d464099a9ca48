//! Tests for declaration collection, binding and the analysis rules

use std::collections::BTreeSet;
use std::sync::Arc;

use maplit::btreeset;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::error::WorkspaceError;
use crate::syntax;

const GENERATED: &str = "GeneratedTypes";
const SCRIPT: &str = "Script";

// ============================================================================
// Helper Functions
// ============================================================================

fn compile_full(assemblies: BTreeSet<String>, generated: &str, script: &str) -> Compilation {
    let documents = vec![
        (GENERATED.to_string(), Arc::new(syntax::parse(generated))),
        (SCRIPT.to_string(), Arc::new(syntax::parse(script))),
    ];
    Compilation::build(
        &AssemblyCatalog::builtin(),
        &assemblies,
        &btreeset! {"System".to_string()},
        documents,
        GENERATED,
        &CancellationToken::new(),
    )
    .expect("compilation is not cancelled")
}

fn compile(script: &str) -> Compilation {
    compile_full(BTreeSet::new(), "", script)
}

fn codes(compilation: &Compilation) -> Vec<&'static str> {
    compilation.diagnostics(SCRIPT).iter().map(|d| d.code).collect()
}

fn errors(compilation: &Compilation) -> Vec<SemanticDiagnostic> {
    compilation
        .diagnostics(SCRIPT)
        .into_iter()
        .filter(|d| d.severity == NativeSeverity::Error)
        .collect()
}

fn local_type(compilation: &Compilation, name: &str) -> String {
    let document = compilation.document(SCRIPT).expect("script document");
    let local = document
        .model
        .locals
        .iter()
        .find(|l| l.name == name)
        .expect("local declared");
    display::ty(&compilation.decls, &local.ty)
}

// ============================================================================
// Clean Scripts
// ============================================================================

#[test]
fn test_clean_script_has_no_diagnostics() {
    let compilation = compile("var x = 5;\nvar y = x + 1;\ny");
    assert!(codes(&compilation).is_empty(), "{:?}", compilation.diagnostics(SCRIPT));
}

#[test]
fn test_qualified_library_call() {
    let compilation = compile("var t = System.Math.Abs(-1);\nt");
    assert!(codes(&compilation).is_empty());
    assert_eq!(local_type(&compilation, "t"), "int");
}

#[test]
fn test_overload_resolution_prefers_exact_match() {
    let compilation = compile("var a = Math.Max(1, 2);\nvar b = Math.Max(1.5, 2);\nConsole.WriteLine(a + b);");
    assert!(codes(&compilation).is_empty());
    assert_eq!(local_type(&compilation, "a"), "int");
    assert_eq!(local_type(&compilation, "b"), "double");
}

#[test]
fn test_local_function_callable_before_declaration() {
    let compilation = compile("var v = Twice(2);\nint Twice(int x) => x * 2;");
    assert!(codes(&compilation).is_empty());
    assert_eq!(local_type(&compilation, "v"), "int");
}

#[test]
fn test_object_members_are_inherited() {
    let compilation = compile("var n = 5;\nvar s = n.ToString();\nvar f = n.ToString(\"N2\");");
    assert!(codes(&compilation).is_empty());
    assert_eq!(local_type(&compilation, "s"), "string");
}

#[test]
fn test_string_concatenation_and_nullable_coalesce() {
    let compilation = compile("int? maybe = null;\nvar total = maybe ?? 3;\nvar text = \"n=\" + total;");
    assert!(codes(&compilation).is_empty());
    assert_eq!(local_type(&compilation, "total"), "int");
    assert_eq!(local_type(&compilation, "text"), "string");
}

// ============================================================================
// Host Globals
// ============================================================================

#[test]
fn test_generated_classes_are_host_globals() {
    let compilation = compile_full(
        BTreeSet::new(),
        "public class Workflow { public int Counter; public static string Name; }",
        "Workflow.Counter + Workflow.Name.Length",
    );
    assert!(codes(&compilation).is_empty());
}

#[test]
fn test_generated_document_diagnostics_stay_there() {
    let compilation = compile_full(BTreeSet::new(), "public class Broken { Missing Field; }", "1");
    assert!(codes(&compilation).is_empty());
    assert!(!compilation.diagnostics(GENERATED).is_empty());
}

// ============================================================================
// Name and Member Errors
// ============================================================================

#[test]
fn test_undefined_name() {
    let compilation = compile("var x = foo;");
    assert_eq!(codes(&compilation), vec!["WS0103"]);
    assert_eq!(
        compilation.diagnostics(SCRIPT)[0].message,
        "The name 'foo' does not exist in the current context"
    );
}

#[test]
fn test_missing_member() {
    let compilation = compile("var s = \"abc\";\nvar n = s.Lenght;");
    assert_eq!(codes(&compilation), vec!["WS0117"]);
    assert_eq!(
        compilation.diagnostics(SCRIPT)[0].message,
        "'string' does not contain a definition for 'Lenght'"
    );
}

#[test]
fn test_static_and_instance_access() {
    let compilation = compile("var s = \"x\";\nvar e = s.Empty;\nvar n = String.Length;");
    assert_eq!(codes(&compilation), vec!["WS0176", "WS0120"]);
}

#[test]
fn test_inaccessible_member() {
    let compilation = compile_full(
        BTreeSet::new(),
        "public class Box { private int secret; public int Visible; }",
        "var b = new Box();\nvar v = b.Visible;\nvar s = b.secret;",
    );
    assert_eq!(codes(&compilation), vec!["WS0122"]);
}

#[test]
fn test_unknown_type() {
    let compilation = compile("Widget w = null;");
    assert_eq!(codes(&compilation), vec!["WS0246"]);
}

#[test]
fn test_type_used_as_value() {
    let compilation = compile("var m = Math;");
    assert_eq!(codes(&compilation), vec!["WS0119"]);
}

#[test]
fn test_non_invocable() {
    let compilation = compile("var q = 5;\nq();");
    assert_eq!(codes(&compilation), vec!["WS0149"]);
}

// ============================================================================
// Type Errors
// ============================================================================

#[test]
fn test_invalid_conversion() {
    let compilation = compile("int x = \"a\";");
    let errors = errors(&compilation);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, "WS0029");
    assert_eq!(errors[0].message, "Cannot implicitly convert type 'string' to 'int'");
}

#[test]
fn test_argument_count_and_type() {
    let compilation = compile("Math.Abs(1, 2);\nvar m = Math.Max(\"a\", 1);");
    assert_eq!(codes(&compilation), vec!["WS1501", "WS1503"]);
    let diagnostics = compilation.diagnostics(SCRIPT);
    assert_eq!(
        diagnostics[1].message,
        "Argument 1: cannot convert from 'string' to 'int'"
    );
}

#[test]
fn test_invalid_operator() {
    let compilation = compile("var z = true + 1;");
    assert_eq!(codes(&compilation), vec!["WS0019"]);
}

#[test]
fn test_non_boolean_condition() {
    let compilation = compile("if (1) { }");
    assert_eq!(codes(&compilation), vec!["WS0029"]);
}

#[test]
fn test_assignment_to_constant() {
    let compilation = compile("const int k = 1;\nk = 2;");
    assert_eq!(codes(&compilation), vec!["WS0131"]);
}

#[test]
fn test_expression_statement_must_have_effect() {
    let compilation = compile("var a = 1;\na + 1;\na");
    assert_eq!(codes(&compilation), vec!["WS0201"]);
}

#[test]
fn test_constructor_arguments() {
    let compilation = compile_full(
        btreeset! {"System.Text.RegularExpressions".to_string()},
        "",
        "using System.Text.RegularExpressions;\nvar ok = new Regex(\"a+\");\nvar bad = new Regex(1, 2);",
    );
    assert_eq!(codes(&compilation), vec!["WS1729"]);
}

// ============================================================================
// Locals
// ============================================================================

#[test]
fn test_duplicate_local() {
    let compilation = compile("var a = 1;\nvar a = 2;");
    assert_eq!(codes(&compilation), vec!["WS0128"]);
}

#[test]
fn test_use_before_declaration() {
    let compilation = compile("{\n    var b = a;\n    var a = 1;\n    Console.WriteLine(b);\n}");
    assert!(codes(&compilation).contains(&"WS0841"));
}

#[test]
fn test_implicitly_typed_locals() {
    let compilation = compile("var n = null;\nvar m;");
    assert_eq!(codes(&compilation), vec!["WS0815", "WS0818"]);
}

// ============================================================================
// Members and Control Flow
// ============================================================================

#[test]
fn test_return_checks() {
    let source = r#"
class Helper
{
    public static int Twice(int x) { return; }
    public static void Log(string m) { return m; }
    public static int Sign(int x) { if (x > 0) { return 1; } }
    public static int Abs(int x) { if (x < 0) { return -x; } else { return x; } }
}
"#;
    let compilation = compile(source);
    assert_eq!(codes(&compilation), vec!["WS0126", "WS0127", "WS0161"]);
}

#[test]
fn test_static_context() {
    let source = r#"
class Counter
{
    int count;
    static void Reset() { count = 0; }
    static Counter Current() { return this; }
    void Bump() { count = count + 1; }
}
"#;
    let compilation = compile(source);
    assert_eq!(codes(&compilation), vec!["WS0120", "WS0026"]);
}

#[test]
fn test_break_outside_loop() {
    let compilation = compile("var i = 0;\nwhile (i < 3) { i += 1; if (i == 2) { break; } }\nbreak;");
    assert_eq!(codes(&compilation), vec!["WS0139"]);
}

// ============================================================================
// Rule Tests
// ============================================================================

#[test]
fn test_unused_and_unreachable() {
    let source = r#"
class Helper
{
    public static int F()
    {
        int unused = 1;
        return 2;
        var after = 3;
    }
}
"#;
    let compilation = compile(source);
    let diagnostics = compilation.diagnostics(SCRIPT);
    assert_eq!(codes(&compilation), vec!["WS0168", "WS0162", "WS0168"]);
    assert!(diagnostics
        .iter()
        .all(|d| d.severity == NativeSeverity::Warning));
    assert_eq!(diagnostics[0].message, "The variable 'unused' is declared but never used");
}

#[test]
fn test_script_level_locals_are_not_unused() {
    let compilation = compile("var kept = 1;\n{ var inner = 2; }");
    assert_eq!(codes(&compilation), vec!["WS0168"]);
    assert!(compilation.diagnostics(SCRIPT)[0].message.contains("inner"));
}

#[test]
fn test_unnecessary_using_is_hidden() {
    let json = btreeset! {"System.Text.Json".to_string()};
    let unused = compile_full(json.clone(), "", "using System.Text.Json;\nvar x = 1;");
    let diagnostics = unused.diagnostics(SCRIPT);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, "WS8019");
    assert_eq!(diagnostics[0].severity, NativeSeverity::Hidden);

    let used = compile_full(json, "", "using System.Text.Json;\nvar s = JsonSerializer.Serialize(1);");
    assert!(codes(&used).is_empty());
}

#[test]
fn test_unreferenced_assembly_is_invisible() {
    let compilation = compile("using System.Text.Json;\nvar x = 1;");
    assert_eq!(codes(&compilation), vec!["WS0234"]);
}

#[test]
fn test_analyzer_lists_rules() {
    let analyzer = rules::Analyzer::new();
    let ids: Vec<&str> = analyzer.rules().map(|(id, _)| id).collect();
    assert_eq!(ids, vec!["WS0168", "WS0162", "WS8019"]);
}

// ============================================================================
// Model Tests
// ============================================================================

#[test]
fn test_scopes_record_visibility() {
    let source = "var a = 1;\nvar b = a;";
    let compilation = compile(source);
    let model = &compilation.document(SCRIPT).expect("script").model;
    let scope = model.innermost_scope(source.len()).expect("script scope");
    let names: Vec<&str> = scope
        .locals
        .iter()
        .map(|id| model.local(*id).name.as_str())
        .collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(model.local(scope.locals[1]).visible_from, source.len() - 1);
}

#[test]
fn test_declared_symbols_describe() {
    let compilation = compile("const int limit = 3;\nlimit");
    let model = &compilation.document(SCRIPT).expect("script").model;
    let local = &model.locals[0];
    let described = display::describe_symbol(&compilation.decls, model, &Symbol::Local(local.id));
    assert_eq!(described, "limit : const int");
}

#[test]
fn test_build_stops_when_cancelled() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let documents = vec![
        (GENERATED.to_string(), Arc::new(syntax::parse(""))),
        (SCRIPT.to_string(), Arc::new(syntax::parse("var x = 1;"))),
    ];
    let result = Compilation::build(
        &AssemblyCatalog::builtin(),
        &BTreeSet::new(),
        &btreeset! {"System".to_string()},
        documents,
        GENERATED,
        &cancel,
    );
    assert!(matches!(result, Err(WorkspaceError::Cancelled)));
}
