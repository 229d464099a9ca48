//! Tests for the context registry, document store and providers

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use maplit::btreeset;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::error::{ProviderError, WorkspaceError};
use crate::semantic::{AssemblyCatalog, NativeSeverity};

const GENERATED: &str = "GeneratedTypes";

// ============================================================================
// Helper Functions
// ============================================================================

fn registry() -> ContextRegistry {
    ContextRegistry::new(Arc::new(AssemblyCatalog::builtin()), GENERATED)
}

fn key(raw: &str) -> WorkspaceKey {
    WorkspaceKey::new(raw).expect("valid key")
}

async fn context(registry: &ContextRegistry, raw: &str) -> Arc<CompilationContext> {
    registry
        .get_or_create(&key(raw), &BTreeSet::new(), &BTreeSet::new())
        .await
}

fn order_schema() -> WorkflowSchema {
    WorkflowSchema {
        definition_id: "order-approval".to_string(),
        variables: vec![
            VariableSchema::new("Amount", "decimal"),
            VariableSchema {
                description: Some("Who asked for it".to_string()),
                ..VariableSchema::new("Requester", "string")
            },
        ],
        activities: vec![ActivitySchema {
            name: "SendEmail".to_string(),
            description: None,
            outputs: vec![OutputSchema {
                name: "MessageId".to_string(),
                type_name: "string".to_string(),
            }],
        }],
        ..Default::default()
    }
}

struct SlowProvider;

#[async_trait]
impl GeneratedTypeProvider for SlowProvider {
    type Schema = ();

    async fn generate(&self, _: &()) -> Result<GeneratedTypeBundle, ProviderError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(GeneratedTypeBundle::default())
    }
}

// ============================================================================
// Workspace Keys
// ============================================================================

#[test]
fn test_key_accepts_identifier_characters() {
    let key = assert_ok!(WorkspaceKey::new("Order_Approval_2"));
    assert_eq!(key.as_str(), "Order_Approval_2");
}

#[test]
fn test_key_rejects_separators() {
    assert!(matches!(
        WorkspaceKey::new("flows/../order"),
        Err(WorkspaceError::InvalidKey(_))
    ));
    assert_err!(WorkspaceKey::new(""));
    assert_err!(WorkspaceKey::new("a-b"));
}

#[test]
fn test_key_from_workflow_id_strips_separators() {
    let key = assert_ok!(WorkspaceKey::from_workflow_id(
        "3f2a9c1e-77c1-4b7e-9d0a-1c2b3d4e5f60"
    ));
    assert_eq!(key.as_str(), "3f2a9c1e77c14b7e9d0a1c2b3d4e5f60");
    assert_err!(WorkspaceKey::from_workflow_id("--/--"));
}

#[test]
fn test_ephemeral_keys_are_valid_and_distinct() {
    let a = WorkspaceKey::ephemeral();
    let b = WorkspaceKey::ephemeral();
    assert_ne!(a, b);
    assert_ok!(WorkspaceKey::new(a.as_str()));
}

// ============================================================================
// Context Registry
// ============================================================================

#[tokio::test]
async fn test_get_or_create_is_idempotent() {
    let registry = registry();
    let first = registry
        .get_or_create(&key("wf1"), &btreeset! {"System.Text.Json".to_string()}, &BTreeSet::new())
        .await;
    let second = registry
        .get_or_create(&key("wf1"), &BTreeSet::new(), &btreeset! {"System.Linq".to_string()})
        .await;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len().await, 1);
    // The reference set of an existing context is not updated
    assert!(second.assemblies().contains("System.Text.Json"));
    assert!(!second.imports().contains("System.Linq"));
}

#[tokio::test]
async fn test_contexts_always_import_system() {
    let registry = registry();
    let context = context(&registry, "wf1").await;
    assert!(context.imports().contains("System"));
}

#[tokio::test]
async fn test_distinct_keys_get_distinct_contexts() {
    let registry = registry();
    let a = context(&registry, "wfA").await;
    let b = context(&registry, "wfB").await;
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(registry.len().await, 2);
}

#[tokio::test]
async fn test_get_unknown_context_is_not_found() {
    let registry = registry();
    let result = registry.get(&key("missing")).await;
    assert!(matches!(result, Err(WorkspaceError::ContextNotFound(_))));
}

#[tokio::test]
async fn test_dispose_removes_context_and_documents() {
    let registry = registry();
    let context = context(&registry, "adhoc").await;
    let id = assert_ok!(context.upsert("Script", "var x = 1;", true).await);

    assert_ok!(registry.dispose(&key("adhoc")).await);

    assert!(!registry.contains(&key("adhoc")).await);
    assert!(matches!(
        registry.document(&key("adhoc"), id).await,
        Err(WorkspaceError::ContextNotFound(_))
    ));
    assert!(matches!(
        context.document(id).await,
        Err(WorkspaceError::DocumentNotFound { .. })
    ));
    assert!(matches!(
        context.session().await,
        Err(WorkspaceError::ContextNotFound(_))
    ));
    assert_err!(registry.dispose(&key("adhoc")).await);
}

// ============================================================================
// Document Store
// ============================================================================

#[tokio::test]
async fn test_upsert_replaces_text_and_bumps_version() {
    let registry = registry();
    let context = context(&registry, "wf1").await;

    let first = assert_ok!(context.upsert("Script", "var x = 1;", true).await);
    let second = assert_ok!(context.upsert("Script", "var x = 1;", true).await);
    assert_eq!(first, second);

    let document = assert_ok!(registry.document(&key("wf1"), first).await);
    assert_eq!(document.version, 2);
    assert_eq!(document.text(), "var x = 1;");

    assert_ok!(context.upsert("Script", "var y = 2;", false).await);
    let document = assert_ok!(context.document(first).await);
    assert_eq!(document.version, 3);
    assert_eq!(document.text(), "var y = 2;");
    assert!(document.primary, "primary flag survives a non-primary upsert");
}

#[tokio::test]
async fn test_single_primary_document() {
    let registry = registry();
    let context = context(&registry, "wf1").await;

    let a = assert_ok!(context.upsert("A", "", true).await);
    let b = assert_ok!(context.upsert("B", "", true).await);

    let session = assert_ok!(context.session().await);
    assert!(!assert_ok!(session.document(a)).primary);
    assert!(assert_ok!(session.document(b)).primary);
    assert_eq!(session.primary().map(|d| d.id), Some(b));
    assert_eq!(session.documents().iter().filter(|d| d.primary).count(), 1);
}

#[tokio::test]
async fn test_generated_document_is_never_primary() {
    let registry = registry();
    let context = context(&registry, "wf1").await;

    let script = assert_ok!(context.upsert("Script", "", true).await);
    let generated = assert_ok!(context.upsert(GENERATED, "public class Workflow { }", true).await);

    let session = assert_ok!(context.session().await);
    assert!(!assert_ok!(session.document(generated)).primary);
    assert_eq!(session.primary().map(|d| d.id), Some(script));
}

#[tokio::test]
async fn test_documents_keep_insertion_order() {
    let registry = registry();
    let context = context(&registry, "wf1").await;
    let mut session = assert_ok!(context.session().await);
    session.upsert(GENERATED, "", false);
    session.upsert("Script", "", true);
    session.upsert(GENERATED, "public class W { }", false);

    let names: Vec<&str> = session.documents().iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec![GENERATED, "Script"]);
}

#[tokio::test]
async fn test_session_compiles_current_documents() {
    let registry = registry();
    let context = context(&registry, "wf1").await;
    let mut session = assert_ok!(context.session().await);
    session.upsert(GENERATED, "public class Workflow { public int Counter; }", false);
    session.upsert("Script", "Workflow.Counter + 1", true);

    let compilation = assert_ok!(session.compile(&CancellationToken::new()).await);
    assert!(compilation.diagnostics("Script").is_empty());

    session.upsert("Script", "Workflow.Missing", true);
    let compilation = assert_ok!(session.compile(&CancellationToken::new()).await);
    let codes: Vec<_> = compilation.diagnostics("Script").iter().map(|d| d.code).collect();
    assert_eq!(codes, vec!["WS0117"]);
}

#[tokio::test]
async fn test_compile_honors_cancellation() {
    let registry = registry();
    let context = context(&registry, "wf1").await;
    let session = assert_ok!(context.session().await);

    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(matches!(
        session.compile(&cancel).await,
        Err(WorkspaceError::Cancelled)
    ));
}

// ============================================================================
// Providers
// ============================================================================

#[test]
fn test_schema_renders_variables_and_activities() {
    let bundle = render_schema(&order_schema());

    assert!(bundle.text.contains("public class Variables"));
    assert!(bundle.text.contains("public decimal Amount { get; set; }"));
    assert!(bundle.text.contains("[Description(\"Who asked for it\")]"));
    assert!(bundle.text.contains("public class SendEmailOutput"));
    assert!(bundle.text.contains("public SendEmailOutput SendEmail;"));
    assert_eq!(bundle.assemblies, btreeset! {"System.ComponentModel".to_string()});
    assert!(bundle.imports.contains("System.ComponentModel"));
}

#[test]
fn test_schema_sanitizes_names_and_types() {
    let schema = WorkflowSchema {
        definition_id: "wf".to_string(),
        variables: vec![
            VariableSchema::new("order-id", "string"),
            VariableSchema::new("2nd", "int"),
            VariableSchema::new("class", "List<int>"),
            VariableSchema::new("---", "int"),
        ],
        ..Default::default()
    };
    let bundle = render_schema(&schema);

    assert!(bundle.text.contains("public string order_id { get; set; }"));
    assert!(bundle.text.contains("public int _2nd { get; set; }"));
    assert!(bundle.text.contains("public object _class { get; set; }"));
    assert!(!bundle.text.contains("---"));
    assert!(bundle.assemblies.is_empty());
}

#[tokio::test]
async fn test_schema_output_compiles_cleanly() {
    let bundle = assert_ok!(SchemaTypeProvider.generate(&order_schema()).await);
    let registry = registry();
    let context = registry
        .get_or_create(&key("order"), &bundle.assemblies, &bundle.imports)
        .await;
    let mut session = assert_ok!(context.session().await);
    session.upsert(GENERATED, &bundle.text, false);
    session.upsert(
        "Script",
        "Variables.Amount > 10M && Activities.SendEmail.MessageId != null && Variables.Requester.Length > 0",
        true,
    );

    let compilation = assert_ok!(session.compile(&CancellationToken::new()).await);
    let generated_errors: Vec<_> = compilation
        .diagnostics(GENERATED)
        .into_iter()
        .filter(|d| d.severity == NativeSeverity::Error)
        .collect();
    assert!(generated_errors.is_empty(), "{:?}", generated_errors);
    assert!(compilation.diagnostics("Script").is_empty());
}

#[tokio::test]
async fn test_schema_provider_rejects_missing_definition_id() {
    let result = SchemaTypeProvider.generate(&WorkflowSchema::default()).await;
    assert!(matches!(result, Err(ProviderError::InvalidSchema(_))));
}

#[tokio::test]
async fn test_provider_timeout_is_provider_failure() {
    let result = generate_bundle(
        &SlowProvider,
        &(),
        Duration::from_millis(20),
        &CancellationToken::new(),
    )
    .await;
    assert!(matches!(
        result,
        Err(WorkspaceError::Provider(ProviderError::Timeout(_)))
    ));
}

#[tokio::test]
async fn test_provider_call_stops_on_cancel() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });
    let result = generate_bundle(&SlowProvider, &(), Duration::from_secs(60), &cancel).await;
    assert!(matches!(result, Err(WorkspaceError::Cancelled)));
}
