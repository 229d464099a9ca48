//! The scripting workspace service
//!
//! Ties the pieces together for the request-handling layer: every query
//! regenerates the generated-type document from the workflow schema,
//! upserts it and the user's document into the workflow's context, compiles
//! the context and runs the query against that snapshot.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use wfscript_core::config::Config;
//! use wfscript_core::service::{ScriptRequest, ScriptingWorkspace};
//! use wfscript_core::workspace::{SchemaTypeProvider, VariableSchema, WorkflowSchema, WorkspaceKey};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let workspace = ScriptingWorkspace::new(SchemaTypeProvider, Arc::new(Config::load()?));
//! let schema = WorkflowSchema {
//!     definition_id: "order-approval".to_string(),
//!     variables: vec![VariableSchema::new("Amount", "decimal")],
//!     ..Default::default()
//! };
//! let key = WorkspaceKey::from_workflow_id(&schema.definition_id)?;
//! let request = ScriptRequest::new(&schema, &key, "Condition", "Variables.Amount > 100M");
//! let diagnostics = workspace.analyze(&request, &CancellationToken::new()).await?;
//! assert!(diagnostics.is_empty());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Result, WorkspaceError};
use crate::ide::{
    self, CompletionCandidate, CompletionOptions, Diagnostic, HoverInfo, SignatureResult,
};
use crate::semantic::{AssemblyCatalog, Compilation};
use crate::workspace::{generate_bundle, ContextRegistry, GeneratedTypeProvider, WorkspaceKey};

/// Name of the single document in a throwaway formatting context
const FORMAT_DOCUMENT: &str = "Format";

/// Inputs shared by every query
#[derive(Debug)]
pub struct ScriptRequest<'a, S: ?Sized> {
    /// Passed through to the generated type provider
    pub schema: &'a S,
    pub key: &'a WorkspaceKey,
    /// The user document; becomes the context's primary document
    pub document: &'a str,
    /// Full current text of the user document
    pub text: &'a str,
}

impl<'a, S: ?Sized> ScriptRequest<'a, S> {
    pub fn new(schema: &'a S, key: &'a WorkspaceKey, document: &'a str, text: &'a str) -> Self {
        Self {
            schema,
            key,
            document,
            text,
        }
    }

    /// Reject positions past the end of the text (in characters)
    fn check_position(&self, position: usize) -> Result<()> {
        let length = self.text.chars().count();
        if position > length {
            return Err(WorkspaceError::InvalidPosition { position, length });
        }
        Ok(())
    }
}

pub struct ScriptingWorkspace<P: GeneratedTypeProvider> {
    registry: ContextRegistry,
    provider: P,
    config: Arc<Config>,
}

impl<P: GeneratedTypeProvider> ScriptingWorkspace<P> {
    pub fn new(provider: P, config: Arc<Config>) -> Self {
        Self::with_catalog(provider, config, Arc::new(AssemblyCatalog::builtin()))
    }

    pub fn with_catalog(provider: P, config: Arc<Config>, catalog: Arc<AssemblyCatalog>) -> Self {
        let registry = ContextRegistry::new(catalog, config.workspace.generated_document_name.clone());
        Self {
            registry,
            provider,
            config,
        }
    }

    pub fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Diagnostics of the user document. Findings in the generated-type
    /// document are not reported.
    #[tracing::instrument(skip_all, fields(key = %request.key, document = request.document))]
    pub async fn analyze(
        &self,
        request: &ScriptRequest<'_, P::Schema>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Diagnostic>> {
        let compilation = self.compile(request, cancel).await?;
        let diagnostics = ide::diagnostics(&compilation, request.document);
        tracing::debug!(count = diagnostics.len(), "analysis finished");
        Ok(diagnostics)
    }

    #[tracing::instrument(skip_all, fields(key = %request.key, document = request.document, position = position))]
    pub async fn complete(
        &self,
        request: &ScriptRequest<'_, P::Schema>,
        position: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<CompletionCandidate>> {
        request.check_position(position)?;
        let compilation = self.compile(request, cancel).await?;
        let options = CompletionOptions::from(&self.config.completion);
        ide::complete(&compilation, request.document, position, &options, cancel)
    }

    #[tracing::instrument(skip_all, fields(key = %request.key, document = request.document, position = position))]
    pub async fn hover(
        &self,
        request: &ScriptRequest<'_, P::Schema>,
        position: usize,
        cancel: &CancellationToken,
    ) -> Result<Option<HoverInfo>> {
        request.check_position(position)?;
        let compilation = self.compile(request, cancel).await?;
        let info = ide::hover(&compilation, request.document, position);
        tracing::debug!(found = info.is_some(), "hover computed");
        Ok(info)
    }

    #[tracing::instrument(skip_all, fields(key = %request.key, document = request.document, position = position))]
    pub async fn signatures(
        &self,
        request: &ScriptRequest<'_, P::Schema>,
        position: usize,
        cancel: &CancellationToken,
    ) -> Result<Option<SignatureResult>> {
        request.check_position(position)?;
        let compilation = self.compile(request, cancel).await?;
        Ok(ide::signatures(&compilation, request.document, position))
    }

    /// Format `text` in a throwaway context that is disposed before
    /// returning. Text that does not parse comes back unchanged.
    #[tracing::instrument(skip_all, fields(length = text.len()))]
    pub async fn format(&self, text: &str) -> Result<String> {
        let key = WorkspaceKey::ephemeral();
        let context = self
            .registry
            .get_or_create(&key, &BTreeSet::new(), &BTreeSet::new())
            .await;

        let formatted = async {
            let mut session = context.session().await?;
            let id = session.upsert(FORMAT_DOCUMENT, text, true);
            let document = session.document(id)?;
            Ok::<_, WorkspaceError>(ide::format(document.tree(), &self.config.formatter))
        }
        .await;

        self.registry.dispose(&key).await?;
        formatted
    }

    /// Regenerate the generated-type document, upsert both documents and
    /// compile, all under the context's lock
    async fn compile(
        &self,
        request: &ScriptRequest<'_, P::Schema>,
        cancel: &CancellationToken,
    ) -> Result<Compilation> {
        let generated_name = self.registry.generated_document();
        if request.document == generated_name {
            return Err(WorkspaceError::ReservedDocumentName(request.document.to_string()));
        }

        let bundle = generate_bundle(
            &self.provider,
            request.schema,
            self.config.workspace.provider_timeout(),
            cancel,
        )
        .await?;

        let context = self
            .registry
            .get_or_create(request.key, &bundle.assemblies, &bundle.imports)
            .await;
        let mut session = context.session().await?;
        session.upsert(generated_name, &bundle.text, false);
        session.upsert(request.document, request.text, true);
        session.compile(cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::workspace::{SchemaTypeProvider, VariableSchema, WorkflowSchema};
    use tokio_test::{assert_err, assert_ok};

    const DOCUMENT: &str = "Condition";

    fn workspace() -> ScriptingWorkspace<SchemaTypeProvider> {
        ScriptingWorkspace::new(SchemaTypeProvider, Arc::new(Config::default()))
    }

    fn schema(variables: Vec<VariableSchema>) -> WorkflowSchema {
        WorkflowSchema {
            definition_id: "order-approval".to_string(),
            variables,
            ..Default::default()
        }
    }

    fn key() -> WorkspaceKey {
        WorkspaceKey::from_workflow_id("order-approval").expect("valid key")
    }

    #[tokio::test]
    async fn test_analyze_clean_script() {
        let workspace = workspace();
        let schema = schema(vec![VariableSchema::new("Amount", "decimal")]);
        let key = key();
        let request = ScriptRequest::new(&schema, &key, DOCUMENT, "Variables.Amount > 100M");

        let diagnostics = assert_ok!(workspace.analyze(&request, &CancellationToken::new()).await);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert!(workspace.registry().contains(&key).await);
    }

    #[tokio::test]
    async fn test_analyze_reports_user_errors_only() {
        let workspace = workspace();
        let schema = schema(vec![VariableSchema::new("Amount", "NotAType")]);
        let key = key();
        let request = ScriptRequest::new(&schema, &key, DOCUMENT, "Variables.Missing");

        let diagnostics = assert_ok!(workspace.analyze(&request, &CancellationToken::new()).await);
        let codes: Vec<&str> = diagnostics.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["WS0117"]);
    }

    #[tokio::test]
    async fn test_context_survives_between_requests() {
        let workspace = workspace();
        let schema = schema(vec![VariableSchema::new("Amount", "decimal")]);
        let key = key();
        let cancel = CancellationToken::new();

        let first = ScriptRequest::new(&schema, &key, DOCUMENT, "Variables.Amount");
        assert_ok!(workspace.analyze(&first, &cancel).await);
        let context = assert_ok!(workspace.registry().get(&key).await);

        let second = ScriptRequest::new(&schema, &key, DOCUMENT, "Variables.Amount + 1");
        assert_ok!(workspace.analyze(&second, &cancel).await);
        let again = assert_ok!(workspace.registry().get(&key).await);

        assert!(Arc::ptr_eq(&context, &again));
        let session = assert_ok!(again.session().await);
        assert_eq!(session.documents().len(), 2);
        assert_eq!(session.primary().map(|d| d.version), Some(2));
        assert_eq!(session.primary().map(|d| d.text()), Some("Variables.Amount + 1"));
    }

    #[tokio::test]
    async fn test_reserved_document_name_is_rejected() {
        let workspace = workspace();
        let schema = schema(Vec::new());
        let key = key();
        let request = ScriptRequest::new(&schema, &key, "GeneratedTypes", "1");

        let err = assert_err!(workspace.analyze(&request, &CancellationToken::new()).await);
        assert!(matches!(err, WorkspaceError::ReservedDocumentName(_)));
    }

    #[tokio::test]
    async fn test_position_past_end_is_rejected() {
        let workspace = workspace();
        let schema = schema(Vec::new());
        let key = key();
        let request = ScriptRequest::new(&schema, &key, DOCUMENT, "Variables");

        let err = assert_err!(workspace.hover(&request, 10, &CancellationToken::new()).await);
        assert!(matches!(
            err,
            WorkspaceError::InvalidPosition {
                position: 10,
                length: 9
            }
        ));
        // nothing was created for a malformed request
        assert!(!workspace.registry().contains(&key).await);
    }

    #[tokio::test]
    async fn test_provider_failure_is_reported() {
        let workspace = workspace();
        let schema = WorkflowSchema::default();
        let key = key();
        let request = ScriptRequest::new(&schema, &key, DOCUMENT, "1");

        let err = assert_err!(workspace.analyze(&request, &CancellationToken::new()).await);
        assert!(matches!(err, WorkspaceError::Provider(ProviderError::InvalidSchema(_))));
    }

    #[tokio::test]
    async fn test_complete_hover_and_signatures() {
        let workspace = workspace();
        let schema = schema(vec![
            VariableSchema::new("Amount", "decimal"),
            VariableSchema::new("Approver", "string"),
        ]);
        let key = key();
        let cancel = CancellationToken::new();

        let request = ScriptRequest::new(&schema, &key, DOCUMENT, "Variables.Am");
        let candidates = assert_ok!(workspace.complete(&request, 12, &cancel).await);
        let labels: Vec<&str> = candidates.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Amount"]);

        let request = ScriptRequest::new(&schema, &key, DOCUMENT, "Variables.Approver.Length");
        let info = assert_ok!(workspace.hover(&request, 12, &cancel).await).expect("hover info");
        assert_eq!(info.text, "string");
        assert_eq!((info.from, info.to), (10, 18));

        let text = "Variables.Approver.Substring(1, ";
        let request = ScriptRequest::new(&schema, &key, DOCUMENT, text);
        let position = text.chars().count();
        let help = assert_ok!(workspace.signatures(&request, position, &cancel).await).expect("signature help");
        assert_eq!(help.signatures.len(), 2);
        assert_eq!(help.active_signature, Some(1));
        assert_eq!(help.active_parameter, 1);
    }

    #[tokio::test]
    async fn test_cancelled_query() {
        let workspace = workspace();
        let schema = schema(Vec::new());
        let key = key();
        let request = ScriptRequest::new(&schema, &key, DOCUMENT, "1");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = assert_err!(workspace.analyze(&request, &cancel).await);
        assert!(matches!(err, WorkspaceError::Cancelled));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_deeply_nested_script_is_reported() {
        let workspace = Arc::new(workspace());
        let handle = tokio::spawn(async move {
            let schema = schema(Vec::new());
            let key = key();
            let script = format!("var x = {}1{};", "(".repeat(5000), ")".repeat(5000));
            let request = ScriptRequest::new(&schema, &key, DOCUMENT, &script);
            workspace.analyze(&request, &CancellationToken::new()).await
        });

        let diagnostics = assert_ok!(handle.await.expect("task completes"));
        assert!(diagnostics.iter().any(|d| d.code == "WS1005"), "{:?}", diagnostics);
    }

    #[tokio::test]
    async fn test_format_uses_a_throwaway_context() {
        let workspace = workspace();

        let formatted = assert_ok!(workspace.format("var x=1;if(x>0){x++;}").await);
        assert_eq!(formatted, "var x = 1;\nif (x > 0)\n{\n    x++;\n}\n");
        assert_eq!(assert_ok!(workspace.format(&formatted).await), formatted);

        let broken = "var x = ;";
        assert_eq!(assert_ok!(workspace.format(broken).await), broken);
        assert!(workspace.registry().is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_see_consistent_documents() {
        let workspace = Arc::new(workspace());
        let key = key();

        let mut handles = Vec::new();
        for i in 0..50 {
            let workspace = Arc::clone(&workspace);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                let field = format!("Field{}", i);
                let schema = schema(vec![VariableSchema::new(field.clone(), "int")]);
                let script = format!("Variables.{} + 1", field);
                let request = ScriptRequest::new(&schema, &key, DOCUMENT, &script);
                workspace.analyze(&request, &CancellationToken::new()).await
            }));
        }

        for handle in handles {
            let diagnostics = assert_ok!(handle.await.expect("task completes"));
            assert!(diagnostics.is_empty(), "torn document pair: {:?}", diagnostics);
        }
        assert_eq!(workspace.registry().len().await, 1);
    }
}
