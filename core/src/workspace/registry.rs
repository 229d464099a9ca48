use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::context::CompilationContext;
use super::document::{Document, DocumentId};
use super::key::WorkspaceKey;
use crate::error::{Result, WorkspaceError};
use crate::semantic::AssemblyCatalog;

/// Process-wide map from workspace key to live compilation context
///
/// Contexts are created on first use and kept for the life of the
/// registry. Only one-shot contexts are disposed explicitly.
pub struct ContextRegistry {
    catalog: Arc<AssemblyCatalog>,
    generated_document: String,
    contexts: RwLock<HashMap<WorkspaceKey, Arc<CompilationContext>>>,
}

impl ContextRegistry {
    pub fn new(catalog: Arc<AssemblyCatalog>, generated_document: impl Into<String>) -> Self {
        Self {
            catalog,
            generated_document: generated_document.into(),
            contexts: RwLock::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<AssemblyCatalog> {
        &self.catalog
    }

    pub fn generated_document(&self) -> &str {
        &self.generated_document
    }

    /// The context for `key`, created with `assemblies` and `imports` if it
    /// does not exist yet. An existing context is returned unchanged.
    pub async fn get_or_create(
        &self,
        key: &WorkspaceKey,
        assemblies: &BTreeSet<String>,
        imports: &BTreeSet<String>,
    ) -> Arc<CompilationContext> {
        if let Some(context) = self.contexts.read().await.get(key) {
            return Arc::clone(context);
        }

        let mut contexts = self.contexts.write().await;
        let context = contexts.entry(key.clone()).or_insert_with(|| {
            tracing::info!(
                key = %key,
                assemblies = assemblies.len(),
                imports = imports.len(),
                "compilation context created"
            );
            Arc::new(CompilationContext::new(
                key.clone(),
                Arc::clone(&self.catalog),
                &self.generated_document,
                assemblies,
                imports,
            ))
        });
        Arc::clone(context)
    }

    pub async fn get(&self, key: &WorkspaceKey) -> Result<Arc<CompilationContext>> {
        self.contexts
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| WorkspaceError::ContextNotFound(key.clone()))
    }

    pub async fn document(&self, key: &WorkspaceKey, id: DocumentId) -> Result<Document> {
        self.get(key).await?.document(id).await
    }

    /// Remove a context and drop its documents. Holders of the context see
    /// it as gone from then on.
    pub async fn dispose(&self, key: &WorkspaceKey) -> Result<()> {
        let removed = self.contexts.write().await.remove(key);
        let context = removed.ok_or_else(|| WorkspaceError::ContextNotFound(key.clone()))?;
        context.dispose().await;
        tracing::info!(key = %key, "compilation context disposed");
        Ok(())
    }

    pub async fn contains(&self, key: &WorkspaceKey) -> bool {
        self.contexts.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.contexts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
