//! Compilation contexts and their document store

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use super::document::{Document, DocumentId};
use super::key::WorkspaceKey;
use crate::error::{Result, WorkspaceError};
use crate::semantic::{AssemblyCatalog, Compilation};

/// The documents, assembly references and imports of one workflow,
/// analysed together as one semantic unit
///
/// All reads and writes of the document set go through a
/// [`ContextSession`], which holds the context's lock. A caller that
/// upserts and then compiles inside one session sees exactly the documents
/// it wrote.
#[derive(Debug)]
pub struct CompilationContext {
    key: WorkspaceKey,
    assemblies: BTreeSet<String>,
    imports: BTreeSet<String>,
    generated_document: String,
    catalog: Arc<AssemblyCatalog>,
    state: Mutex<ContextState>,
}

#[derive(Debug, Default)]
struct ContextState {
    /// In insertion order
    documents: Vec<Document>,
    disposed: bool,
}

impl CompilationContext {
    pub(crate) fn new(
        key: WorkspaceKey,
        catalog: Arc<AssemblyCatalog>,
        generated_document: &str,
        assemblies: &BTreeSet<String>,
        imports: &BTreeSet<String>,
    ) -> Self {
        let mut imports = imports.clone();
        imports.insert("System".to_string());
        Self {
            key,
            assemblies: assemblies.clone(),
            imports,
            generated_document: generated_document.to_string(),
            catalog,
            state: Mutex::new(ContextState::default()),
        }
    }

    pub fn key(&self) -> &WorkspaceKey {
        &self.key
    }

    pub fn assemblies(&self) -> &BTreeSet<String> {
        &self.assemblies
    }

    pub fn imports(&self) -> &BTreeSet<String> {
        &self.imports
    }

    /// Name of the reserved generated-type document
    pub fn generated_document(&self) -> &str {
        &self.generated_document
    }

    /// Lock the context for a consistent sequence of upserts and queries
    pub async fn session(&self) -> Result<ContextSession<'_>> {
        let state = self.state.lock().await;
        if state.disposed {
            return Err(WorkspaceError::ContextNotFound(self.key.clone()));
        }
        Ok(ContextSession {
            context: self,
            state,
        })
    }

    /// Replace (or create) one document. See [`ContextSession::upsert`].
    pub async fn upsert(&self, name: &str, text: &str, make_primary: bool) -> Result<DocumentId> {
        Ok(self.session().await?.upsert(name, text, make_primary))
    }

    pub async fn document(&self, id: DocumentId) -> Result<Document> {
        let state = self.state.lock().await;
        state
            .documents
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| WorkspaceError::DocumentNotFound {
                key: self.key.clone(),
                id,
            })
    }

    pub(crate) async fn dispose(&self) {
        let mut state = self.state.lock().await;
        state.documents.clear();
        state.disposed = true;
    }
}

/// Exclusive access to a context's documents
pub struct ContextSession<'a> {
    context: &'a CompilationContext,
    state: MutexGuard<'a, ContextState>,
}

impl<'a> ContextSession<'a> {
    pub fn context(&self) -> &'a CompilationContext {
        self.context
    }

    /// Replace the full text of the document called `name`, creating it if
    /// absent, and bump its version. With `make_primary` the document
    /// becomes the context's only primary document, unless `name` is the
    /// reserved generated-type name.
    pub fn upsert(&mut self, name: &str, text: &str, make_primary: bool) -> DocumentId {
        let documents = &mut self.state.documents;
        let index = match documents.iter().position(|d| d.name == name) {
            Some(index) => {
                documents[index].replace(text);
                index
            }
            None => {
                documents.push(Document::new(name, text));
                documents.len() - 1
            }
        };

        if make_primary && name != self.context.generated_document {
            for (i, document) in documents.iter_mut().enumerate() {
                document.primary = i == index;
            }
        }

        let document = &documents[index];
        tracing::debug!(
            key = %self.context.key,
            document = %name,
            version = document.version,
            primary = document.primary,
            "document upserted"
        );
        document.id
    }

    pub fn document(&self, id: DocumentId) -> Result<&Document> {
        self.state
            .documents
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| WorkspaceError::DocumentNotFound {
                key: self.context.key.clone(),
                id,
            })
    }

    pub fn document_named(&self, name: &str) -> Option<&Document> {
        self.state.documents.iter().find(|d| d.name == name)
    }

    pub fn primary(&self) -> Option<&Document> {
        self.state.documents.iter().find(|d| d.primary)
    }

    pub fn documents(&self) -> &[Document] {
        &self.state.documents
    }

    /// Link and bind the current document set. Runs on the blocking pool;
    /// the session stays locked until it finishes or `cancel` fires.
    pub async fn compile(&self, cancel: &CancellationToken) -> Result<Compilation> {
        if cancel.is_cancelled() {
            return Err(WorkspaceError::Cancelled);
        }

        let catalog = Arc::clone(&self.context.catalog);
        let assemblies = self.context.assemblies.clone();
        let imports = self.context.imports.clone();
        let generated = self.context.generated_document.clone();
        let documents: Vec<_> = self
            .state
            .documents
            .iter()
            .map(|d| (d.name.clone(), Arc::clone(d.tree())))
            .collect();

        // The blocking task watches its own clone and stops soon after a cancel
        let build_cancel = cancel.clone();
        let task = tokio::task::spawn_blocking(move || {
            Compilation::build(&catalog, &assemblies, &imports, documents, &generated, &build_cancel)
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(WorkspaceError::Cancelled),
            joined = task => joined.map_err(|e| WorkspaceError::Analysis(e.to_string()))?,
        }
    }
}
