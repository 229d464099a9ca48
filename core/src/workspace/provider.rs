//! The seam to whatever turns a workflow schema into generated-type source

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{ProviderError, Result, WorkspaceError};

/// Source of the generated-type document plus the references it needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedTypeBundle {
    pub text: String,
    #[serde(default)]
    pub assemblies: BTreeSet<String>,
    #[serde(default)]
    pub imports: BTreeSet<String>,
}

/// Produces the generated-type bundle for a workflow schema
///
/// The schema type is opaque to the workspace; it is only passed through.
#[async_trait]
pub trait GeneratedTypeProvider: Send + Sync {
    type Schema: ?Sized + Send + Sync;

    async fn generate(&self, schema: &Self::Schema) -> Result<GeneratedTypeBundle, ProviderError>;
}

/// Run the provider bounded by `timeout`, giving up early on `cancel`
pub(crate) async fn generate_bundle<P>(
    provider: &P,
    schema: &P::Schema,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<GeneratedTypeBundle>
where
    P: GeneratedTypeProvider + ?Sized,
{
    if cancel.is_cancelled() {
        return Err(WorkspaceError::Cancelled);
    }

    let generated = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(WorkspaceError::Cancelled),
        outcome = tokio::time::timeout(timeout, provider.generate(schema)) => outcome,
    };

    match generated {
        Ok(Ok(bundle)) => Ok(bundle),
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "generated type provider failed");
            Err(err.into())
        }
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "generated type provider timed out");
            Err(ProviderError::Timeout(timeout).into())
        }
    }
}
