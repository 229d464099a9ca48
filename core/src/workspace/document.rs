use std::sync::Arc;

use uuid::Uuid;

use crate::syntax::{self, SyntaxTree};

pub type DocumentId = Uuid;

/// A named in-memory document of a compilation context
///
/// Documents are only ever replaced as a whole. Every replacement bumps
/// `version`, even when the text is unchanged.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub version: u64,
    pub primary: bool,
    tree: Arc<SyntaxTree>,
}

impl Document {
    pub(crate) fn new(name: &str, text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            version: 1,
            primary: false,
            tree: Arc::new(syntax::parse(text)),
        }
    }

    pub(crate) fn replace(&mut self, text: &str) {
        self.tree = Arc::new(syntax::parse(text));
        self.version += 1;
    }

    pub fn text(&self) -> &str {
        &self.tree.text
    }

    pub fn tree(&self) -> &Arc<SyntaxTree> {
        &self.tree
    }
}
