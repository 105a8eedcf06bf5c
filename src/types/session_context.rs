use serde::{Deserialize, Serialize};

use crate::types::DocumentRef;

/// Short-lived data used to seed a session before it becomes durable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// The document the new session is scoped to, if any.
    pub document: Option<DocumentRef>,

    /// A display title to show until the session gets its real title.
    pub title: Option<String>,
}

impl SessionContext {
    /// A context that scopes a new session to `document`.
    pub fn for_document(document: DocumentRef) -> Self {
        let title = Some(format!("Chat: {}", document.name));
        Self {
            document: Some(document),
            title,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_contexts_are_titled_after_the_document() {
        let context = SessionContext::for_document(DocumentRef::new("d1", "Handbook"));
        assert_eq!(context.title.as_deref(), Some("Chat: Handbook"));
        assert_eq!(context.document, Some(DocumentRef::new("d1", "Handbook")));
    }
}
