//! Short-lived contexts that seed sessions which are not yet durable.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::{DocumentRef, SessionContext};
use crate::utils::generate_id;

/// Session contexts keyed by session id.
///
/// A context lives from the moment a session is created client-side until
/// its first answer completes; after that the store knows the session.
#[derive(Debug, Default)]
pub struct EphemeralContexts {
    contexts: Mutex<HashMap<String, SessionContext>>,
}

impl EphemeralContexts {
    /// Creates an empty set of contexts.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionContext>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `context` for `session_id`, replacing any previous one.
    pub fn insert(&self, session_id: impl Into<String>, context: SessionContext) {
        self.lock().insert(session_id.into(), context);
    }

    /// The context recorded for `session_id`.
    pub fn get(&self, session_id: &str) -> Option<SessionContext> {
        self.lock().get(session_id).cloned()
    }

    /// Forget the context for `session_id`, returning it if present.
    pub fn remove(&self, session_id: &str) -> Option<SessionContext> {
        self.lock().remove(session_id)
    }

    /// Forget every context.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Mint a session id scoped to `document` and return it.
    pub fn start_with_document(&self, document: DocumentRef) -> String {
        let session_id = generate_id();
        tracing::debug!(%session_id, document = %document.name, "starting chat with document");
        self.insert(session_id.clone(), SessionContext::for_document(document));
        session_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_with_document_records_a_titled_context() {
        let contexts = EphemeralContexts::new();
        let id = contexts.start_with_document(DocumentRef::new("d1", "Manual"));
        let context = contexts.get(&id).unwrap();
        assert_eq!(context.title.as_deref(), Some("Chat: Manual"));
        assert_eq!(context.document.unwrap().id, "d1");
    }

    #[test]
    fn remove_forgets_the_context() {
        let contexts = EphemeralContexts::new();
        contexts.insert("s1", SessionContext::default());
        assert!(contexts.remove("s1").is_some());
        assert!(contexts.get("s1").is_none());
        assert!(contexts.remove("s1").is_none());
    }

    #[test]
    fn ids_are_unique() {
        let contexts = EphemeralContexts::new();
        let a = contexts.start_with_document(DocumentRef::new("d", "D"));
        let b = contexts.start_with_document(DocumentRef::new("d", "D"));
        assert_ne!(a, b);
    }
}
