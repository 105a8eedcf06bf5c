//! Deciding which session the user is looking at, and persisting it.
//!
//! [`SessionReconciler::resolve`] turns an optional session id into one
//! [`Session`], consulting in order the ephemeral contexts, the store, and
//! finally minting a local draft. [`SessionReconciler::commit`] writes the
//! in-memory session back once it has turns.
//!
//! Commits read, merge, and write without a lock. Two controllers committing
//! the same session id concurrently can overwrite each other.

use std::fmt;
use std::sync::Arc;

use crate::context::EphemeralContexts;
use crate::observability::{SESSION_COMMITS, SESSION_COMMIT_FAILURES, SESSION_LOOKUP_FALLBACKS};
use crate::store::SessionStore;
use crate::types::{DocumentRef, Session, SessionContext};
use crate::Result;

/// Where a resolved session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// Synthesized from an ephemeral context for a session created locally.
    Context,

    /// Loaded from the store.
    Store,

    /// The id was unknown to the store; a draft carries it.
    Draft,

    /// No id was given; a new draft was minted.
    Fresh,
}

impl fmt::Display for SessionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionOrigin::Context => "context",
            SessionOrigin::Store => "store",
            SessionOrigin::Draft => "draft",
            SessionOrigin::Fresh => "fresh",
        };
        f.write_str(name)
    }
}

/// The outcome of [`SessionReconciler::resolve`].
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    /// The session to show and extend.
    pub session: Session,

    /// Where it came from.
    pub origin: SessionOrigin,

    /// The context it was synthesized from, if any.
    pub context: Option<SessionContext>,
}

impl ResolvedSession {
    /// The title to display.
    ///
    /// A context's title stands in for the placeholder until the session
    /// gets a title of its own.
    pub fn display_title(&self) -> &str {
        if self.session.has_default_title()
            && let Some(title) = self.context.as_ref().and_then(|c| c.title.as_deref())
        {
            return title;
        }
        &self.session.title
    }
}

/// Resolves and commits sessions against one store.
pub struct SessionReconciler {
    store: Arc<dyn SessionStore>,
    contexts: EphemeralContexts,
}

impl SessionReconciler {
    /// Creates a reconciler over `store` with no contexts.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            contexts: EphemeralContexts::new(),
        }
    }

    /// The ephemeral contexts consulted by [`resolve`](Self::resolve).
    pub fn contexts(&self) -> &EphemeralContexts {
        &self.contexts
    }

    /// Mint a session id scoped to `document` and return it.
    pub fn start_with_document(&self, document: DocumentRef) -> String {
        self.contexts.start_with_document(document)
    }

    /// Resolve `session_id` into a session.
    ///
    /// Never fails: a store that cannot be reached is logged and the id is
    /// carried by a draft instead.
    pub async fn resolve(&self, session_id: Option<&str>) -> ResolvedSession {
        let Some(session_id) = session_id else {
            return ResolvedSession {
                session: Session::fresh(),
                origin: SessionOrigin::Fresh,
                context: None,
            };
        };

        if let Some(context) = self.contexts.get(session_id) {
            return ResolvedSession {
                session: Session::draft(session_id, context.document.clone()),
                origin: SessionOrigin::Context,
                context: Some(context),
            };
        }

        match self.store.get(session_id).await {
            Ok(session) => ResolvedSession {
                session,
                origin: SessionOrigin::Store,
                context: None,
            },
            Err(err) => {
                if !err.is_not_found() {
                    SESSION_LOOKUP_FALLBACKS.click();
                    tracing::warn!(%session_id, error = %err, "session lookup failed; using a draft");
                }
                ResolvedSession {
                    session: Session::draft(session_id, None),
                    origin: SessionOrigin::Draft,
                    context: None,
                }
            }
        }
    }

    /// Write `session` to the store.
    ///
    /// Drafts are skipped. The in-memory turns replace whatever the store
    /// holds, `updated_at` is bumped, and the title is derived from the
    /// first user turn unless it has already been set. Failures are logged
    /// and returned; `session` stays usable either way.
    pub async fn commit(&self, session: &mut Session) -> Result<()> {
        if session.is_draft() {
            tracing::debug!(session_id = %session.id, "not committing a draft");
            return Ok(());
        }

        let stored = match self.store.get(&session.id).await {
            Ok(stored) => Some(stored),
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                tracing::warn!(session_id = %session.id, error = %err, "could not load stored session before commit");
                None
            }
        };
        if let Some(stored) = stored {
            merge_stored(session, stored);
        }
        session.touch();
        if session.has_default_title()
            && let Some(title) = session.derived_title()
        {
            session.title = title;
        }

        match self.store.put(session.clone()).await {
            Ok(()) => {
                SESSION_COMMITS.click();
                Ok(())
            }
            Err(err) => {
                SESSION_COMMIT_FAILURES.click();
                tracing::error!(session_id = %session.id, error = %err, "failed to commit session");
                Err(err)
            }
        }
    }

    /// Durable sessions, most recently updated first.
    pub async fn history(&self) -> Result<Vec<Session>> {
        self.store.list().await
    }

    /// The id of the most recently updated durable session.
    pub async fn latest(&self) -> Result<Option<String>> {
        Ok(self.store.list().await?.into_iter().next().map(|s| s.id))
    }

    /// Remove a session and any context recorded for it.
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        self.contexts.remove(session_id);
        self.store.delete(session_id).await
    }

    /// Remove every session and context.
    pub async fn clear_history(&self) -> Result<()> {
        self.contexts.clear();
        self.store.clear().await
    }
}

impl fmt::Debug for SessionReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionReconciler")
            .field("contexts", &self.contexts)
            .finish_non_exhaustive()
    }
}

// The in-memory turns always win. The stored record only contributes what
// is frozen once written: its title, creation time and document scope.
fn merge_stored(session: &mut Session, stored: Session) {
    if !stored.has_default_title() {
        session.title = stored.title;
    }
    if stored.created_at < session.created_at {
        session.created_at = stored.created_at;
    }
    if session.document.is_none() {
        session.document = stored.document;
    }
}
