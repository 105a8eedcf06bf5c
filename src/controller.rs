//! The conversation state machine.
//!
//! A [`Conversation`] is `Idle` until a message is accepted, `Streaming`
//! while the answer arrives, and `Idle` again once it completes, fails, or
//! is abandoned. Only one answer streams at a time.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::client::ChatTransport;
use crate::dispatch::{StreamHandler, StreamOutcome, dispatch};
use crate::reconcile::{ResolvedSession, SessionOrigin, SessionReconciler};
use crate::types::{ChatRequest, ChatTurn, Credential, Session};
use crate::{Error, Result};

/// Default answer budget sent with every request.
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// Whether the controller is waiting for input or receiving an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Ready to accept a message.
    Idle,

    /// An answer is streaming.
    Streaming,
}

/// Request settings applied to every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationOptions {
    /// Upper bound on answer length, in tokens.
    pub max_tokens: u32,

    /// Whether the backend should ground answers in embedded documents.
    pub use_context: bool,
}

impl Default for ConversationOptions {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            use_context: true,
        }
    }
}

/// How a call to [`Conversation::send`] ended, short of an error.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The text was blank or an answer was already streaming. Nothing changed.
    Rejected,

    /// The answer completed and was committed as this turn.
    Answered(ChatTurn),

    /// The caller interrupted the answer; nothing was committed for it.
    Abandoned,
}

/// One conversation: a session, its in-flight answer, and the collaborators
/// that fetch answers and persist turns.
pub struct Conversation {
    transport: Arc<dyn ChatTransport>,
    reconciler: Arc<SessionReconciler>,
    options: ConversationOptions,
    resolved: ResolvedSession,
    state: ControllerState,
    partial: String,
}

impl Conversation {
    /// Creates a conversation over an already resolved session.
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        reconciler: Arc<SessionReconciler>,
        resolved: ResolvedSession,
        options: ConversationOptions,
    ) -> Self {
        Self {
            transport,
            reconciler,
            options,
            resolved,
            state: ControllerState::Idle,
            partial: String::new(),
        }
    }

    /// Resolves `session_id` and creates a conversation over it.
    pub async fn open(
        transport: Arc<dyn ChatTransport>,
        reconciler: Arc<SessionReconciler>,
        session_id: Option<&str>,
        options: ConversationOptions,
    ) -> Self {
        let resolved = reconciler.resolve(session_id).await;
        Self::new(transport, reconciler, resolved, options)
    }

    /// Switch to another session. Fails while an answer is streaming.
    pub async fn switch_to(&mut self, session_id: Option<&str>) -> Result<()> {
        if self.state != ControllerState::Idle {
            return Err(Error::validation(
                "cannot switch sessions while an answer is streaming",
                None,
            ));
        }
        self.resolved = self.reconciler.resolve(session_id).await;
        self.partial.clear();
        Ok(())
    }

    /// The current session.
    pub fn session(&self) -> &Session {
        &self.resolved.session
    }

    /// Where the current session came from.
    pub fn origin(&self) -> SessionOrigin {
        self.resolved.origin
    }

    /// The title to display for the current session.
    pub fn title(&self) -> &str {
        self.resolved.display_title()
    }

    /// Committed turns in order.
    pub fn turns(&self) -> &[ChatTurn] {
        &self.resolved.session.turns
    }

    /// The answer received so far while streaming.
    pub fn partial(&self) -> &str {
        &self.partial
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn options(&self) -> ConversationOptions {
        self.options
    }

    /// Accept `text` as the next user turn and build its request.
    ///
    /// Returns `None`, changing nothing, when `text` is blank or an answer
    /// is already streaming. Otherwise the user turn is appended and the
    /// controller moves to `Streaming`.
    fn begin(&mut self, text: &str) -> Option<ChatRequest> {
        if self.state != ControllerState::Idle || text.trim().is_empty() {
            return None;
        }
        let session = &mut self.resolved.session;
        session.push_turn(ChatTurn::user(text));
        self.partial.clear();
        self.state = ControllerState::Streaming;

        let request = ChatRequest::new(text)
            .with_session_id(session.id.clone())
            .with_document_filter(session.document_filter().map(str::to_string))
            .with_use_context(self.options.use_context)
            .with_max_tokens(self.options.max_tokens);
        Some(request)
    }

    /// Send `text` and stream the answer into `handler`.
    ///
    /// The user turn is committed as soon as it is accepted, the assistant
    /// turn once the answer completes. Commit failures are logged and do not
    /// fail the send. A failed answer returns the error and keeps the user
    /// turn; it is not retried.
    pub async fn send(
        &mut self,
        text: &str,
        credential: Option<&Credential>,
        handler: &mut dyn StreamHandler,
        interrupted: &AtomicBool,
    ) -> Result<SendOutcome> {
        let Some(request) = self.begin(text) else {
            tracing::debug!(state = ?self.state, "send rejected");
            return Ok(SendOutcome::Rejected);
        };
        self.persist().await;

        let frames = match self.transport.open(&request, credential).await {
            Ok(frames) => frames,
            Err(err) => {
                handler.on_error(&err);
                self.settle();
                return Err(err);
            }
        };

        let mut tee = Tee {
            partial: &mut self.partial,
            inner: handler,
        };
        match dispatch(frames, &mut tee, interrupted).await {
            StreamOutcome::Completed => {
                let turn = self.complete();
                self.persist().await;
                if self.reconciler.contexts().remove(&self.resolved.session.id).is_some() {
                    self.resolved.context = None;
                }
                Ok(SendOutcome::Answered(turn))
            }
            StreamOutcome::Failed(err) => {
                tracing::warn!(session_id = %self.resolved.session.id, error = %err, "answer failed");
                self.settle();
                Err(err)
            }
            StreamOutcome::Abandoned => {
                tracing::debug!(session_id = %self.resolved.session.id, "answer abandoned");
                self.settle();
                Ok(SendOutcome::Abandoned)
            }
        }
    }

    fn complete(&mut self) -> ChatTurn {
        let turn = ChatTurn::assistant(std::mem::take(&mut self.partial));
        self.resolved.session.push_turn(turn.clone());
        self.state = ControllerState::Idle;
        turn
    }

    fn settle(&mut self) {
        self.partial.clear();
        self.state = ControllerState::Idle;
    }

    async fn persist(&mut self) {
        // Logged by the reconciler; the conversation goes on in memory.
        let _ = self.reconciler.commit(&mut self.resolved.session).await;
    }
}

// Accumulates deltas for the controller while forwarding every event.
struct Tee<'a> {
    partial: &'a mut String,
    inner: &'a mut dyn StreamHandler,
}

impl StreamHandler for Tee<'_> {
    fn on_delta(&mut self, text: &str) {
        self.partial.push_str(text);
        self.inner.on_delta(text);
    }

    fn on_complete(&mut self) {
        self.inner.on_complete();
    }

    fn on_error(&mut self, error: &Error) {
        self.inner.on_error(error);
    }
}
