use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::{ChatTurn, DocumentRef};
use crate::utils::generate_id;

/// The title every session carries until its first user turn is committed.
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Derived titles keep at most this many characters of the first user turn.
pub const TITLE_MAX_CHARS: usize = 50;

/// A conversation.
///
/// A session with no turns is a draft; it is never written to a store and
/// never listed. It becomes durable once its first turn is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique and stable for the conversation's lifetime.
    pub id: String,

    /// Display title.
    pub title: String,

    /// Turns in conversation order.
    #[serde(default)]
    pub turns: Vec<ChatTurn>,

    /// The document this session is scoped to, fixed at creation.
    #[serde(
        rename = "documentRef",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub document: Option<DocumentRef>,

    /// When the session was created.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,

    /// Bumped on every turn append.
    #[serde(with = "crate::utils::time")]
    pub updated_at: OffsetDateTime,
}

impl Session {
    /// Create a draft session with the given id.
    pub fn draft(id: impl Into<String>, document: Option<DocumentRef>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: id.into(),
            title: DEFAULT_SESSION_TITLE.to_string(),
            turns: Vec::new(),
            document,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a draft session with a freshly generated id.
    pub fn fresh() -> Self {
        Self::draft(generate_id(), None)
    }

    /// Returns true if no turn has been committed yet.
    pub fn is_draft(&self) -> bool {
        self.turns.is_empty()
    }

    /// Returns true if the session may be persisted and listed.
    pub fn is_durable(&self) -> bool {
        !self.is_draft()
    }

    /// Returns true while the session still shows the placeholder title.
    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_SESSION_TITLE
    }

    /// The first turn written by the user, if any.
    pub fn first_user_turn(&self) -> Option<&ChatTurn> {
        self.turns.iter().find(|turn| turn.is_user())
    }

    /// The title this session should carry given its current turns.
    pub fn derived_title(&self) -> Option<String> {
        self.first_user_turn().map(|turn| derive_title(&turn.content))
    }

    /// The value for the chat request's document filter.
    pub fn document_filter(&self) -> Option<&str> {
        self.document.as_ref().map(|doc| doc.id.as_str())
    }

    /// Append a turn and bump `updated_at`.
    pub fn push_turn(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
        self.touch();
    }

    /// Bump `updated_at` to now.
    pub fn touch(&mut self) {
        let now = OffsetDateTime::now_utc();
        // Clock skew must not move updated_at backwards.
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

/// Build a session title from the text of its first user turn.
///
/// Text longer than [`TITLE_MAX_CHARS`] characters is cut and suffixed with
/// `...`; shorter text is used as is.
pub fn derive_title(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
