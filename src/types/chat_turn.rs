use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::TurnRole;
use crate::utils::generate_id;

/// One exchange unit in a session.
///
/// A turn's content only changes while its answer is still streaming; once
/// a turn is committed to a session it is never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Opaque unique identifier.
    pub id: String,

    /// Who produced this turn.
    pub role: TurnRole,

    /// The text of the turn.
    pub content: String,

    /// When the turn was created.
    #[serde(with = "crate::utils::time")]
    pub timestamp: OffsetDateTime,
}

impl ChatTurn {
    /// Create a new turn stamped with a fresh id and the current time.
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            role,
            content: content.into(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }

    /// Returns true if the user wrote this turn.
    pub fn is_user(&self) -> bool {
        self.role == TurnRole::User
    }
}
