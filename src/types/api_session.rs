use serde::{Deserialize, Serialize};

use crate::types::{ChatTurn, DocumentRef, Session, TurnRole};
use crate::utils::generate_id;
use crate::utils::time::parse_lenient;

/// A message as the backend stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiChatMessage {
    /// `user`, `assistant` or `system`.
    pub role: String,

    /// Message text.
    pub content: String,

    /// ISO-8601 timestamp, possibly without an offset.
    pub timestamp: String,
}

/// A session as the backend returns it from its history endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiChatSession {
    /// Session identifier.
    pub session_id: String,

    /// Owner of the session.
    #[serde(default)]
    pub user_id: Option<String>,

    /// Display title.
    pub title: String,

    /// The stored messages.
    #[serde(default)]
    pub messages: Vec<ApiChatMessage>,

    /// Document used for context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,

    /// Document name for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,

    /// ISO-8601 creation time.
    pub created_at: String,

    /// ISO-8601 last-update time.
    pub updated_at: String,
}

impl ApiChatSession {
    /// Convert into a domain session.
    ///
    /// The backend does not store turn ids, so fresh ones are minted. Roles
    /// the client does not know are read as `system`, and timestamps that
    /// fail to parse are read as the session's update time.
    pub fn into_session(self) -> crate::Result<Session> {
        let created_at = parse_lenient(&self.created_at).map_err(|e| {
            crate::Error::serialization(
                format!("invalid created_at {:?}: {e}", self.created_at),
                Some(Box::new(e)),
            )
        })?;
        let updated_at = parse_lenient(&self.updated_at).unwrap_or(created_at);
        let turns = self
            .messages
            .into_iter()
            .map(|message| ChatTurn {
                id: generate_id(),
                role: message.role.parse().unwrap_or(TurnRole::System),
                content: message.content,
                timestamp: parse_lenient(&message.timestamp).unwrap_or(updated_at),
            })
            .collect();
        Ok(Session {
            id: self.session_id,
            title: self.title,
            turns,
            document: DocumentRef::from_parts(self.document_id, self.document_name),
            created_at,
            updated_at,
        })
    }
}

/// Convert a history listing, dropping records that cannot be converted.
pub fn sessions_from_history(sessions: Vec<ApiChatSession>) -> Vec<Session> {
    sessions
        .into_iter()
        .filter_map(|api| {
            let session_id = api.session_id.clone();
            match api.into_session() {
                Ok(session) => Some(session),
                Err(error) => {
                    tracing::warn!(session_id = %session_id, %error, "skipping unreadable backend session");
                    None
                }
            }
        })
        .collect()
}

/// Body of a session creation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    /// Document scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,

    /// Document name for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,

    /// Initial title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl CreateSessionRequest {
    /// A request scoped to `document`.
    pub fn for_document(document: &DocumentRef) -> Self {
        Self {
            document_id: Some(document.id.clone()),
            document_name: Some(document.name.clone()),
            title: None,
        }
    }
}

/// The descriptor returned after creating a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    /// The new session's id.
    pub session_id: String,

    /// Its initial title.
    pub title: String,

    /// Document scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,

    /// Document name for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,

    /// ISO-8601 creation time.
    pub created_at: String,
}
