// Public modules
pub mod api_session;
pub mod chat_request;
pub mod chat_turn;
pub mod credential;
pub mod document_ref;
pub mod embedded_document;
pub mod protocol_frame;
pub mod session;
pub mod session_context;
pub mod turn_role;

// Re-exports
pub use api_session::{
    ApiChatMessage, ApiChatSession, CreateSessionRequest, CreateSessionResponse,
    sessions_from_history,
};
pub use chat_request::ChatRequest;
pub use chat_turn::ChatTurn;
pub use credential::Credential;
pub use document_ref::DocumentRef;
pub use embedded_document::{DocumentListResponse, EmbeddedDocument};
pub use protocol_frame::{FramePayload, ProtocolFrame};
pub use session::{DEFAULT_SESSION_TITLE, Session, TITLE_MAX_CHARS, derive_title};
pub use session_context::SessionContext;
pub use turn_role::{TurnRole, TurnRoleParseError};
