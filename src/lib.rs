// Public modules
pub mod chat;
pub mod client;
pub mod context;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod reconcile;
pub mod render;
pub mod sse;
pub mod store;
pub mod types;
pub mod utils;

mod observability;

// Re-exports
pub use client::{ChatClient, ChatTransport, DEFAULT_API_URL, FrameStream};
pub use context::EphemeralContexts;
pub use controller::{
    ControllerState, Conversation, ConversationOptions, DEFAULT_MAX_TOKENS, SendOutcome,
};
pub use dispatch::{StreamHandler, StreamOutcome, dispatch};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use reconcile::{ResolvedSession, SessionOrigin, SessionReconciler};
pub use render::{PlainTextRenderer, Renderer, StreamPrinter};
pub use sse::{FrameDecoder, process_frames};
pub use store::{LocalSessionStore, MemorySessionStore, RemoteSessionStore, SessionStore};
pub use types::*;
