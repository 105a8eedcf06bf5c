use serde::{Deserialize, Serialize};

/// The JSON payload carried on one `data: ` line of the chat stream.
///
/// Exactly one field is expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FramePayload {
    /// An incremental piece of the answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<String>,

    /// Set when the answer is complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,

    /// Set when the server failed to produce an answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One decoded event of the chat stream.
///
/// A stream carries any number of `ContentDelta` frames followed by exactly
/// one `Completed` or `Failed` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolFrame {
    /// An incremental piece of the answer.
    ContentDelta(String),

    /// The answer is complete.
    Completed,

    /// The server reported an error.
    Failed(String),
}

impl ProtocolFrame {
    /// Returns true if this frame ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProtocolFrame::ContentDelta(_))
    }

    /// Interpret a payload.
    ///
    /// Returns `None` for payloads that carry nothing actionable, such as an
    /// empty chunk or `{"done": false}`.
    pub fn from_payload(payload: FramePayload) -> Option<Self> {
        if let Some(chunk) = payload.chunk.filter(|chunk| !chunk.is_empty()) {
            Some(ProtocolFrame::ContentDelta(chunk))
        } else if payload.done == Some(true) {
            Some(ProtocolFrame::Completed)
        } else {
            payload.error.map(ProtocolFrame::Failed)
        }
    }
}
