use serde::{Deserialize, Serialize};

/// Body of a streaming chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's question.
    pub query: String,

    /// Restricts retrieval to one document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_filter: Option<String>,

    /// Whether the backend should ground the answer in retrieved context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_context: Option<bool>,

    /// The session the exchange belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Token budget for the answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Create a request carrying only a query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            document_filter: None,
            use_context: None,
            session_id: None,
            max_tokens: None,
        }
    }

    /// Sets the document filter.
    pub fn with_document_filter(mut self, document_filter: Option<String>) -> Self {
        self.document_filter = document_filter;
        self
    }

    /// Sets whether retrieved context is used.
    pub fn with_use_context(mut self, use_context: bool) -> Self {
        self.use_context = Some(use_context);
        self
    }

    /// Sets the session id.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets the token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn minimal_request_serialization() {
        let request = ChatRequest::new("hi");
        assert_eq!(to_value(&request).unwrap(), json!({"query": "hi"}));
    }

    #[test]
    fn full_request_serialization() {
        let request = ChatRequest::new("What is in the report?")
            .with_document_filter(Some("report.pdf".to_string()))
            .with_use_context(true)
            .with_session_id("s1")
            .with_max_tokens(500);
        assert_eq!(
            to_value(&request).unwrap(),
            json!({
                "query": "What is in the report?",
                "document_filter": "report.pdf",
                "use_context": true,
                "session_id": "s1",
                "max_tokens": 500
            })
        );
    }
}
