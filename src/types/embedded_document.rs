use serde::{Deserialize, Serialize};

use crate::types::DocumentRef;

/// A document the backend has chunked and embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedDocument {
    /// File name, also used as the document's identifier.
    pub document_name: String,

    /// Number of embedded chunks.
    pub chunk_count: u64,

    /// ISO-8601 upload time.
    pub uploaded_at: String,

    /// Size in bytes.
    pub file_size: u64,
}

impl EmbeddedDocument {
    /// The opaque reference used to scope a session to this document.
    pub fn to_ref(&self) -> DocumentRef {
        DocumentRef::new(self.document_name.clone(), self.document_name.clone())
    }
}

/// Response of the document catalog endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentListResponse {
    /// The documents.
    #[serde(default)]
    pub documents: Vec<EmbeddedDocument>,

    /// Total count reported by the backend.
    #[serde(default)]
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_list_deserialization() {
        let list: DocumentListResponse = serde_json::from_value(json!({
            "documents": [{
                "document_name": "handbook.pdf",
                "chunk_count": 42,
                "uploaded_at": "2024-05-01T10:00:00",
                "file_size": 1024
            }],
            "total": 1
        }))
        .unwrap();
        assert_eq!(list.total, 1);
        assert_eq!(list.documents[0].chunk_count, 42);
        assert_eq!(
            list.documents[0].to_ref(),
            DocumentRef::new("handbook.pdf", "handbook.pdf")
        );
    }

    #[test]
    fn missing_documents_field_is_empty() {
        let list: DocumentListResponse = serde_json::from_value(json!({})).unwrap();
        assert!(list.documents.is_empty());
    }
}
