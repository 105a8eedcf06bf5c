use serde::{Deserialize, Serialize};

/// A reference to an embedded document that a session is scoped to.
///
/// The client treats the reference as an opaque pair: the id is passed to
/// the backend as the document filter and the name is shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Identifier used as the backend's document filter.
    pub id: String,

    /// Display name.
    pub name: String,
}

impl DocumentRef {
    /// Create a new `DocumentRef`.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Build a reference from the two optional halves the backend returns.
    ///
    /// A missing name falls back to the id.
    pub fn from_parts(id: Option<String>, name: Option<String>) -> Option<Self> {
        match (id, name) {
            (Some(id), Some(name)) => Some(Self { id, name }),
            (Some(id), None) => Some(Self {
                name: id.clone(),
                id,
            }),
            (None, Some(name)) => Some(Self {
                id: name.clone(),
                name,
            }),
            (None, None) => None,
        }
    }
}
