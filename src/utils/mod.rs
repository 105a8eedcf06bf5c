//! Small helpers shared across the crate.

pub mod time;

/// Generate a fresh opaque identifier for a session or turn.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
