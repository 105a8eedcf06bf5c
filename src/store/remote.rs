use super::{SessionStore, ensure_durable, listing};
use crate::{ChatClient, Credential, Result, Session};

/// A session store backed by the chat backend's history endpoints.
///
/// The backend records both turns of an exchange itself whenever the chat
/// endpoint is called with a session id, so `put` only checks the draft
/// invariant. Reads and deletes go over the network and may fail
/// transiently.
#[derive(Debug, Clone)]
pub struct RemoteSessionStore {
    client: ChatClient,
    credential: Option<Credential>,
}

impl RemoteSessionStore {
    /// Creates a store that talks to the backend through `client`.
    pub fn new(client: ChatClient, credential: Option<Credential>) -> Self {
        Self { client, credential }
    }
}

#[async_trait::async_trait]
impl SessionStore for RemoteSessionStore {
    async fn get(&self, session_id: &str) -> Result<Session> {
        self.client
            .get_session(session_id, self.credential.as_ref())
            .await
    }

    async fn list(&self) -> Result<Vec<Session>> {
        let sessions = self.client.list_sessions(self.credential.as_ref()).await?;
        Ok(listing(sessions))
    }

    async fn put(&self, session: Session) -> Result<()> {
        ensure_durable(&session)?;
        tracing::debug!(
            session_id = %session.id,
            turns = session.turns.len(),
            "backend owns session history; nothing to write"
        );
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.client
            .delete_session(session_id, self.credential.as_ref())
            .await
    }

    async fn clear(&self) -> Result<()> {
        self.client
            .delete_all_sessions(self.credential.as_ref())
            .await
    }
}
