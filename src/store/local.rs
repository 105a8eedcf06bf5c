use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{SessionStore, ensure_durable, listing};
use crate::{Error, Result, Session};

/// Name of the session file inside the data directory.
pub const SESSIONS_FILE: &str = "chat_sessions.json";

const FORMAT_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
struct SessionsFile {
    version: u8,
    sessions: Vec<Session>,
}

/// A session store kept in a JSON file on local disk.
///
/// The file is rewritten whole on every change, through a temporary file
/// and a rename so a crash never leaves half a file behind. An unreadable
/// file is moved aside and treated as empty.
#[derive(Debug)]
pub struct LocalSessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LocalSessionStore {
    /// Opens the store in `data_dir`, creating the directory if needed.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir).await.map_err(|err| {
            Error::io(
                format!("failed to create data directory {}", data_dir.display()),
                err,
            )
        })?;
        Ok(Self {
            path: data_dir.join(SESSIONS_FILE),
            lock: Mutex::new(()),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Session>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(Error::io(
                    format!("failed to read {}", self.path.display()),
                    err,
                ));
            }
        };
        match serde_json::from_slice::<SessionsFile>(&bytes) {
            Ok(file) if file.version == FORMAT_VERSION => Ok(file.sessions),
            Ok(file) => {
                tracing::warn!(
                    path = %self.path.display(),
                    version = file.version,
                    "unsupported session file version; starting empty"
                );
                self.quarantine().await;
                Ok(Vec::new())
            }
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "session file is unreadable; starting empty"
                );
                self.quarantine().await;
                Ok(Vec::new())
            }
        }
    }

    async fn quarantine(&self) {
        let aside = self.path.with_extension("json.corrupt");
        if let Err(err) = tokio::fs::rename(&self.path, &aside).await {
            tracing::warn!(path = %self.path.display(), error = %err, "could not move session file aside");
        }
    }

    async fn save(&self, sessions: Vec<Session>) -> Result<()> {
        let file = SessionsFile {
            version: FORMAT_VERSION,
            sessions,
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(|err| {
            Error::serialization("failed to serialize sessions", Some(Box::new(err)))
        })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|err| Error::io(format!("failed to write {}", tmp.display()), err))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|err| Error::io(format!("failed to replace {}", self.path.display()), err))
    }
}

#[async_trait::async_trait]
impl SessionStore for LocalSessionStore {
    async fn get(&self, session_id: &str) -> Result<Session> {
        let _guard = self.lock.lock().await;
        self.load()
            .await?
            .into_iter()
            .find(|session| session.id == session_id && session.is_durable())
            .ok_or_else(|| Error::session_not_found(session_id))
    }

    async fn list(&self) -> Result<Vec<Session>> {
        let _guard = self.lock.lock().await;
        Ok(listing(self.load().await?))
    }

    async fn put(&self, session: Session) -> Result<()> {
        ensure_durable(&session)?;
        let _guard = self.lock.lock().await;
        let mut sessions = self.load().await?;
        match sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session,
            None => sessions.insert(0, session),
        }
        self.save(sessions).await
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut sessions = self.load().await?;
        let before = sessions.len();
        sessions.retain(|session| session.id != session_id);
        if sessions.len() == before {
            return Ok(());
        }
        self.save(sessions).await
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.save(Vec::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChatTurn, DocumentRef};

    fn durable(id: &str) -> Session {
        let mut session = Session::draft(id, Some(DocumentRef::new("d1", "Doc")));
        session.push_turn(ChatTurn::user("question"));
        session.push_turn(ChatTurn::assistant("answer"));
        session
    }

    #[tokio::test]
    async fn survives_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalSessionStore::open(dir.path()).await.unwrap();
        let session = durable("s1");
        store.put(session.clone()).await.unwrap();
        drop(store);

        let store = LocalSessionStore::open(dir.path()).await.unwrap();
        let loaded = store.get("s1").await.unwrap();
        assert_eq!(loaded.turns, session.turns);
        assert_eq!(loaded.document, session.document);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn put_replaces_existing_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalSessionStore::open(dir.path()).await.unwrap();
        let mut session = durable("s1");
        store.put(session.clone()).await.unwrap();
        session.push_turn(ChatTurn::user("follow-up"));
        store.put(session.clone()).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].turns.len(), 3);
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalSessionStore::open(dir.path().join("nested")).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.get("nope").await.unwrap_err().is_not_found());
        tokio_test::assert_ok!(store.delete("nope").await);
    }

    #[tokio::test]
    async fn corrupt_file_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalSessionStore::open(dir.path()).await.unwrap();
        tokio::fs::write(store.path(), b"{ not json").await.unwrap();

        assert!(store.list().await.unwrap().is_empty());
        assert!(dir.path().join("chat_sessions.json.corrupt").exists());

        store.put(durable("s1")).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalSessionStore::open(dir.path()).await.unwrap();
        store.put(durable("a")).await.unwrap();
        store.put(durable("b")).await.unwrap();
        store.delete("a").await.unwrap();
        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["b"]);
        store.clear().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn drafts_are_never_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalSessionStore::open(dir.path()).await.unwrap();
        tokio_test::assert_err!(store.put(Session::fresh()).await);
        assert!(!store.path().exists());
    }
}
