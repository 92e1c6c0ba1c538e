use crate::models::SessionRecord;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;

/// Durable home of the session record. Implementations read and write the
/// record as one unit; there is no field-level access.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<SessionRecord>, anyhow::Error>;
    async fn save(&self, record: &SessionRecord) -> Result<(), anyhow::Error>;
    async fn clear(&self) -> Result<(), anyhow::Error>;
}

/// Stores the record as JSON in a single file. Writes go to a sibling temp
/// file that is renamed over the target, so a reader sees either the old
/// record or the new one.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<SessionRecord>, anyhow::Error> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to read session file {}: {}",
                    self.path.display(),
                    e
                ));
            }
        };

        match serde_json::from_slice::<SessionRecord>(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                // An unreadable record is as good as no record.
                tracing::warn!(path = %self.path.display(), error = %e, "Discarding corrupt session file");
                self.clear().await?;
                Ok(None)
            }
        }
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), anyhow::Error> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", parent.display(), e))?;
        }

        let body = serde_json::to_vec(record)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, body)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", temp.display(), e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to replace {}: {}", self.path.display(), e))?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), anyhow::Error> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::anyhow!(
                "Failed to remove session file {}: {}",
                self.path.display(),
                e
            )),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    record: Mutex<Option<SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: SessionRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<SessionRecord>, anyhow::Error> {
        let record = self
            .record
            .lock()
            .map_err(|e| anyhow::anyhow!("Session store mutex poisoned: {}", e))?
            .clone();
        Ok(record)
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), anyhow::Error> {
        *self
            .record
            .lock()
            .map_err(|e| anyhow::anyhow!("Session store mutex poisoned: {}", e))? =
            Some(record.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), anyhow::Error> {
        self.record
            .lock()
            .map_err(|e| anyhow::anyhow!("Session store mutex poisoned: {}", e))?
            .take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, User};

    fn record(token: &str) -> SessionRecord {
        SessionRecord {
            user: User {
                id: "1".into(),
                email: "ana@sas.org".into(),
                display_name: "Ana".into(),
                role: Role::Admin,
            },
            access_token: token.into(),
            refresh_token: format!("{token}-refresh"),
            expires_at: 1_000,
        }
    }

    #[tokio::test]
    async fn file_store_round_trips_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));

        assert_eq!(store.load().await.unwrap(), None);

        store.save(&record("first")).await.unwrap();
        store.save(&record("second")).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(record("second")));
        assert!(!store.temp_path().exists());

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, br#"{"token": "orphan"}"#).unwrap();

        let store = FileSessionStore::new(&path);
        assert_eq!(store.load().await.unwrap(), None);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn memory_store_clear_empties_record() {
        let store = MemorySessionStore::with_record(record("a"));
        assert!(store.load().await.unwrap().is_some());
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }
}
