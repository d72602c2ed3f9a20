//! Session persistence
//!
//! The session is a single replaceable record: `save` overwrites whatever was
//! there, and there is no delete. The file store keeps it owner-only (0600).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::SessionRecord;
use crate::error::{Error, Result};

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<SessionRecord>>;

    async fn save(&self, record: &SessionRecord) -> Result<()>;
}

/// JSON file on disk, e.g. `~/.agentpay/session.json`
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(unix)]
async fn write_owner_only(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await?;
    // mode() only applies on create; tighten a pre-existing file too
    file.set_permissions(std::fs::Permissions::from_mode(0o600)).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

#[cfg(not(unix))]
async fn write_owner_only(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(path, bytes).await
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<SessionRecord>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Failed to read session file {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        match serde_json::from_slice::<SessionRecord>(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                // Unreadable record: the next establishment overwrites it
                log::warn!(
                    "[SESSION] Ignoring corrupt session file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    async fn save(&self, record: &SessionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let json = serde_json::to_vec_pretty(record)?;
        let temp = self.temp_path();

        write_owner_only(&temp, &json)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write {}: {}", temp.display(), e)))?;

        // Rename is atomic, so readers see the old record or the new one
        tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
            Error::Storage(format!("Failed to replace {}: {}", self.path.display(), e))
        })?;

        log::debug!("[SESSION] Persisted session {} to {}", record.session_id, self.path.display());
        Ok(())
    }
}

/// In-process store for tests and embedders that manage persistence themselves
#[derive(Default)]
pub struct MemorySessionStore {
    record: RwLock<Option<SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: SessionRecord) -> Self {
        Self {
            record: RwLock::new(Some(record)),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<SessionRecord>> {
        Ok(self.record.read().await.clone())
    }

    async fn save(&self, record: &SessionRecord) -> Result<()> {
        *self.record.write().await = Some(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegation::SessionKeypair;

    fn record(id: &str) -> SessionRecord {
        SessionRecord::new(id, "0xabc", &SessionKeypair::generate(), 2_000_000_000_000, 1_000)
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("session.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_round_trip_and_replace() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));

        let first = record("first");
        store.save(&first).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(first));

        let second = record("second");
        store.save(&second).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(second));
        assert!(!store.temp_path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileSessionStore::new(&path);
        store.save(&record("s")).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"not json").unwrap();
        let store = FileSessionStore::new(&path);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemorySessionStore::new();
        assert!(store.load().await.unwrap().is_none());
        store.save(&record("m")).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().session_id, "m");
    }
}
