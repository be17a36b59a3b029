use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StateError;

/// Last observed delivery status per order identifier.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    /// Map of order identifier → delivery status
    pub entries: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|s| s.as_str())
    }

    pub fn set(&mut self, id: String, status: String) {
        self.entries.insert(id, status);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, StateError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Result of reading the snapshot file.
#[derive(Debug)]
pub enum SnapshotLoad {
    Loaded(Snapshot),
    Absent,
    Corrupt { reason: String },
}

/// File-backed snapshot persistence. Reads and writes never fail the caller.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn try_load(&self) -> SnapshotLoad {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return SnapshotLoad::Absent,
            Err(e) => {
                return SnapshotLoad::Corrupt {
                    reason: e.to_string(),
                };
            }
        };
        match Snapshot::from_bytes(&data) {
            Ok(snapshot) => SnapshotLoad::Loaded(snapshot),
            Err(e) => SnapshotLoad::Corrupt {
                reason: e.to_string(),
            },
        }
    }

    /// Load the snapshot, falling back to an empty one when the file is
    /// missing or unreadable.
    pub async fn load(&self) -> Snapshot {
        match self.try_load().await {
            SnapshotLoad::Loaded(snapshot) => {
                info!(path = %self.path.display(), orders = snapshot.len(), "State loaded");
                snapshot
            }
            SnapshotLoad::Absent => {
                warn!(path = %self.path.display(), "No state file, starting empty");
                Snapshot::new()
            }
            SnapshotLoad::Corrupt { reason } => {
                warn!(path = %self.path.display(), %reason, "State file unreadable, starting empty");
                Snapshot::new()
            }
        }
    }

    /// Rewrite the snapshot file. Writes to a sibling temp file first and
    /// renames it over the target.
    pub async fn try_save(&self, snapshot: &Snapshot) -> Result<(), StateError> {
        let data = snapshot.to_bytes()?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), orders = snapshot.len(), "State saved");
        Ok(())
    }

    /// Persist the snapshot, logging instead of failing. Returns whether the
    /// write succeeded.
    pub async fn save(&self, snapshot: &Snapshot) -> bool {
        match self.try_save(snapshot).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to save state, will retry next cycle");
                false
            }
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("sent.json"));

        assert!(matches!(store.try_load().await, SnapshotLoad::Absent));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sent.json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = StateStore::new(&path);

        assert!(matches!(
            store.try_load().await,
            SnapshotLoad::Corrupt { .. }
        ));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn wrong_shape_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sent.json");
        std::fs::write(&path, br#"["SO-1", "SO-2"]"#).unwrap();

        assert!(matches!(
            StateStore::new(&path).try_load().await,
            SnapshotLoad::Corrupt { .. }
        ));
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested/state/sent.json"));
        let snapshot: Snapshot = [("SO-100", "not-shipped"), ("SO-101", "shipping")]
            .into_iter()
            .collect();

        assert!(store.save(&snapshot).await);
        assert_eq!(store.load().await, snapshot);
        assert!(!dir.path().join("nested/state/sent.json.tmp").exists());
    }

    #[tokio::test]
    async fn file_is_a_flat_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sent.json");
        let store = StateStore::new(&path);
        let snapshot: Snapshot = [("SO-100", "not-shipped")].into_iter().collect();
        store.save(&snapshot).await;

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"SO-100": "not-shipped"}));
    }

    #[tokio::test]
    async fn save_failure_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in place of the file makes the rename fail.
        let path = dir.path().join("sent.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), b"x").unwrap();
        let store = StateStore::new(&path);

        assert!(!store.save(&Snapshot::new()).await);
        assert!(store.try_save(&Snapshot::new()).await.is_err());
    }
}
