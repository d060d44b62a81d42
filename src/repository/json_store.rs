//! JSON document store for the state snapshot.

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use log::debug;
use log::info;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::entity::StateSnapshot;
use crate::repository::StateStore;
use crate::repository::error::StoreError;

/// Stores the whole snapshot as one pretty-printed JSON file.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a reader only ever sees the previous or the new document.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state".to_string());
        self.path
            .with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()))
    }

    async fn ensure_parent(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }
        Ok(())
    }

    async fn write_atomic(&self, bytes: &[u8]) -> Result<(), StoreError> {
        self.ensure_parent().await?;

        let tmp = self.temp_path();
        let result = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::io(&self.path, e));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<StateSnapshot, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "State file {} does not exist. Creating...",
                    self.path.display()
                );
                let snapshot = StateSnapshot::default();
                self.save(&snapshot).await?;
                return Ok(snapshot);
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            debug!("State file {} is empty, using defaults.", self.path.display());
            return Ok(StateSnapshot::default());
        }

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn save(&self, snapshot: &StateSnapshot) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        self.write_atomic(&bytes).await?;
        debug!(
            "Saved state ({} subscribers, lastStatus={}) to {}",
            snapshot.users.len(),
            snapshot.last_status,
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::SubscriberRecord;

    fn temp_store() -> JsonFileStore {
        let dir = std::env::temp_dir().join(format!("cisia-alert-store-{}", Uuid::new_v4()));
        JsonFileStore::new(dir.join("db.json"))
    }

    #[tokio::test]
    async fn test_load_creates_default_document() {
        let store = temp_store();

        let snapshot = store.load().await.unwrap();

        assert_eq!(snapshot, StateSnapshot::default());
        assert!(store.path().exists());
        let _ = std::fs::remove_dir_all(store.path().parent().unwrap());
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_files() {
        let store = temp_store();
        let snapshot = StateSnapshot {
            users: vec![SubscriberRecord::anonymous("1")],
            last_status: true,
        };

        store.save(&snapshot).await.unwrap();
        store.save(&snapshot).await.unwrap();

        let dir = store.path().parent().unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_corrupt_document_is_an_error() {
        let store = temp_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{\"users\": [").unwrap();

        let err = store.load().await.unwrap_err();

        assert!(matches!(err, StoreError::Corrupt { .. }));
        let _ = std::fs::remove_dir_all(store.path().parent().unwrap());
    }
}
