//! Object storage on the local filesystem: one file per key.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

use super::ObjectStore;

/// Stores each object as `<root>/<key>`.
///
/// The content type is not persisted; it is implied by the key's extension.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path, rejecting anything but a plain file name.
    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let mut components = Path::new(key).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self.root.join(name)),
            _ => Err(StoreError::Backend(format!("invalid object key: {key:?}"))),
        }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(key.to_string())
            } else {
                StoreError::Io(e)
            }
        })
    }

    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&path, bytes).await?;
        tracing::trace!("Stored {key} ({content_type}, {} bytes)", bytes.len());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().join("objects"));

        assert!(!store.exists("x.png").await.unwrap());
        store.put("x.png", b"data", "image/png").await.unwrap();
        assert!(store.exists("x.png").await.unwrap());
        assert_eq!(store.get("x.png").await.unwrap(), b"data");

        store.delete("x.png").await.unwrap();
        assert!(!store.exists("x.png").await.unwrap());
        store.delete("x.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_fs_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        assert!(matches!(
            store.get("nope.gif").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fs_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        for key in ["../escape.png", "a/b.png", "/etc/passwd", "", ".."] {
            assert!(store.put(key, b"x", "image/png").await.is_err(), "{key:?}");
        }
    }
}
