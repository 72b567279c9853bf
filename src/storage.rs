//! Photo storage.
//!
//! Photos are written as soon as they arrive so a session only keeps
//! storage keys. Everything a session stored lives under its scope and is
//! released in one call when the session ends.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use crate::models::Category;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Photo storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Photo not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Where one photo goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoKey<'a> {
    pub scope: &'a str,
    pub category: Category,
    pub sequence: u32,
}

pub trait PhotoStore: Send + Sync {
    /// Persist a photo and return its storage key.
    fn store(&self, key: &PhotoKey<'_>, bytes: &[u8]) -> Result<String, StorageError>;

    fn load(&self, storage_key: &str) -> Result<Vec<u8>, StorageError>;

    /// Drop a single photo. Missing photos are not an error.
    fn remove(&self, storage_key: &str) -> Result<(), StorageError>;

    /// Drop every photo stored under `scope`.
    fn release_session(&self, scope: &str) -> Result<(), StorageError>;
}

/// Detect file extension from magic bytes.
fn detect_extension(bytes: &[u8]) -> &'static str {
    if bytes.len() >= 3 && bytes[0..3] == [0xFF, 0xD8, 0xFF] {
        "jpg"
    } else if bytes.len() >= 8 && bytes[0..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]
    {
        "png"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "webp"
    } else {
        "jpg"
    }
}

fn file_name(key: &PhotoKey<'_>, bytes: &[u8]) -> String {
    format!("{}_{}.{}", key.category, key.sequence, detect_extension(bytes))
}

// ──────────────────────────────────────────────
// Filesystem store
// ──────────────────────────────────────────────

/// Stores photos as `<root>/<scope>/<category>_<sequence>.<ext>`.
pub struct FsPhotoStore {
    root: PathBuf,
}

impl FsPhotoStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove session folders left behind by a previous run. Sessions live
    /// in memory, so at startup every folder is orphaned.
    pub fn cleanup_orphaned(&self) -> Result<usize, StorageError> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(entry.path())?;
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(removed, "Cleaned orphaned photo folders");
        }
        Ok(removed)
    }

    fn resolve(&self, storage_key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(storage_key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || storage_key.is_empty() {
            return Err(StorageError::InvalidKey(storage_key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl PhotoStore for FsPhotoStore {
    fn store(&self, key: &PhotoKey<'_>, bytes: &[u8]) -> Result<String, StorageError> {
        let storage_key = format!("{}/{}", key.scope, file_name(key, bytes));
        let path = self.resolve(&storage_key)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&path, bytes)?;

        tracing::debug!(
            scope = key.scope,
            category = %key.category,
            sequence = key.sequence,
            size = bytes.len(),
            "Photo stored"
        );
        Ok(storage_key)
    }

    fn load(&self, storage_key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(storage_key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, storage_key: &str) -> Result<(), StorageError> {
        let path = self.resolve(storage_key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn release_session(&self, scope: &str) -> Result<(), StorageError> {
        let dir = self.resolve(scope)?;
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::debug!(scope, "Session photos released");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ──────────────────────────────────────────────
// In-memory store
// ──────────────────────────────────────────────

/// Keeps photos in memory. Used by tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryPhotoStore {
    photos: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryPhotoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.photos.lock().map(|p| p.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_photos<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Vec<u8>>) -> T,
    ) -> Result<T, StorageError> {
        let mut photos = self
            .photos
            .lock()
            .map_err(|_| StorageError::Io(std::io::Error::other("photo store lock poisoned")))?;
        Ok(f(&mut photos))
    }
}

impl PhotoStore for MemoryPhotoStore {
    fn store(&self, key: &PhotoKey<'_>, bytes: &[u8]) -> Result<String, StorageError> {
        let storage_key = format!("{}/{}", key.scope, file_name(key, bytes));
        self.with_photos(|photos| photos.insert(storage_key.clone(), bytes.to_vec()))?;
        Ok(storage_key)
    }

    fn load(&self, storage_key: &str) -> Result<Vec<u8>, StorageError> {
        self.with_photos(|photos| photos.get(storage_key).cloned())?
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    fn remove(&self, storage_key: &str) -> Result<(), StorageError> {
        self.with_photos(|photos| photos.remove(storage_key))?;
        Ok(())
    }

    fn release_session(&self, scope: &str) -> Result<(), StorageError> {
        let prefix = format!("{scope}/");
        self.with_photos(|photos| photos.retain(|k, _| !k.starts_with(&prefix)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    fn key(scope: &str, category: Category, sequence: u32) -> PhotoKey<'_> {
        PhotoKey {
            scope,
            category,
            sequence,
        }
    }

    #[test]
    fn fs_store_writes_under_scope() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPhotoStore::new(dir.path()).unwrap();

        let storage_key = store.store(&key("chat-1-ab", Category::Facade, 2), JPEG).unwrap();

        assert_eq!(storage_key, "chat-1-ab/facade_2.jpg");
        assert!(dir.path().join("chat-1-ab/facade_2.jpg").exists());
        assert_eq!(store.load(&storage_key).unwrap(), JPEG);
    }

    #[test]
    fn fs_release_removes_only_that_scope() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPhotoStore::new(dir.path()).unwrap();
        let a = store.store(&key("a", Category::Roof, 1), JPEG).unwrap();
        let b = store.store(&key("b", Category::Roof, 1), JPEG).unwrap();

        store.release_session("a").unwrap();

        assert!(matches!(store.load(&a), Err(StorageError::NotFound(_))));
        assert!(store.load(&b).is_ok());
        // Releasing twice is harmless.
        store.release_session("a").unwrap();
    }

    #[test]
    fn fs_remove_single_photo() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPhotoStore::new(dir.path()).unwrap();
        let k = store.store(&key("s", Category::Walls, 1), JPEG).unwrap();
        store.remove(&k).unwrap();
        store.remove(&k).unwrap();
        assert!(store.load(&k).is_err());
    }

    #[test]
    fn fs_rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPhotoStore::new(dir.path()).unwrap();
        assert!(matches!(
            store.load("../secret.jpg"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.release_session("/"),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn fs_cleanup_removes_leftover_folders() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPhotoStore::new(dir.path()).unwrap();
        store.store(&key("old-1", Category::Roof, 1), JPEG).unwrap();
        store.store(&key("old-2", Category::Roof, 1), JPEG).unwrap();

        assert_eq!(store.cleanup_orphaned().unwrap(), 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn memory_store_release_by_prefix() {
        let store = MemoryPhotoStore::new();
        let a = store.store(&key("a", Category::IdCard, 1), JPEG).unwrap();
        store.store(&key("ab", Category::IdCard, 1), JPEG).unwrap();
        assert_eq!(store.len(), 2);

        store.release_session("a").unwrap();

        assert_eq!(store.len(), 1);
        assert!(matches!(store.load(&a), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn extension_follows_content() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00];
        assert_eq!(detect_extension(&png), "png");
        assert_eq!(detect_extension(JPEG), "jpg");
        assert_eq!(detect_extension(b"unknown"), "jpg");
    }
}
