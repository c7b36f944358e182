//! Persistence backends for cached documents
//!
//! A [`CacheStore`] holds whole JSON documents by key. The cache manager and
//! the catalog only ever replace documents in full.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;

/// Key-value storage for serialized documents
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Reads the document stored under `key`
    ///
    /// Returns `Ok(None)` when no document exists.
    async fn read(&self, key: &str) -> io::Result<Option<String>>;

    /// Replaces the document stored under `key`
    async fn write(&self, key: &str, contents: &str) -> io::Result<()>;

    /// Removes the document stored under `key`; a missing key is not an error
    async fn remove(&self, key: &str) -> io::Result<()>;
}

/// Distinguishes temp files of concurrent writes within this process
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Stores each document as `<dir>/<key>.json`
///
/// Writes go to a temporary sibling file that is then renamed over the
/// target, so readers see either the previous or the new document.
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Directory where cache files are stored
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the cache files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path to the file for the given key
    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

/// Restricts keys to characters that are safe in file names
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl CacheStore for FileStore {
    async fn read(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write(&self, key: &str, contents: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.path(key);
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp_path = path.with_extension(format!("json.{}.{}.tmp", std::process::id(), seq));
        fs::write(&tmp_path, contents).await?;

        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path(key)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// In-process document store
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, contents: &str) -> io::Result<()> {
        self.documents
            .write()
            .await
            .insert(key.to_string(), contents.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> io::Result<()> {
        self.documents.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::new(temp_dir.path());
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_write_creates_file_in_store_directory() {
        let (store, temp_dir) = create_test_store();

        store.write("cards", "{\"a\":1}").await.expect("Write should succeed");

        let expected_path = temp_dir.path().join("cards.json");
        assert!(expected_path.exists(), "Cache file should exist");
        let content = std::fs::read_to_string(expected_path).unwrap();
        assert_eq!(content, "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let (store, temp_dir) = create_test_store();

        store.write("cards", "first").await.unwrap();
        store.write("cards", "second").await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1, "Only the final document should remain");
        assert_eq!(store.read("cards").await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_read_returns_none_for_missing_key() {
        let (store, _temp_dir) = create_test_store();

        assert!(store.read("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_creates_directory_if_missing() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir.path().join("nested").join("cache");
        let store = FileStore::new(nested_path.clone());

        store.write("cards", "[]").await.expect("Write should succeed");

        assert!(nested_path.join("cards.json").exists());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (store, _temp_dir) = create_test_store();
        store.write("cards", "[]").await.unwrap();

        store.remove("cards").await.expect("First remove should succeed");
        store.remove("cards").await.expect("Second remove should succeed");

        assert!(store.read("cards").await.unwrap().is_none());
    }

    #[test]
    fn test_keys_are_sanitized_into_file_names() {
        let store = FileStore::new("/tmp/cardwise");
        assert_eq!(
            store.path("card_../../etc"),
            PathBuf::from("/tmp/cardwise/card_______etc.json")
        );
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip_and_remove() {
        let store = MemoryStore::new();

        store.write("k", "v").await.unwrap();
        assert_eq!(store.read("k").await.unwrap().as_deref(), Some("v"));

        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();
        assert!(store.read("k").await.unwrap().is_none());
    }
}
