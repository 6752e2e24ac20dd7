//! Persistent cache of extracted page text, keyed by a SHA-256 of the URL.
//!
//! Entries are immutable once written. There is no locking: two tasks
//! extracting the same new URL may both write, and the last rename wins.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use newsrag_shared::{NewsRagError, Result};

use crate::write_atomic;

/// Extension used for cache entries.
const ENTRY_EXT: &str = "txt";

/// Key/value store for extracted text.
pub trait ContentCache: Send + Sync {
    /// Look up cached text by key hash.
    fn get(&self, key: &str) -> Option<String>;

    /// Store text under a key hash, replacing any previous entry.
    fn put(&self, key: &str, text: &str) -> Result<()>;
}

/// Stable cache key for a URL: lowercase hex SHA-256.
pub fn cache_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Directory-backed cache: `<dir>/<key>.txt` per entry.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    ttl: Option<Duration>,
}

impl FileCache {
    /// Open (and create if needed) a cache rooted at `dir`. Entries never expire.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| NewsRagError::io(&dir, e))?;
        Ok(Self { dir, ttl: None })
    }

    /// Treat entries older than `ttl` (by modification time) as misses.
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Cache root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{ENTRY_EXT}"))
    }

    fn is_expired(&self, path: &Path) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        let modified = std::fs::metadata(path).and_then(|m| m.modified());
        match modified {
            Ok(modified) => SystemTime::now()
                .duration_since(modified)
                .map(|age| age > ttl)
                .unwrap_or(false),
            Err(_) => true,
        }
    }

    /// All live entries as `(file name, text)`, sorted by file name.
    pub fn entries(&self) -> Result<Vec<(String, String)>> {
        let read_dir = std::fs::read_dir(&self.dir).map_err(|e| NewsRagError::io(&self.dir, e))?;

        let mut entries = Vec::new();
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            if self.is_expired(&path) {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    entries.push((name, text));
                }
                Err(e) => warn!(path = %path.display(), error = %e, "unreadable cache entry"),
            }
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}

impl ContentCache for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.entry_path(key);
        if !path.exists() || self.is_expired(&path) {
            return None;
        }
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                debug!(key, "cache hit");
                Some(text)
            }
            Err(e) => {
                warn!(key, error = %e, "failed to read cache entry");
                None
            }
        }
    }

    fn put(&self, key: &str, text: &str) -> Result<()> {
        write_atomic(&self.entry_path(key), text.as_bytes())?;
        debug!(key, len = text.len(), "cache entry written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_dir;

    #[test]
    fn key_is_stable_sha256() {
        let key = cache_key("hello world");
        assert_eq!(key.len(), 64);
        assert_eq!(
            key,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_ne!(cache_key("https://a.dev/1"), cache_key("https://a.dev/2"));
    }

    #[test]
    fn put_then_get() {
        let dir = test_dir("cache");
        let cache = FileCache::open(&dir).unwrap();
        let key = cache_key("https://openai.com/blog/post");

        assert!(cache.get(&key).is_none());
        cache.put(&key, "Title: Post\n\nbody").unwrap();
        assert_eq!(cache.get(&key).as_deref(), Some("Title: Post\n\nbody"));

        // Last write wins
        cache.put(&key, "second").unwrap();
        assert_eq!(cache.get(&key).as_deref(), Some("second"));

        let entries = cache.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, format!("{key}.txt"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn zero_ttl_expires_everything() {
        let dir = test_dir("cache-ttl");
        let cache = FileCache::open(&dir).unwrap();
        cache.put("k", "text").unwrap();
        assert!(cache.get("k").is_some());

        std::thread::sleep(Duration::from_millis(20));
        let expiring = cache.clone().with_ttl(Some(Duration::from_millis(1)));
        assert!(expiring.get("k").is_none());
        assert!(expiring.entries().unwrap().is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn entries_ignore_temp_and_foreign_files() {
        let dir = test_dir("cache-entries");
        let cache = FileCache::open(&dir).unwrap();
        cache.put("b", "two").unwrap();
        cache.put("a", "one").unwrap();
        std::fs::write(dir.join("notes.md"), "ignored").unwrap();

        let entries = cache.entries().unwrap();
        let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
