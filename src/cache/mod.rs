//! Disk cache for response bodies.
//!
//! One file per URL, named by the hex SHA-256 of the URL and holding the raw
//! bytes as received. The store is bounded by file count: after every write
//! the oldest files are deleted until at most `max_files` remain.

use std::collections::VecDeque;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::app::{FetchError, Result};

const TEMP_SUFFIX: &str = ".part";

/// A cached file as reported by [`CacheStore::entries`].
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

pub struct CacheStore {
    dir: PathBuf,
    max_files: usize,
    /// File names, oldest first.
    order: Mutex<VecDeque<String>>,
}

impl CacheStore {
    /// Opens (creating if needed) a cache directory. Existing files are
    /// ordered by modification time, oldest first.
    pub fn open<P: AsRef<Path>>(dir: P, max_files: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut found: Vec<(SystemTime, String)> = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_cache_name(&name) {
                continue;
            }
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            found.push((meta.modified()?, name));
        }
        found.sort();

        debug!("Opened cache at {} with {} files", dir.display(), found.len());

        Ok(Self {
            dir,
            max_files,
            order: Mutex::new(found.into_iter().map(|(_, name)| name).collect()),
        })
    }

    /// Stable file name for a URL.
    pub fn filename_for(url: &str) -> String {
        hex::encode(Sha256::digest(url.as_bytes()))
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(Self::filename_for(url))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    pub fn has(&self, url: &str) -> bool {
        self.path_for(url).is_file()
    }

    /// Returns the cached bytes, or `None` when the URL is not cached.
    pub fn read(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(url);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Removed behind our back; keep the index honest. A write may
                // have landed since the failed read, so recheck under the lock.
                let mut order = self.lock()?;
                if !path.is_file() {
                    let name = Self::filename_for(url);
                    order.retain(|n| *n != name);
                }
                Ok(None)
            }
            Err(e) => Err(cache_io("read", &path, e)),
        }
    }

    /// Stores `bytes` for `url` as the newest entry, then evicts down to
    /// capacity. The write and the eviction happen under one lock.
    pub fn write(&self, url: &str, bytes: &[u8]) -> Result<()> {
        let name = Self::filename_for(url);
        let path = self.dir.join(&name);
        let temp = self.dir.join(format!("{}{}", name, TEMP_SUFFIX));

        let mut order = self.lock()?;

        fs::write(&temp, bytes).map_err(|e| cache_io("write", &temp, e))?;
        fs::rename(&temp, &path).map_err(|e| {
            let _ = fs::remove_file(&temp);
            cache_io("write", &path, e)
        })?;

        order.retain(|n| *n != name);
        order.push_back(name);
        debug!("Cached {} bytes for {}", bytes.len(), url);

        Self::evict_locked(&self.dir, &mut order, self.max_files)?;
        Ok(())
    }

    /// Deletes the oldest files until at most `max_files` remain and returns
    /// the names removed. `0` empties the cache.
    pub fn evict_if_over_capacity(&self, max_files: usize) -> Result<Vec<String>> {
        let mut order = self.lock()?;
        Self::evict_locked(&self.dir, &mut order, max_files)
    }

    fn evict_locked(
        dir: &Path,
        order: &mut VecDeque<String>,
        max_files: usize,
    ) -> Result<Vec<String>> {
        let mut evicted = Vec::new();

        while order.len() > max_files {
            let Some(oldest) = order.pop_front() else {
                break;
            };
            let path = dir.join(&oldest);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    order.push_front(oldest);
                    return Err(cache_io("evict", &path, e));
                }
            }
            info!("Evicted cache file {}", oldest);
            evicted.push(oldest);
        }

        Ok(evicted)
    }

    /// Removes the cached file for `url`, if any.
    pub fn remove(&self, url: &str) -> Result<bool> {
        let name = Self::filename_for(url);
        let path = self.dir.join(&name);
        let mut order = self.lock()?;
        order.retain(|n| *n != name);

        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(cache_io("remove", &path, e)),
        }
    }

    /// Deletes every cached file and returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        Ok(self.evict_if_over_capacity(0)?.len())
    }

    pub fn len(&self) -> usize {
        self.order.lock().map(|order| order.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached files, oldest first.
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        let order = self.lock()?;
        let mut entries = Vec::with_capacity(order.len());

        for name in order.iter() {
            let path = self.dir.join(name);
            let meta = match fs::metadata(&path) {
                Ok(meta) => meta,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(cache_io("stat", &path, e)),
            };
            entries.push(CacheEntry {
                name: name.clone(),
                size: meta.len(),
                modified: meta.modified().map(DateTime::<Utc>::from)?,
                path,
            });
        }

        Ok(entries)
    }

    fn lock(&self) -> Result<MutexGuard<'_, VecDeque<String>>> {
        self.order
            .lock()
            .map_err(|e| FetchError::CacheIo(format!("cache index lock poisoned: {}", e)))
    }
}

fn is_cache_name(name: &str) -> bool {
    name.len() == 64 && name.bytes().all(|b| b.is_ascii_hexdigit())
}

fn cache_io(action: &str, path: &Path, e: std::io::Error) -> FetchError {
    FetchError::CacheIo(format!("failed to {} {}: {}", action, path.display(), e))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    fn store(max_files: usize) -> (TempDir, CacheStore) {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open(dir.path(), max_files).unwrap();
        (dir, store)
    }

    #[test]
    fn test_filename_deterministic() {
        let a = CacheStore::filename_for("https://example.com/a.json");
        let b = CacheStore::filename_for("https://example.com/a.json");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(is_cache_name(&a));
    }

    #[test]
    fn test_filename_no_collisions() {
        let mut seen = HashSet::new();
        for i in 0..20_000u64 {
            let url = format!(
                "https://host{}.example.com/path/{}?q={}",
                i % 97,
                i,
                i.wrapping_mul(2_654_435_761)
            );
            assert!(seen.insert(CacheStore::filename_for(&url)), "collision at {}", url);
        }
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, store) = store(10);
        assert!(!store.has("A"));
        assert_eq!(store.read("A").unwrap(), None);

        store.write("A", b"hello").unwrap();
        assert!(store.has("A"));
        assert_eq!(store.read("A").unwrap().as_deref(), Some(&b"hello"[..]));
        assert_eq!(fs::read(store.path_for("A")).unwrap(), b"hello");
    }

    #[test]
    fn test_evicts_oldest_on_overflow() {
        let (_dir, store) = store(2);
        store.write("A", b"a").unwrap();
        store.write("B", b"b").unwrap();
        store.write("C", b"c").unwrap();

        assert_eq!(store.len(), 2);
        assert!(!store.has("A"));
        assert!(store.has("B"));
        assert!(store.has("C"));
    }

    #[test]
    fn test_count_never_exceeds_cap() {
        let (dir, store) = store(3);
        for i in 0..10 {
            let url = format!("https://example.com/{}", i);
            store.write(&url, url.as_bytes()).unwrap();
            assert!(store.len() <= 3);
            assert!(fs::read_dir(dir.path()).unwrap().count() <= 3);
        }
        let names: Vec<_> = store.entries().unwrap().into_iter().map(|e| e.name).collect();
        let expected: Vec<_> = (7..10)
            .map(|i| CacheStore::filename_for(&format!("https://example.com/{}", i)))
            .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_rewrite_moves_entry_to_newest() {
        let (_dir, store) = store(2);
        store.write("A", b"1").unwrap();
        store.write("B", b"2").unwrap();
        store.write("A", b"3").unwrap();
        store.write("C", b"4").unwrap();

        assert!(store.has("A"));
        assert!(!store.has("B"));
        assert_eq!(store.read("A").unwrap().as_deref(), Some(&b"3"[..]));
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let (dir, store) = store(0);
        store.write("A", b"hello").unwrap();
        assert!(!store.has("A"));
        assert!(store.is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_explicit_eviction() {
        let (_dir, store) = store(10);
        for url in ["A", "B", "C", "D"] {
            store.write(url, url.as_bytes()).unwrap();
        }
        let evicted = store.evict_if_over_capacity(1).unwrap();
        assert_eq!(
            evicted,
            vec![
                CacheStore::filename_for("A"),
                CacheStore::filename_for("B"),
                CacheStore::filename_for("C"),
            ]
        );
        assert!(store.has("D"));
    }

    #[test]
    fn test_reopen_orders_by_mtime() {
        let dir = TempDir::new().unwrap();
        {
            let store = CacheStore::open(dir.path(), 10).unwrap();
            store.write("old", b"1").unwrap();
            store.write("new", b"2").unwrap();
        }

        let base = SystemTime::now() - Duration::from_secs(3600);
        let set_mtime = |url: &str, at: SystemTime| {
            let file = fs::File::options()
                .write(true)
                .open(dir.path().join(CacheStore::filename_for(url)))
                .unwrap();
            file.set_modified(at).unwrap();
        };
        set_mtime("old", base);
        set_mtime("new", base + Duration::from_secs(60));

        let store = CacheStore::open(dir.path(), 1).unwrap();
        assert_eq!(store.len(), 2);
        store.write("newest", b"3").unwrap();
        assert!(!store.has("old"));
        assert!(!store.has("new"));
        assert!(store.has("newest"));
    }

    #[test]
    fn test_open_ignores_foreign_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README"), b"not cache").unwrap();
        let store = CacheStore::open(dir.path(), 0).unwrap();
        assert!(store.is_empty());
        store.clear().unwrap();
        assert!(dir.path().join("README").exists());
    }

    #[test]
    fn test_read_after_external_delete() {
        let (_dir, store) = store(10);
        store.write("A", b"a").unwrap();
        fs::remove_file(store.path_for("A")).unwrap();
        assert_eq!(store.read("A").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let (_dir, store) = store(10);
        store.write("A", b"a").unwrap();
        store.write("B", b"b").unwrap();

        assert!(store.remove("A").unwrap());
        assert!(!store.remove("A").unwrap());
        assert_eq!(store.clear().unwrap(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_writes_respect_cap() {
        let (dir, store) = store(5);
        let store = Arc::new(store);

        std::thread::scope(|s| {
            for t in 0..8 {
                let store = store.clone();
                s.spawn(move || {
                    for i in 0..25 {
                        let url = format!("https://example.com/{}/{}", t, i);
                        store.write(&url, b"x").unwrap();
                    }
                });
            }
        });

        assert_eq!(store.len(), 5);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 5);
    }

    #[test]
    fn test_read_racing_write_keeps_index() {
        let (dir, store) = store(10);
        let store = Arc::new(store);
        let url = "https://example.com/raced";

        for _ in 0..2_000 {
            store.remove(url).unwrap();
            let barrier = Arc::new(std::sync::Barrier::new(2));

            std::thread::scope(|s| {
                let reader = {
                    let (store, barrier) = (store.clone(), barrier.clone());
                    s.spawn(move || {
                        barrier.wait();
                        store.read(url).unwrap();
                    })
                };
                let (store, barrier) = (store.clone(), barrier.clone());
                s.spawn(move || {
                    barrier.wait();
                    store.write(url, b"x").unwrap();
                });
                reader.join().unwrap();
            });

            assert!(store.has(url));
            assert_eq!(store.len(), 1, "cached file missing from the index");
        }

        assert_eq!(store.evict_if_over_capacity(0).unwrap().len(), 1);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_entries_report_size() {
        let (_dir, store) = store(10);
        store.write("A", b"hello").unwrap();
        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size, 5);
        assert_eq!(entries[0].name, CacheStore::filename_for("A"));
    }
}
