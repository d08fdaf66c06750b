// Download cache: deterministic paths, hit lookup, expiry and size eviction

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tokio::fs;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use super::errors::DownloadError;
use super::quality::QualitySpec;

/// Extensions yt-dlp uses while a download is still running
const PARTIAL_EXTENSIONS: &[&str] = &["part", "ytdl", "temp"];

/// One file in the cache directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub size: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub modified: OffsetDateTime,
}

/// Files removed and bytes freed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionReport {
    pub removed: usize,
    pub bytes: u64,
}

impl EvictionReport {
    fn record(&mut self, entry: &CacheEntry) {
        self.removed += 1;
        self.bytes += entry.size;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub files: usize,
    pub bytes: u64,
}

/// Held for the duration of a fetch; serialises work on one cache key.
pub struct CacheKeyGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl CacheKeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

pub struct CacheManager {
    dir: PathBuf,
    ttl: time::Duration,
    max_bytes: Option<u64>,
    locks: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl CacheManager {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration, max_bytes: Option<u64>) -> Self {
        Self {
            dir: dir.into(),
            ttl: time::Duration::try_from(ttl).unwrap_or(time::Duration::MAX),
            max_bytes,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Hex SHA-256 of `url + "_" + quality`
    pub fn key(url: &str, quality: QualitySpec) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hasher.update(b"_");
        hasher.update(quality.key().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Expected final path: `.mp3` for audio, no extension for original, else `.mp4`.
    pub fn path_for(&self, url: &str, quality: QualitySpec) -> PathBuf {
        let key = Self::key(url, quality);
        match quality {
            QualitySpec::Audio => self.dir.join(format!("{key}.mp3")),
            QualitySpec::Original => self.dir.join(key),
            QualitySpec::Best | QualitySpec::Height(_) => self.dir.join(format!("{key}.mp4")),
        }
    }

    /// yt-dlp output template pinned to the key's stem
    pub fn output_template(&self, url: &str, quality: QualitySpec) -> String {
        let key = Self::key(url, quality);
        self.dir
            .join(format!("{key}.%(ext)s"))
            .to_string_lossy()
            .into_owned()
    }

    pub async fn ensure_dir(&self) -> Result<(), DownloadError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DownloadError::cache_io(&self.dir, e))
    }

    /// Wait for exclusive use of the `(url, quality)` key.
    pub async fn lock(&self, url: &str, quality: QualitySpec) -> CacheKeyGuard {
        let key = Self::key(url, quality);
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, weak| weak.strong_count() > 0);
            match locks.get(&key).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    let fresh = Arc::new(AsyncMutex::new(()));
                    locks.insert(key.clone(), Arc::downgrade(&fresh));
                    fresh
                }
            }
        };
        CacheKeyGuard {
            key,
            _guard: mutex.lock_owned().await,
        }
    }

    /// A fresh, complete file for this key, if one exists.
    ///
    /// Checks the expected path first, then any file sharing the key's stem
    /// (yt-dlp picks the extension for `original` and for pre-muxed fallbacks).
    pub async fn lookup(&self, url: &str, quality: QualitySpec) -> Option<CacheEntry> {
        let now = OffsetDateTime::now_utc();
        let expected = self.path_for(url, quality);

        if let Some(entry) = stat_file(&expected).await {
            if self.is_fresh(&entry, now) {
                return Some(entry);
            }
        }

        let key = Self::key(url, quality);
        let entries = match self.scan().await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(error = %e, "Cache lookup scan failed");
                return None;
            }
        };

        entries
            .into_iter()
            .filter(|entry| file_stem(&entry.path) == Some(key.as_str()))
            .filter(|entry| self.is_fresh(entry, now))
            .max_by_key(|entry| entry.modified)
    }

    /// Remove expired files, then the oldest files while over the size cap.
    /// Failures are logged and never returned.
    pub async fn evict_expired(&self) -> EvictionReport {
        match self.evict_at(OffsetDateTime::now_utc()).await {
            Ok(report) => {
                if report.removed > 0 {
                    info!(removed = report.removed, bytes = report.bytes, "Evicted cache files");
                }
                report
            }
            Err(e) => {
                warn!(error = %e, "Cache eviction failed");
                EvictionReport::default()
            }
        }
    }

    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn evict_at(&self, now: OffsetDateTime) -> Result<EvictionReport, DownloadError> {
        let entries = match fs::metadata(&self.dir).await {
            Ok(_) => self.scan().await?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.ensure_dir().await?;
                return Ok(EvictionReport::default());
            }
            Err(e) => return Err(DownloadError::cache_io(&self.dir, e)),
        };

        let mut report = EvictionReport::default();
        let mut remaining = Vec::with_capacity(entries.len());

        for entry in entries {
            if now - entry.modified > self.ttl {
                match remove_entry(&entry).await {
                    Removal::Removed => {
                        debug!(path = %entry.path.display(), "Removed expired cache file");
                        report.record(&entry);
                    }
                    Removal::Missing => {}
                    // Still on disk, still counts towards the cap
                    Removal::Failed => remaining.push(entry),
                }
            } else {
                remaining.push(entry);
            }
        }

        let Some(max_bytes) = self.max_bytes else {
            return Ok(report);
        };

        let mut total: u64 = remaining.iter().map(|e| e.size).sum();
        if total <= max_bytes {
            return Ok(report);
        }

        // Completed files first, in-progress downloads only as a last resort
        remaining.sort_by_key(|entry| (is_partial(&entry.path), entry.modified));
        for entry in &remaining {
            if total <= max_bytes {
                break;
            }
            match remove_entry(entry).await {
                Removal::Removed => {
                    debug!(path = %entry.path.display(), "Removed cache file over size cap");
                    report.record(entry);
                    total = total.saturating_sub(entry.size);
                }
                Removal::Missing => total = total.saturating_sub(entry.size),
                Removal::Failed => {}
            }
        }

        Ok(report)
    }

    pub async fn stats(&self) -> Result<CacheStats, DownloadError> {
        let entries = match self.scan().await {
            Ok(entries) => entries,
            Err(DownloadError::CacheIo { source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                return Ok(CacheStats::default())
            }
            Err(e) => return Err(e),
        };
        Ok(CacheStats {
            files: entries.len(),
            bytes: entries.iter().map(|e| e.size).sum(),
        })
    }

    /// Remove every regular file in the cache directory.
    pub async fn clear_all(&self) -> Result<EvictionReport, DownloadError> {
        let entries = match self.scan().await {
            Ok(entries) => entries,
            Err(DownloadError::CacheIo { source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                return Ok(EvictionReport::default())
            }
            Err(e) => return Err(e),
        };

        let mut report = EvictionReport::default();
        for entry in &entries {
            if remove_entry(entry).await == Removal::Removed {
                report.record(entry);
            }
        }
        info!(removed = report.removed, bytes = report.bytes, "Cleared cache");
        Ok(report)
    }

    fn is_fresh(&self, entry: &CacheEntry, now: OffsetDateTime) -> bool {
        entry.size > 0 && !is_partial(&entry.path) && now - entry.modified <= self.ttl
    }

    /// One directory listing plus a stat per entry. Entries that vanish
    /// mid-scan are skipped.
    async fn scan(&self) -> Result<Vec<CacheEntry>, DownloadError> {
        let mut dir = fs::read_dir(&self.dir)
            .await
            .map_err(|e| DownloadError::cache_io(&self.dir, e))?;

        let mut entries = Vec::new();
        loop {
            let next = match dir.next_entry().await {
                Ok(next) => next,
                Err(e) => {
                    warn!(error = %e, "Stopped reading cache directory");
                    break;
                }
            };
            let Some(dir_entry) = next else {
                break;
            };
            if let Some(entry) = stat_file(&dir_entry.path()).await {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

async fn stat_file(path: &Path) -> Option<CacheEntry> {
    let metadata = fs::symlink_metadata(path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }
    let modified = metadata.modified().ok()?;
    Some(CacheEntry {
        path: path.to_path_buf(),
        size: metadata.len(),
        modified: OffsetDateTime::from(modified),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Removed,
    /// Already deleted by someone else
    Missing,
    Failed,
}

async fn remove_entry(entry: &CacheEntry) -> Removal {
    match fs::remove_file(&entry.path).await {
        Ok(()) => Removal::Removed,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Removal::Missing,
        Err(e) => {
            warn!(path = %entry.path.display(), error = %e, "Failed to delete cache file");
            Removal::Failed
        }
    }
}

fn file_stem(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}

fn is_partial(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.contains(".part-Frag")
        || path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| PARTIAL_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::SystemTime;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn write_file(dir: &Path, name: &str, size: usize, age: Duration) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, vec![0u8; size]).unwrap();
        let file = File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
        path
    }

    #[test]
    fn path_for_is_deterministic() {
        let cache = CacheManager::new("/cache", DAY, None);
        let url = "https://youtu.be/abc";
        let first = cache.path_for(url, QualitySpec::Best);
        let second = cache.path_for(url, QualitySpec::Best);
        assert_eq!(first.as_os_str().as_encoded_bytes(), second.as_os_str().as_encoded_bytes());
        assert!(first.starts_with("/cache"));
    }

    #[test]
    fn path_for_differs_by_input() {
        let cache = CacheManager::new("/cache", DAY, None);
        let url = "https://youtu.be/abc";
        assert_ne!(
            cache.path_for(url, QualitySpec::Best),
            cache.path_for(url, QualitySpec::Height(720))
        );
        assert_ne!(
            CacheManager::key(url, QualitySpec::Best),
            CacheManager::key("https://youtu.be/abd", QualitySpec::Best)
        );
        assert_eq!(CacheManager::key(url, QualitySpec::Best).len(), 64);
    }

    #[test]
    fn path_extension_follows_quality() {
        let cache = CacheManager::new("/cache", DAY, None);
        let url = "https://youtu.be/abc";
        assert!(cache.path_for(url, QualitySpec::Audio).to_string_lossy().ends_with(".mp3"));
        assert!(cache.path_for(url, QualitySpec::Best).to_string_lossy().ends_with(".mp4"));
        assert!(cache.path_for(url, QualitySpec::Original).extension().is_none());
        assert!(cache
            .output_template(url, QualitySpec::Original)
            .ends_with(".%(ext)s"));
    }

    #[tokio::test]
    async fn eviction_on_missing_dir_creates_it() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("cache");
        let cache = CacheManager::new(&dir, DAY, Some(1024));

        let report = cache.evict_expired().await;
        assert_eq!(report, EvictionReport::default());
        assert!(dir.is_dir());

        let report = cache.evict_expired().await;
        assert_eq!((report.removed, report.bytes), (0, 0));
    }

    #[tokio::test]
    async fn eviction_removes_only_expired_files() {
        let tmp = tempfile::tempdir().unwrap();
        let old = write_file(tmp.path(), "old.mp4", 100, DAY * 8);
        let fresh = write_file(tmp.path(), "fresh.mp4", 50, Duration::from_secs(60));
        std::fs::create_dir(tmp.path().join("subdir")).unwrap();

        let cache = CacheManager::new(tmp.path(), DAY * 7, None);
        let report = cache.evict_expired().await;

        assert_eq!(report, EvictionReport { removed: 1, bytes: 100 });
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(tmp.path().join("subdir").is_dir());
    }

    #[tokio::test]
    async fn eviction_enforces_size_cap_oldest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let oldest = write_file(tmp.path(), "a.mp4", 400, Duration::from_secs(3000));
        let middle = write_file(tmp.path(), "b.mp4", 400, Duration::from_secs(2000));
        let newest = write_file(tmp.path(), "c.mp4", 400, Duration::from_secs(1000));

        let cache = CacheManager::new(tmp.path(), DAY, Some(900));
        let report = cache.evict_expired().await;

        assert_eq!(report, EvictionReport { removed: 1, bytes: 400 });
        assert!(!oldest.exists());
        assert!(middle.exists());
        assert!(newest.exists());
        assert!(cache.stats().await.unwrap().bytes <= 900);
    }

    #[tokio::test]
    async fn size_eviction_skips_in_progress_downloads() {
        let tmp = tempfile::tempdir().unwrap();
        let partial = write_file(tmp.path(), "x.mp4.part", 500, Duration::from_secs(5000));
        let done = write_file(tmp.path(), "y.mp4", 500, Duration::from_secs(10));

        let cache = CacheManager::new(tmp.path(), DAY, Some(600));
        let report = cache.evict_expired().await;

        assert_eq!(report.removed, 1);
        assert!(partial.exists());
        assert!(!done.exists());
    }

    #[tokio::test]
    async fn size_eviction_falls_back_to_stale_partials() {
        let tmp = tempfile::tempdir().unwrap();
        let newer = write_file(tmp.path(), "a.mp4.part", 400, Duration::from_secs(60));
        let older = write_file(tmp.path(), "abc.mp4.part", 1000, Duration::from_secs(3600));

        let cache = CacheManager::new(tmp.path(), DAY, Some(600));
        let report = cache.evict_expired().await;

        assert_eq!(report.removed, 1);
        assert_eq!(report.bytes, 1000);
        assert!(!older.exists());
        assert!(newer.exists());
        assert!(cache.stats().await.unwrap().bytes <= 600);
    }

    #[tokio::test]
    async fn lookup_finds_fresh_entries_by_stem() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(tmp.path(), DAY, None);
        let url = "https://www.youtube.com/watch?v=abcdefghijk";

        assert!(cache.lookup(url, QualitySpec::Best).await.is_none());

        let key = CacheManager::key(url, QualitySpec::Original);
        let webm = write_file(tmp.path(), &format!("{key}.webm"), 10, Duration::from_secs(5));
        let entry = cache.lookup(url, QualitySpec::Original).await.unwrap();
        assert_eq!(entry.path, webm);
        assert_eq!(entry.size, 10);

        let expected = cache.path_for(url, QualitySpec::Best);
        std::fs::write(&expected, b"video").unwrap();
        let entry = cache.lookup(url, QualitySpec::Best).await.unwrap();
        assert_eq!(entry.path, expected);
    }

    #[tokio::test]
    async fn lookup_ignores_stale_and_partial_files() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(tmp.path(), DAY, None);
        let url = "https://fb.watch/xyz/";
        let key = CacheManager::key(url, QualitySpec::Best);

        write_file(tmp.path(), &format!("{key}.mp4"), 10, DAY * 2);
        write_file(tmp.path(), &format!("{key}.part"), 10, Duration::from_secs(1));
        write_file(tmp.path(), &format!("{key}.webm"), 0, Duration::from_secs(1));

        assert!(cache.lookup(url, QualitySpec::Best).await.is_none());
    }

    #[tokio::test]
    async fn stats_and_clear_all() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "a.mp4", 10, Duration::from_secs(1));
        write_file(tmp.path(), "b.mp3", 20, Duration::from_secs(1));

        let cache = CacheManager::new(tmp.path(), DAY, None);
        assert_eq!(cache.stats().await.unwrap(), CacheStats { files: 2, bytes: 30 });

        let report = cache.clear_all().await.unwrap();
        assert_eq!(report, EvictionReport { removed: 2, bytes: 30 });
        assert_eq!(cache.stats().await.unwrap(), CacheStats::default());

        let missing = CacheManager::new(tmp.path().join("nope"), DAY, None);
        assert_eq!(missing.stats().await.unwrap(), CacheStats::default());
    }

    #[tokio::test]
    async fn lock_serialises_same_key() {
        let cache = Arc::new(CacheManager::new("/cache", DAY, None));
        let url = "https://youtu.be/abc";

        let guard = cache.lock(url, QualitySpec::Best).await;
        assert_eq!(guard.key(), CacheManager::key(url, QualitySpec::Best));

        // A different key is independent
        let other = cache.lock(url, QualitySpec::Audio).await;
        drop(other);

        let contender = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let _guard = cache.lock("https://youtu.be/abc", QualitySpec::Best).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }
}
