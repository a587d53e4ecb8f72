//! Size-bounded on-disk response cache.
//!
//! Each cached response is one JSON file in the cache directory. An in-memory
//! [`LruCache`] indexes the files by key and tracks their sizes; when the total
//! exceeds the configured byte budget the least recently used entries are
//! deleted.
//!
//! The directory is created on [`ResponseCache::open`] if absent. Files already
//! present are indexed oldest-first, so a cache survives process restarts and
//! client rebuilds.
//!
//! # Examples
//!
//! ```no_run
//! use profile_http::cache::ResponseCache;
//!
//! let cache = ResponseCache::open("/tmp/profile_http", 10 * 1024 * 1024)?;
//! assert_eq!(cache.max_bytes(), 10 * 1024 * 1024);
//! # Ok::<(), profile_http::ClientError>(())
//! ```

use crate::error::{ClientError, Result};
use crate::protocol::{self, constants::headers as names};
use crate::types::HttpResponse;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

const ENTRY_EXTENSION: &str = "json";

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// File stem for a request key.
fn file_stem(key: &str) -> String {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// One stored response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    /// Request key the entry was stored under
    pub key: String,
    /// Final response URL
    pub url: String,
    /// Status code
    pub status: u16,
    /// Response headers in order
    pub headers: Vec<(String, String)>,
    /// Base64 body
    body: String,
    /// Unix seconds at which the response was stored or revalidated
    pub stored_at: u64,
}

impl CachedResponse {
    /// Capture `response` for `key`.
    pub fn capture(key: &str, response: &HttpResponse) -> Self {
        Self {
            key: key.to_string(),
            url: response.url.to_string(),
            status: response.status.as_u16(),
            headers: response
                .headers
                .iter()
                .filter_map(|(n, v)| v.to_str().ok().map(|v| (n.to_string(), v.to_string())))
                .collect(),
            body: STANDARD.encode(&response.body),
            stored_at: now_secs(),
        }
    }

    fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(n), Ok(v)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                map.append(n, v);
            }
        }
        map
    }

    /// Value of a stored header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the entry may be served without contacting the origin at `now`.
    pub fn is_fresh_at(&self, now: u64) -> bool {
        let directives = protocol::cache_directives(&self.header_map());
        if directives.no_cache {
            return false;
        }
        match directives.max_age {
            Some(max_age) => now.saturating_sub(self.stored_at) < max_age,
            None => false,
        }
    }

    /// Whether the entry may be served now.
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(now_secs())
    }

    /// Rebuild the response, tagging it with `x-cache-status: <status>`.
    pub fn to_response(&self, cache_status: &'static str) -> Result<HttpResponse> {
        let body = STANDARD
            .decode(&self.body)
            .map_err(|e| ClientError::Cache(format!("corrupt body for {}: {}", self.url, e)))?;
        let mut headers = self.header_map();
        headers.insert(names::CACHE_STATUS, HeaderValue::from_static(cache_status));
        Ok(HttpResponse {
            status: StatusCode::from_u16(self.status)
                .map_err(|e| ClientError::Cache(format!("corrupt status {}: {}", self.status, e)))?,
            url: Url::parse(&self.url)?,
            headers,
            body: Bytes::from(body),
        })
    }

    /// Same entry with a fresh timestamp.
    pub fn revalidated(mut self) -> Self {
        self.stored_at = now_secs();
        self
    }
}

struct CacheIndex {
    entries: LruCache<String, u64>,
    total_bytes: u64,
}

/// Byte-bounded response cache rooted in one directory.
pub struct ResponseCache {
    dir: PathBuf,
    max_bytes: u64,
    index: Mutex<CacheIndex>,
}

impl ResponseCache {
    /// Open (creating if needed) the cache in `dir` with a budget of `max_bytes`.
    pub fn open(dir: impl AsRef<Path>, max_bytes: u64) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let mut found = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let meta = entry.metadata()?;
            let modified = meta.modified().unwrap_or(UNIX_EPOCH);
            found.push((modified, stem, meta.len()));
        }
        found.sort_by_key(|(modified, _, _)| *modified);

        let mut index = CacheIndex {
            entries: LruCache::unbounded(),
            total_bytes: 0,
        };
        for (_, stem, size) in found {
            index.total_bytes += size;
            index.entries.put(stem, size);
        }

        let cache = Self {
            dir,
            max_bytes,
            index: Mutex::new(index),
        };
        for victim in cache.evict_over_budget() {
            let _ = std::fs::remove_file(cache.path_for_stem(&victim));
        }
        tracing::debug!(dir = %cache.dir.display(), bytes = cache.size_bytes(), "response cache opened");
        Ok(cache)
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Byte budget.
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Bytes currently on disk.
    pub fn size_bytes(&self) -> u64 {
        self.index.lock().total_bytes
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.index.lock().entries.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn path_for_stem(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", stem, ENTRY_EXTENSION))
    }

    /// Pop least recently used entries until the budget holds; returns their stems.
    fn evict_over_budget(&self) -> Vec<String> {
        let mut index = self.index.lock();
        let mut victims = Vec::new();
        while index.total_bytes > self.max_bytes {
            match index.entries.pop_lru() {
                Some((stem, size)) => {
                    index.total_bytes = index.total_bytes.saturating_sub(size);
                    victims.push(stem);
                }
                None => break,
            }
        }
        victims
    }

    fn forget(&self, stem: &str) {
        let mut index = self.index.lock();
        if let Some(size) = index.entries.pop(stem) {
            index.total_bytes = index.total_bytes.saturating_sub(size);
        }
    }

    /// Look up the entry stored for `key`.
    pub async fn get(&self, key: &str) -> Result<Option<CachedResponse>> {
        let stem = file_stem(key);
        if self.index.lock().entries.get(&stem).is_none() {
            return Ok(None);
        }

        let raw = match tokio::fs::read(self.path_for_stem(&stem)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.forget(&stem);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let entry: CachedResponse = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                self.remove(key).await?;
                return Err(ClientError::Cache(format!("unreadable entry for {}: {}", key, e)));
            }
        };
        if entry.key != key {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    /// Store `entry`, evicting older entries when over budget.
    ///
    /// Entries larger than the whole budget are not stored.
    pub async fn put(&self, entry: &CachedResponse) -> Result<()> {
        let raw = serde_json::to_vec(entry)?;
        let size = raw.len() as u64;
        if size > self.max_bytes {
            return Ok(());
        }

        let stem = file_stem(&entry.key);
        tokio::fs::write(self.path_for_stem(&stem), &raw).await?;

        {
            let mut index = self.index.lock();
            if let Some(old) = index.entries.put(stem, size) {
                index.total_bytes = index.total_bytes.saturating_sub(old);
            }
            index.total_bytes += size;
        }

        for victim in self.evict_over_budget() {
            let _ = tokio::fs::remove_file(self.path_for_stem(&victim)).await;
        }
        Ok(())
    }

    /// Drop the entry stored for `key`.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let stem = file_stem(key);
        self.forget(&stem);
        match tokio::fs::remove_file(self.path_for_stem(&stem)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
