//! Content-addressed page cache
//!
//! Every fetched page is stored as one JSON file named
//! `chunk_<sha256(url)>.json`, flat in a single output directory:
//!
//! ```text
//! output/
//!   chunk_0a1b...e9.json
//!   chunk_7f3c...41.json
//! ```
//!
//! Only successful records are ever restored. An entry with `ok == false`
//! reads as a cache miss, so a transient upstream failure is never taken for
//! a durable result on a later run.

mod record;

pub use record::{sha256_hex, FetchRecord, ResponseMeta, TIMESTAMP_FORMAT};

use crate::{CrawlError, Result};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const ENTRY_PREFIX: &str = "chunk_";
const ENTRY_SUFFIX: &str = ".json";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Computes the cache key of a URL: the hex SHA-256 digest of the URL string
///
/// # Example
///
/// ```
/// use pagetrail::hash_key;
///
/// let key = hash_key("https://example.com/");
/// assert_eq!(key.len(), 64);
/// assert_eq!(key, hash_key("https://example.com/"));
/// ```
pub fn hash_key(url: &str) -> String {
    sha256_hex(url)
}

/// Returns the file name a URL is cached under
pub fn entry_file_name(url: &str) -> String {
    format!("{ENTRY_PREFIX}{}{ENTRY_SUFFIX}", hash_key(url))
}

/// Restores the cached record for `url` from `cache_dir`
///
/// # Returns
///
/// * `Ok(Some(record))` - A cached record with `ok == true` exists
/// * `Ok(None)` - No entry, or the entry records a failed fetch
/// * `Err(CrawlError::MalformedCache)` - The file is not a fetch record
pub fn restore(cache_dir: &Path, url: &str) -> Result<Option<FetchRecord>> {
    let path = cache_dir.join(entry_file_name(url));

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(CrawlError::CacheIo { path, source }),
    };

    match decode_entry(&path, &content)? {
        Some(record) if record.ok() => Ok(Some(record)),
        _ => Ok(None),
    }
}

/// Stores `record` as the cache entry for `url`, replacing any previous entry
///
/// The file is written to a hidden temporary name first and then renamed,
/// so a concurrent reader sees either the old entry or the new one.
pub fn store(cache_dir: &Path, url: &str, record: &FetchRecord) -> Result<()> {
    let path = cache_dir.join(entry_file_name(url));
    let json = serde_json::to_string(record)?;

    let tmp_path = cache_dir.join(format!(
        ".{}.{}.{}.tmp",
        hash_key(url),
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    fs::write(&tmp_path, json).map_err(|source| CrawlError::CacheIo {
        path: tmp_path.clone(),
        source,
    })?;

    #[cfg(target_os = "windows")]
    if path.exists() {
        let _ = fs::remove_file(&path);
    }

    if let Err(source) = fs::rename(&tmp_path, &path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(CrawlError::CacheIo { path, source });
    }

    tracing::trace!("Stored cache entry {}", path.display());
    Ok(())
}

/// Decodes a cache file.
///
/// `Ok(None)` means the entry records a failed fetch; such entries only need
/// a boolean `ok` field.
fn decode_entry(path: &Path, content: &str) -> Result<Option<FetchRecord>> {
    let malformed = |reason: String| CrawlError::MalformedCache {
        path: path.to_path_buf(),
        reason,
    };

    let value: Value =
        serde_json::from_str(content).map_err(|e| malformed(format!("invalid JSON: {e}")))?;

    let object = match &value {
        Value::Object(object) => object,
        other => {
            return Err(malformed(format!(
                "expected a JSON object, found {}",
                json_kind(other)
            )))
        }
    };

    match object.get("ok") {
        Some(Value::Bool(true)) => {}
        Some(Value::Bool(false)) => return Ok(None),
        Some(other) => {
            return Err(malformed(format!(
                "field `ok` must be a boolean, found {}",
                json_kind(other)
            )))
        }
        None => return Err(malformed("missing field `ok`".to_string())),
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| malformed(e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One file found in a cache directory
#[derive(Debug)]
pub struct CacheEntry {
    /// Path of the entry file
    pub path: PathBuf,

    /// The decoded record, or the reason it could not be decoded.
    /// Entries recording a failed fetch decode as `Ok(None)`.
    pub record: Result<Option<FetchRecord>>,
}

/// A cache directory holding one entry per URL
#[derive(Debug, Clone)]
pub struct PageCache {
    dir: PathBuf,
}

impl PageCache {
    /// Opens a cache rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| CrawlError::CacheIo {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// The directory entries are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the entry for `url`
    pub fn entry_path(&self, url: &str) -> PathBuf {
        self.dir.join(entry_file_name(url))
    }

    /// See [`restore`]
    pub fn restore(&self, url: &str) -> Result<Option<FetchRecord>> {
        restore(&self.dir, url)
    }

    /// See [`store`]
    pub fn store(&self, url: &str, record: &FetchRecord) -> Result<()> {
        store(&self.dir, url, record)
    }

    /// Whether an entry file exists for `url`, whatever its content
    pub fn contains(&self, url: &str) -> bool {
        self.entry_path(url).is_file()
    }

    /// Lists and decodes every `chunk_*.json` entry, sorted by file name
    ///
    /// Unlike [`restore`], failed-fetch entries are reported too, as
    /// `Ok(None)`; malformed files are reported as errors instead of aborting
    /// the listing.
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_chunk = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(ENTRY_PREFIX) && name.ends_with(ENTRY_SUFFIX))
                .unwrap_or(false);
            if is_chunk && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        Ok(paths
            .into_iter()
            .map(|path| {
                let record = fs::read_to_string(&path)
                    .map_err(|source| CrawlError::CacheIo {
                        path: path.clone(),
                        source,
                    })
                    .and_then(|content| decode_any(&path, &content));
                CacheEntry { path, record }
            })
            .collect())
    }
}

/// Like [`decode_entry`], but keeps failed-fetch records when they are complete.
fn decode_any(path: &Path, content: &str) -> Result<Option<FetchRecord>> {
    match decode_entry(path, content)? {
        Some(record) => Ok(Some(record)),
        None => Ok(serde_json::from_str::<FetchRecord>(content).ok()),
    }
}
