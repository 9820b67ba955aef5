//! The fetch record persisted for every visited page

use crate::crawler::RawResponse;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Timestamp layout used by the `dttm` field (local time, second precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Returns the lowercase hex SHA-256 digest of a string
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Normalized envelope around one HTTP GET outcome plus parsed page data
///
/// Field names on disk follow the cache file format: `ok`, `elapsed`,
/// `status_code`, `reason`, `url`, `encoding`, `headers`, `dttm`, `sha256`
/// and `data`, serialized in that order.
///
/// A record is immutable once built. Re-fetching a URL produces a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRecord {
    ok: bool,
    #[serde(rename = "elapsed")]
    elapsed_seconds: f64,
    status_code: u16,
    reason: String,
    url: String,
    #[serde(rename = "encoding")]
    encoding_name: Option<String>,
    headers: BTreeMap<String, String>,
    #[serde(rename = "dttm")]
    timestamp: String,
    #[serde(rename = "sha256")]
    content_hash: String,
    data: Value,
}

/// Metadata describing a response, before any page data is attached
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMeta {
    pub ok: bool,
    pub elapsed_seconds: f64,
    pub status_code: u16,
    pub reason: String,
    pub url: String,
    pub encoding_name: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub timestamp: String,
    pub content_hash: String,
}

impl ResponseMeta {
    /// Builds the metadata envelope for a raw response
    ///
    /// The content hash covers the exact body text, whatever the status.
    pub fn from_response(response: &RawResponse) -> Self {
        Self {
            ok: response.is_ok(),
            elapsed_seconds: response.elapsed.as_secs_f64(),
            status_code: response.status_code,
            reason: response.reason.clone(),
            url: response.url.to_string(),
            encoding_name: response.encoding.clone(),
            headers: response.headers.clone(),
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            content_hash: sha256_hex(&response.body),
        }
    }

    /// Attaches page data, producing the final record
    pub fn with_data(self, data: Value) -> FetchRecord {
        FetchRecord {
            ok: self.ok,
            elapsed_seconds: self.elapsed_seconds,
            status_code: self.status_code,
            reason: self.reason,
            url: self.url,
            encoding_name: self.encoding_name,
            headers: self.headers,
            timestamp: self.timestamp,
            content_hash: self.content_hash,
            data,
        }
    }

    /// Produces a record for a failed HTTP fetch: data is an empty object
    pub fn without_data(self) -> FetchRecord {
        self.with_data(Value::Object(Map::new()))
    }
}

impl FetchRecord {
    /// Whether the HTTP fetch succeeded (status < 400); says nothing about parsing
    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Final URL, after redirects
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn encoding_name(&self) -> Option<&str> {
        self.encoding_name.as_deref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Local fetch time formatted as `YYYY-MM-DD HH:MM:SS`
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Hex SHA-256 of the body text as received
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Parsed page data (an empty object when the fetch was not ok)
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// The `next_link` stored in the data of a crawled page
    pub fn next_link(&self) -> Option<&str> {
        self.data.get("next_link").and_then(Value::as_str)
    }
}
