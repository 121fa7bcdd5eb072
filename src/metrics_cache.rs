use moka::future::Cache;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Checksummed cache payload.
///
/// Cached provider responses are stored as JSON next to their SHA-256 so a
/// corrupted or tampered entry is detected on read and refetched instead of
/// scored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedCacheEntry {
    /// JSON-encoded value.
    pub data: String,
    /// Hex SHA-256 of `data`.
    pub checksum: String,
}

impl ValidatedCacheEntry {
    pub fn seal<T: Serialize>(value: &T) -> Option<Self> {
        let data = serde_json::to_string(value).ok()?;
        let checksum = compute_checksum(&data);
        Some(Self { data, checksum })
    }

    pub fn is_valid(&self) -> bool {
        compute_checksum(&self.data) == self.checksum
    }

    /// Returns the decoded value if the checksum matches.
    pub fn open<T: DeserializeOwned>(&self) -> Option<T> {
        if !self.is_valid() {
            tracing::warn!(
                "Cache validation failed: checksum mismatch. Expected: {}, Data length: {}",
                self.checksum,
                self.data.len()
            );
            return None;
        }
        serde_json::from_str(&self.data).ok()
    }
}

/// Hex-encoded SHA-256 of a string.
pub fn compute_checksum(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Per-handle cache of provider results.
#[derive(Clone)]
pub struct MetricsCache {
    inner: Cache<String, ValidatedCacheEntry>,
}

impl MetricsCache {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_capacity)
                .build(),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, handle: &str) -> Option<T> {
        let entry = self.inner.get(handle).await?;
        match entry.open() {
            Some(value) => Some(value),
            None => {
                self.inner.invalidate(handle).await;
                None
            }
        }
    }

    pub async fn insert<T: Serialize>(&self, handle: &str, value: &T) {
        if let Some(entry) = ValidatedCacheEntry::seal(value) {
            self.inner.insert(handle.to_string(), entry).await;
        }
    }

    #[cfg(test)]
    async fn tamper(&self, handle: &str, data: &str) {
        if let Some(mut entry) = self.inner.get(handle).await {
            entry.data = data.to_string();
            self.inner.insert(handle.to_string(), entry).await;
        }
    }
}
