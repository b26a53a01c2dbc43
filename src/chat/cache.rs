//! Response cache keyed by prompt hash.
//!
//! Avoids re-billing the API for a prompt the user already asked. Entries
//! expire after a TTL and the whole map persists as one JSON file. A corrupt
//! cache file is discarded with a warning; caching is never load-bearing.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One cached response.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    response: String,
    /// Seconds since UNIX_EPOCH at insert time.
    timestamp: u64,
}

/// Persistent prompt-keyed response cache.
#[derive(Debug)]
pub struct ResponseCache {
    path: PathBuf,
    ttl_secs: u64,
    entries: HashMap<String, CacheEntry>,
}

impl ResponseCache {
    /// Load the cache from `path`, pruning expired entries.
    pub fn load(path: impl Into<PathBuf>, ttl_secs: u64) -> Self {
        let path = path.into();

        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<HashMap<String, CacheEntry>>(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(target: "chat", "discarding corrupt cache file: {e}");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        let mut cache = Self {
            path,
            ttl_secs,
            entries,
        };
        cache.prune();
        cache
    }

    /// Cache key for a prompt under a given provider and model.
    ///
    /// Provider and model are part of the key: the same prompt sent to a
    /// different backend is a different question.
    pub fn key(provider: &str, model: &str, prompt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(provider.as_bytes());
        hasher.update(b":");
        hasher.update(model.as_bytes());
        hasher.update(b":");
        hasher.update(prompt.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Look up a non-expired response.
    pub fn get(&self, key: &str) -> Option<&str> {
        let entry = self.entries.get(key)?;
        if now_secs().saturating_sub(entry.timestamp) > self.ttl_secs {
            return None;
        }
        Some(&entry.response)
    }

    /// Insert a response and persist the cache.
    pub fn put(&mut self, key: String, response: String) {
        self.entries.insert(
            key,
            CacheEntry {
                response,
                timestamp: now_secs(),
            },
        );
        self.save();
    }

    /// Number of live (non-expired) entries.
    pub fn len(&self) -> usize {
        let now = now_secs();
        self.entries
            .values()
            .filter(|e| now.saturating_sub(e.timestamp) <= self.ttl_secs)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(&mut self) {
        let now = now_secs();
        let ttl = self.ttl_secs;
        self.entries
            .retain(|_, e| now.saturating_sub(e.timestamp) <= ttl);
    }

    fn save(&self) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(target: "chat", "cannot create cache dir: {e}");
                return;
            }
        }

        match serde_json::to_string(&self.entries) {
            Ok(content) => {
                if let Err(e) = std::fs::write(&self.path, content) {
                    tracing::warn!(target: "chat", "cannot write cache file: {e}");
                }
            }
            Err(e) => tracing::warn!(target: "chat", "cannot serialize cache: {e}"),
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
