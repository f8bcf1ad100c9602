//! Cache API Implementation
//!
//! Named cache stores for the worker. Entries are keyed by request identity
//! (method + URL) and never expire by age; whole stores are dropped when the
//! cache generation rotates.

use std::collections::BTreeMap;
use std::sync::Arc;

use spin::RwLock;

use super::fetch::{Request, RequestMethod, Response};

/// Default quota for a cache storage (50 MB).
pub const DEFAULT_QUOTA: usize = 50 * 1024 * 1024;

/// Cache storage shared between the host, the worker and background tasks.
///
/// Locks are only held for synchronous map operations, never across an await.
pub type SharedCacheStorage = Arc<RwLock<CacheStorage>>;

/// Cache error types
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache quota exceeded ({needed} bytes needed, {available} available)")]
    QuotaExceeded { needed: usize, available: usize },

    #[error("only GET requests can be cached, got {0}")]
    InvalidRequest(&'static str),
}

/// A cached response
#[derive(Debug, Clone)]
struct CacheEntry {
    response: Response,
    /// Size in bytes
    size: usize,
}

/// A cache store
#[derive(Debug, Clone, Default)]
pub struct Cache {
    /// Cached entries (method:url -> entry)
    entries: BTreeMap<String, CacheEntry>,
    /// Total size in bytes
    total_size: usize,
}

impl Cache {
    /// Match a request
    pub fn match_request(&self, request: &Request) -> Option<&Response> {
        self.entries.get(&make_key(request)).map(|e| &e.response)
    }

    /// Replace the entry for this request identity.
    fn put(&mut self, request: &Request, response: Response) {
        let size = response.body.len();
        if let Some(old) = self.entries.insert(make_key(request), CacheEntry { response, size }) {
            self.total_size = self.total_size.saturating_sub(old.size);
        }
        self.total_size += size;
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get total size
    pub fn size(&self) -> usize {
        self.total_size
    }

    fn size_of(&self, request: &Request) -> usize {
        self.entries
            .get(&make_key(request))
            .map(|e| e.size)
            .unwrap_or(0)
    }
}

/// Make a cache key from a request
fn make_key(request: &Request) -> String {
    format!("{}:{}", request.method.as_str(), request.url)
}

/// Cache storage (manages the named caches of one origin)
#[derive(Debug)]
pub struct CacheStorage {
    /// Caches by name
    caches: BTreeMap<String, Cache>,
    /// Quota (bytes)
    quota: usize,
}

impl Default for CacheStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStorage {
    /// Create new cache storage
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_QUOTA)
    }

    /// Create new cache storage with an explicit quota
    pub fn with_quota(quota: usize) -> Self {
        Self {
            caches: BTreeMap::new(),
            quota,
        }
    }

    /// Wrap into a shareable handle
    pub fn shared(self) -> SharedCacheStorage {
        Arc::new(RwLock::new(self))
    }

    /// Open or create a cache
    pub fn open(&mut self, name: &str) -> &mut Cache {
        self.caches.entry(name.to_string()).or_default()
    }

    /// Get a cache without creating it
    pub fn get(&self, name: &str) -> Option<&Cache> {
        self.caches.get(name)
    }

    /// Check if a cache exists
    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Delete a whole cache
    pub fn delete(&mut self, name: &str) -> bool {
        self.caches.remove(name).is_some()
    }

    /// Get all cache names
    pub fn keys(&self) -> Vec<String> {
        self.caches.keys().cloned().collect()
    }

    /// Store a response in the named cache, creating the cache lazily.
    pub fn put(
        &mut self,
        name: &str,
        request: Request,
        response: Response,
    ) -> Result<(), CacheError> {
        if request.method != RequestMethod::Get {
            return Err(CacheError::InvalidRequest(request.method.as_str()));
        }

        let replaced = self.caches.get(name).map(|c| c.size_of(&request)).unwrap_or(0);
        let needed = response.body.len();
        let available = self.quota.saturating_sub(self.usage().saturating_sub(replaced));
        if needed > available {
            return Err(CacheError::QuotaExceeded { needed, available });
        }

        self.open(name).put(&request, response);
        Ok(())
    }

    /// Match a request against the given caches, in order.
    pub fn match_in(&self, names: &[&str], request: &Request) -> Option<Response> {
        names
            .iter()
            .filter_map(|name| self.caches.get(*name))
            .find_map(|cache| cache.match_request(request))
            .cloned()
    }

    /// Get usage
    pub fn usage(&self) -> usize {
        self.caches.values().map(|c| c.size()).sum()
    }
}
