//! In-memory response cache with lazy expiry.
//!
//! Bodies are keyed by the fully resolved request URL. An entry without a
//! `max_age` never expires; an expired entry is evicted at read time, inside
//! the same locked accessor that reports the miss, so callers never observe a
//! half-expired entry. Nothing sweeps the cache proactively.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    body: Vec<u8>,
    stored_at: Instant,
    max_age: Option<Duration>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        match self.max_age {
            None => false,
            Some(max_age) => now.duration_since(self.stored_at) >= max_age,
        }
    }
}

/// URL-keyed store of previously fetched bodies.
#[derive(Debug, Default)]
pub struct ResponseCache {
    inner: Mutex<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached body for the URL, or a miss.
    ///
    /// Expiry is checked lazily: an expired entry is deleted here and
    /// reported as a miss.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<Vec<u8>> {
        let mut map = self.inner.lock().ok()?;
        let expired = map.get(url)?.is_expired(Instant::now());
        if expired {
            map.remove(url);
            return None;
        }
        map.get(url).map(|entry| entry.body.clone())
    }

    /// Stores a body under the URL. `max_age = None` caches until teardown or
    /// a later refetch overwrites the entry.
    pub fn put(&self, url: String, body: Vec<u8>, max_age: Option<Duration>) {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(
                url,
                CacheEntry {
                    body,
                    stored_at: Instant::now(),
                    max_age,
                },
            );
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Caching decision derived from a response's `Cache-Control` header.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    /// `no-store` was present; the response must not be cached.
    pub no_store: bool,
    /// Freshness window from a parseable `max-age=N` directive.
    pub max_age: Option<Duration>,
}

impl CachePolicy {
    /// Parses a `Cache-Control` value directive by directive. Unknown
    /// directives are ignored; an unparseable `max-age` value falls back to
    /// "no expiry".
    #[must_use]
    pub fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::default();
        };

        let mut policy = Self::default();
        for directive in value.split(',') {
            let directive = directive.trim();
            if directive.eq_ignore_ascii_case("no-store") {
                policy.no_store = true;
            } else if let Some((name, val)) = directive.split_once('=') {
                if name.trim().eq_ignore_ascii_case("max-age") {
                    policy.max_age = val.trim().parse::<u64>().ok().map(Duration::from_secs);
                }
            }
        }
        policy
    }
}
