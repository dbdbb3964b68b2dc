//! Time-boxed store for rendered listing markup.
//!
//! Entries are never invalidated by writes; they only age out or are dropped
//! wholesale with [`ListingCache::clear`].

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::types::AppResult;

/// Prefix of the home feed keys; the page number is appended.
pub const INDEX_PAGE_KEY: &str = "index_page";

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> ManualClock {
        ManualClock {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        ManualClock::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

struct Entry {
    markup: String,
    stored_at: Instant,
}

pub struct ListingCache {
    ttl: Duration,
    clock: Box<dyn Clock>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ListingCache {
    pub fn new(ttl: Duration) -> ListingCache {
        ListingCache::with_clock(ttl, SystemClock)
    }

    pub fn with_clock<C: Clock + 'static>(ttl: Duration, clock: C) -> ListingCache {
        ListingCache {
            ttl,
            clock: Box::new(clock),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Markup stored under `key`, unless it is older than the ttl.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let fresh = match entries.get(key) {
            Some(entry) => now.saturating_duration_since(entry.stored_at) < self.ttl,
            None => return None,
        };
        if fresh {
            entries.get(key).map(|entry| entry.markup.clone())
        } else {
            entries.remove(key);
            None
        }
    }

    /// Stores `markup` under `key` and drops every expired entry, so keys
    /// that are never read again do not pile up.
    pub fn insert(&self, key: &str, markup: String) {
        let now = self.clock.now();
        let ttl = self.ttl;
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| now.saturating_duration_since(entry.stored_at) < ttl);
        entries.insert(
            key.to_string(),
            Entry {
                markup,
                stored_at: now,
            },
        );
    }

    /// Returns the cached markup, or renders, stores and returns it.
    ///
    /// The lock is not held while rendering, so two concurrent misses may both
    /// render; the later one wins.
    pub fn get_or_render<F>(&self, key: &str, render: F) -> AppResult<String>
    where
        F: FnOnce() -> AppResult<String>,
    {
        if let Some(markup) = self.get(key) {
            debug!(key, "listing cache hit");
            return Ok(markup);
        }
        debug!(key, "listing cache miss");
        let markup = render()?;
        self.insert(key, markup.clone());
        Ok(markup)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
        debug!("listing cache cleared");
    }
}
