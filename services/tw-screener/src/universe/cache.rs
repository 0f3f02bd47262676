//! Time-bounded universe cache.
//!
//! Listing pages change at most daily, so the instrument list is reused for
//! a configurable TTL (default one hour). Failures are never cached.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::{UniverseProvider, UniverseUnavailable};
use crate::data::InstrumentId;

#[derive(Debug, Clone)]
struct CacheEntry {
    ids: Vec<InstrumentId>,
    fetched_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(ids: Vec<InstrumentId>, ttl: Duration) -> Self {
        let fetched_at = Utc::now();
        Self {
            ids,
            fetched_at,
            expires_at: fetched_at + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Caching wrapper around another universe provider.
pub struct CachedUniverse<U> {
    inner: U,
    ttl: Duration,
    entry: RwLock<Option<CacheEntry>>,
}

impl<U: UniverseProvider> CachedUniverse<U> {
    pub fn new(inner: U, ttl: std::time::Duration) -> Self {
        Self {
            inner,
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::hours(1)),
            entry: RwLock::new(None),
        }
    }

    /// Drop the cached list; the next call refetches.
    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
    }

    /// When the cached list was fetched, if one is live.
    pub async fn cached_at(&self) -> Option<DateTime<Utc>> {
        self.entry
            .read()
            .await
            .as_ref()
            .filter(|e| !e.is_expired())
            .map(|e| e.fetched_at)
    }
}

#[async_trait]
impl<U: UniverseProvider> UniverseProvider for CachedUniverse<U> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn list_instruments(&self) -> Result<Vec<InstrumentId>, UniverseUnavailable> {
        if let Some(entry) = self.entry.read().await.as_ref() {
            if !entry.is_expired() {
                debug!(count = entry.ids.len(), "Universe cache hit");
                return Ok(entry.ids.clone());
            }
        }

        // Held across the fetch so concurrent callers wait for one refresh.
        let mut slot = self.entry.write().await;
        if let Some(entry) = slot.as_ref() {
            if !entry.is_expired() {
                return Ok(entry.ids.clone());
            }
        }

        let ids = self.inner.list_instruments().await?;
        debug!(provider = self.inner.name(), count = ids.len(), "Universe cache refreshed");
        *slot = Some(CacheEntry::new(ids.clone(), self.ttl));
        Ok(ids)
    }
}
