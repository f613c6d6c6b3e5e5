//! Content-addressed result cache with lazy time-based expiry

use std::time::Duration;

use dashmap::DashMap;
use shared::ProviderId;
use tokio::time::Instant;

use crate::types::{Fingerprint, GenerationResult};

/// Default time-to-live of a cached result
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: GenerationResult,
    pub generated_at: Instant,
    pub provider_id: ProviderId,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.generated_at) < ttl
    }
}

/// Fingerprint → result map. Expired entries read as absent.
pub struct ResultCache {
    entries: DashMap<Fingerprint, CacheEntry>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh result for the fingerprint, dropping it if it has expired
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<GenerationResult> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(fingerprint) {
            if entry.is_fresh(self.ttl, now) {
                return Some(entry.result.clone());
            }
        }
        self.entries
            .remove_if(fingerprint, |_, entry| !entry.is_fresh(self.ttl, now));
        None
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries
            .get(fingerprint)
            .map(|entry| entry.is_fresh(self.ttl, Instant::now()))
            .unwrap_or(false)
    }

    pub fn put(&self, fingerprint: Fingerprint, result: GenerationResult) {
        let entry = CacheEntry {
            provider_id: result.provider_id.clone(),
            result,
            generated_at: Instant::now(),
        };
        self.entries.insert(fingerprint, entry);
    }

    pub fn entry(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        self.entries.get(fingerprint).map(|entry| entry.clone())
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(self.ttl, now));
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}
