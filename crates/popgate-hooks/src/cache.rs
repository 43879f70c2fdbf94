//! TTL cache of successful hook data.
//!
//! Keys are `(campaign_id, hook_name)`, so concurrent campaigns never share
//! entries. Expired entries are dropped lazily on lookup or by
//! [`ResourceCache::purge_expired`].

use std::time::Duration;

use dashmap::DashMap;
use popgate_settings::HookSettings;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

type CacheKey = (String, String);

#[derive(Clone, Debug)]
struct CacheEntry {
    data: Value,
    stored_at: Instant,
}

/// Shared resource cache.
#[derive(Debug)]
pub struct ResourceCache {
    entries: DashMap<CacheKey, CacheEntry>,
    ttl: Duration,
}

impl ResourceCache {
    /// Cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Cache using the configured TTL.
    #[must_use]
    pub fn from_settings(settings: &HookSettings) -> Self {
        Self::new(settings.cache_ttl())
    }

    /// Entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh data for `(campaign_id, hook_name)`.
    pub fn get(&self, campaign_id: &str, hook_name: &str) -> Option<Value> {
        let key = (campaign_id.to_string(), hook_name.to_string());
        {
            let entry = self.entries.get(&key)?;
            if entry.stored_at.elapsed() < self.ttl {
                return Some(entry.data.clone());
            }
        }
        let ttl = self.ttl;
        let _ = self
            .entries
            .remove_if(&key, |_, entry| entry.stored_at.elapsed() >= ttl);
        debug!(campaign_id, hook_name, "cache entry expired");
        None
    }

    /// Store `data` for `(campaign_id, hook_name)`, resetting its age.
    pub fn insert(&self, campaign_id: &str, hook_name: &str, data: Value) {
        let _ = self.entries.insert(
            (campaign_id.to_string(), hook_name.to_string()),
            CacheEntry {
                data,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every entry for `campaign_id`. Returns how many were removed.
    pub fn clear_campaign(&self, campaign_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(campaign, _), _| campaign != campaign_id);
        let removed = before.saturating_sub(self.entries.len());
        debug!(campaign_id, removed, "cleared campaign cache");
        removed
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::from_settings(&HookSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn hit_within_ttl() {
        let cache = ResourceCache::new(Duration::from_secs(60));
        cache.insert("c1", "products", json!([1, 2]));
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("c1", "products"), Some(json!([1, 2])));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_evicted_on_lookup() {
        let cache = ResourceCache::new(Duration::from_secs(60));
        cache.insert("c1", "products", json!([1]));
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(cache.get("c1", "products").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn keys_are_campaign_scoped() {
        let cache = ResourceCache::new(Duration::from_secs(60));
        cache.insert("c1", "products", json!("one"));
        cache.insert("c2", "products", json!("two"));
        assert_eq!(cache.get("c1", "products"), Some(json!("one")));
        assert_eq!(cache.get("c2", "products"), Some(json!("two")));
        assert!(cache.get("c3", "products").is_none());
    }

    #[test]
    fn clear_campaign_leaves_others() {
        let cache = ResourceCache::new(Duration::from_secs(60));
        cache.insert("c1", "a", json!(1));
        cache.insert("c1", "b", json!(2));
        cache.insert("c2", "a", json!(3));
        assert_eq!(cache.clear_campaign("c1"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("c2", "a").is_some());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_expired_keeps_fresh_entries() {
        let cache = ResourceCache::new(Duration::from_secs(10));
        cache.insert("c1", "old", json!(1));
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.insert("c1", "new", json!(2));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.get("c1", "new").is_some());
    }

    #[test]
    fn default_uses_settings_ttl() {
        assert_eq!(ResourceCache::default().ttl(), Duration::from_millis(300_000));
    }
}
