//! In-process dedup store for single instance deployments.

use super::{DedupKey, DedupStore, MarkOutcome};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::{collections::HashMap, sync::Mutex, time::Duration};

pub struct MemoryDedupStore {
    ttl: TimeDelta,
    /// key -> instant after which the key is forgotten
    seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryDedupStore {
    pub fn new(ttl: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            ttl: TimeDelta::from_std(ttl).context("dedup ttl is out of range")?,
            seen: Mutex::new(HashMap::new()),
        })
    }

    /// Check-and-set as of `now`. The whole read-modify-write happens under one lock.
    pub fn mark_at(&self, key: &DedupKey, now: DateTime<Utc>) -> anyhow::Result<MarkOutcome> {
        let mut seen = self
            .seen
            .lock()
            .map_err(|_| anyhow::anyhow!("dedup store lock poisoned"))?;

        if let Some(expires_at) = seen.get(key.as_str()) {
            if *expires_at > now {
                return Ok(MarkOutcome::SEEN);
            }
        }

        let expires_at = now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        seen.insert(key.as_str().to_string(), expires_at);

        Ok(MarkOutcome::NEW)
    }

    pub fn prune_at(&self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let mut seen = self
            .seen
            .lock()
            .map_err(|_| anyhow::anyhow!("dedup store lock poisoned"))?;

        let before_len = seen.len();
        seen.retain(|_, expires_at| *expires_at > now);

        Ok(before_len - seen.len())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.seen.lock().map(|seen| seen.len()).unwrap_or_default()
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn check_and_mark(&self, key: &DedupKey) -> anyhow::Result<MarkOutcome> {
        self.mark_at(key, Utc::now())
    }

    async fn prune_expired(&self) -> anyhow::Result<usize> {
        self.prune_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(value: &str) -> DedupKey {
        DedupKey::from(value.to_string())
    }

    #[test]
    fn test_second_mark_within_ttl_is_seen() {
        let store = MemoryDedupStore::new(Duration::from_secs(60)).unwrap();
        let now = Utc::now();

        assert_eq!(store.mark_at(&key("a"), now).unwrap(), MarkOutcome::NEW);
        assert_eq!(
            store.mark_at(&key("a"), now + TimeDelta::seconds(59)).unwrap(),
            MarkOutcome::SEEN
        );
        assert_eq!(store.mark_at(&key("b"), now).unwrap(), MarkOutcome::NEW);
    }

    #[test]
    fn test_expired_key_is_new_again() {
        let store = MemoryDedupStore::new(Duration::from_secs(60)).unwrap();
        let now = Utc::now();

        store.mark_at(&key("a"), now).unwrap();
        let later = now + TimeDelta::seconds(60);
        assert_eq!(store.mark_at(&key("a"), later).unwrap(), MarkOutcome::NEW);
        // re-marking restarts the window
        assert_eq!(
            store.mark_at(&key("a"), later + TimeDelta::seconds(1)).unwrap(),
            MarkOutcome::SEEN
        );
    }

    #[test]
    fn test_prune_drops_only_expired_keys() {
        let store = MemoryDedupStore::new(Duration::from_secs(60)).unwrap();
        let now = Utc::now();

        store.mark_at(&key("old"), now).unwrap();
        store
            .mark_at(&key("fresh"), now + TimeDelta::seconds(30))
            .unwrap();

        assert_eq!(store.prune_at(now + TimeDelta::seconds(61)).unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(
            store
                .mark_at(&key("fresh"), now + TimeDelta::seconds(62))
                .unwrap(),
            MarkOutcome::SEEN
        );
    }

    #[test]
    fn test_concurrent_marks_have_single_winner() {
        let store = MemoryDedupStore::new(Duration::from_secs(60)).unwrap();
        let winners = AtomicUsize::new(0);
        let now = Utc::now();

        std::thread::scope(|scope| {
            for _ in 0..32 {
                scope.spawn(|| {
                    if store.mark_at(&key("same"), now).unwrap().is_new {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }

    #[ntex::test]
    async fn test_check_and_mark_uses_wall_clock() {
        let store = MemoryDedupStore::new(Duration::from_secs(60)).unwrap();

        assert!(store.check_and_mark(&key("a")).await.unwrap().is_new);
        assert!(!store.check_and_mark(&key("a")).await.unwrap().is_new);
        assert_eq!(store.prune_expired().await.unwrap(), 0);
    }
}
