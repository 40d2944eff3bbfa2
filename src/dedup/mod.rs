//! Deduplication of webhook deliveries and downstream actions.
//!
//! # Key Formats
//!
//! - event: `<event_type>:<event_id>`, e.g. `call-ended:8841` or
//!   `call-ended:syn-3f2a9c0d1e4b5a67` for a synthesized id
//! - action: `<event key>:<action>`, e.g. `call-ended:8841:campaign-trigger`
//!
//! Action keys are what the dispatcher marks. Two code paths that try to fire
//! the same side effect for the same event collide on the same action key, so
//! only one of them reaches the downstream service.
//!
//! # TTL-based Expiration
//!
//! Keys are remembered for a configurable TTL. An expired key is treated as
//! absent, and [`DedupStore::prune_expired`] drops them to bound memory.

pub mod memory;
pub mod sqlite;
pub mod sqlite_queries;

use crate::models::{event::EventType, forwarding::ActionName};
use async_trait::async_trait;
use std::{fmt, sync::Arc};

/// Identifies a logical event or a single action derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn for_event(event_type: EventType, event_id: &str) -> Self {
        DedupKey(format!("{event_type}:{event_id}"))
    }

    /// Scopes an event key to one downstream action.
    pub fn for_action(&self, action: ActionName) -> Self {
        DedupKey(format!("{}:{action}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DedupKey {
    fn from(s: String) -> Self {
        DedupKey(s)
    }
}

/// Result of [`DedupStore::check_and_mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkOutcome {
    /// `true` only for the caller that marked a key absent (or expired) before
    pub is_new: bool,
}

impl MarkOutcome {
    pub const NEW: MarkOutcome = MarkOutcome { is_new: true };
    pub const SEEN: MarkOutcome = MarkOutcome { is_new: false };
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Atomically checks whether `key` is live and marks it if not.
    ///
    /// Concurrent calls with the same key result in exactly one caller
    /// observing `is_new = true`.
    async fn check_and_mark(&self, key: &DedupKey) -> anyhow::Result<MarkOutcome>;

    /// Removes expired keys and returns how many were removed.
    async fn prune_expired(&self) -> anyhow::Result<usize>;
}

pub type ImplDedupStore = Arc<dyn DedupStore>;
