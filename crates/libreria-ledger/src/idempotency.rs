//! # Idempotency Store
//!
//! Keyed deduplication of retryable operations.
//!
//! Callers of the stock and payment ledgers supply their own tokens
//! (`reservation_id`, `transaction_id`). The store maps
//! `(operation, token)` to a recorded outcome so a retried call is a
//! no-op instead of a double-apply. Entries are short-lived: anything
//! older than the TTL is pruned, since a retry that arrives days later is
//! a bug, not a retry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

/// Operations that accept caller-supplied idempotency tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Reserve,
    Release,
    Commit,
    Debit,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Key {
    operation: Operation,
    token: String,
}

#[derive(Debug, Clone)]
struct Entry {
    recorded_at: DateTime<Utc>,
}

/// Deduplication map shared by the ledgers.
#[derive(Debug, Clone)]
pub struct IdempotencyStore {
    entries: Arc<RwLock<HashMap<Key, Entry>>>,
    ttl: Duration,
}

impl IdempotencyStore {
    /// Default lifetime of a recorded outcome.
    pub const DEFAULT_TTL_HOURS: i64 = 24;

    pub fn new() -> Self {
        Self::with_ttl(Duration::hours(Self::DEFAULT_TTL_HOURS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        IdempotencyStore {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// True when this (operation, token) pair was already applied.
    pub async fn seen(&self, operation: Operation, token: &str) -> bool {
        let entries = self.entries.read().await;
        entries.contains_key(&Key {
            operation,
            token: token.to_string(),
        })
    }

    /// Records a successfully applied operation.
    pub async fn record(&self, operation: Operation, token: &str) {
        debug!(?operation, token = %token, "Recording idempotency token");
        let mut entries = self.entries.write().await;
        entries.insert(
            Key {
                operation,
                token: token.to_string(),
            },
            Entry {
                recorded_at: Utc::now(),
            },
        );
    }

    /// Drops entries older than the TTL. Callers decide the cadence.
    pub async fn prune_expired(&self) -> usize {
        let cutoff = Utc::now() - self.ttl;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.recorded_at > cutoff);
        before - entries.len()
    }

    /// Number of live entries, for diagnostics.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for IdempotencyStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_seen() {
        let store = IdempotencyStore::new();
        assert!(!store.seen(Operation::Reserve, "res-1").await);

        store.record(Operation::Reserve, "res-1").await;
        assert!(store.seen(Operation::Reserve, "res-1").await);

        // same token, different operation: distinct key
        assert!(!store.seen(Operation::Commit, "res-1").await);
    }

    #[tokio::test]
    async fn test_prune_expired() {
        let store = IdempotencyStore::with_ttl(Duration::hours(-1)); // everything expired
        store.record(Operation::Debit, "tx-1").await;
        assert_eq!(store.len().await, 1);

        let pruned = store.prune_expired().await;
        assert_eq!(pruned, 1);
        assert!(store.is_empty().await);
    }
}
