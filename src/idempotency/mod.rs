//! Duplicate-submission guard for stock exits.
//!
//! Every exit submission carries a caller-generated operation id. A completed
//! exit is cached under that id for a fixed window; a replayed id inside the
//! window returns the cached receipt without touching the ledger. Exits are
//! the only guarded operation: they destroy a finite resource, while entries
//! and reads are additive or naturally idempotent.
//!
//! The store is injected as a dependency. A single-instance deployment uses
//! [`InMemoryIdempotencyStore`]; anything running more than one engine
//! instance must share state through [`RedisIdempotencyStore`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::services::stock::ExitReceipt;

mod redis_store;

pub use redis_store::RedisIdempotencyStore;

/// Replay window for completed operations.
pub const DEFAULT_TTL: Duration = Duration::from_secs(600); // 10 minutes

/// A completed stock-exit operation, cached for replay.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredOperation {
    pub receipt: ExitReceipt,
    pub completed_at: DateTime<Utc>,
}

impl StoredOperation {
    pub fn new(receipt: ExitReceipt) -> Self {
        Self {
            receipt,
            completed_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Returns the cached operation for `operation_id` if present and not
    /// expired.
    async fn get(&self, operation_id: &str) -> Result<Option<StoredOperation>, ServiceError>;

    /// Records a completed operation under `operation_id`.
    async fn put(&self, operation_id: &str, op: StoredOperation) -> Result<(), ServiceError>;

    /// Drops expired entries. Stores with native key expiry may no-op.
    async fn purge_expired(&self);
}

/// Keyed in-process store. Correct only while a single engine instance owns
/// all stock-exit traffic.
pub struct InMemoryIdempotencyStore {
    entries: DashMap<String, (StoredOperation, Instant)>,
    ttl: Duration,
}

impl InMemoryIdempotencyStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InMemoryIdempotencyStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn get(&self, operation_id: &str) -> Result<Option<StoredOperation>, ServiceError> {
        if let Some(entry) = self.entries.get(operation_id) {
            let (op, stored_at) = entry.value();
            if stored_at.elapsed() < self.ttl {
                return Ok(Some(op.clone()));
            }
        }
        Ok(None)
    }

    async fn put(&self, operation_id: &str, op: StoredOperation) -> Result<(), ServiceError> {
        self.entries
            .insert(operation_id.to_string(), (op, Instant::now()));
        Ok(())
    }

    async fn purge_expired(&self) {
        let ttl = self.ttl;
        let now = Instant::now();
        self.entries
            .retain(|_, (_, stored_at)| now.duration_since(*stored_at) < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn receipt() -> ExitReceipt {
        ExitReceipt {
            movement_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity: 2,
            new_balance: 8,
            low_stock_triggered: false,
        }
    }

    #[tokio::test]
    async fn replays_within_ttl() {
        let store = InMemoryIdempotencyStore::new(Duration::from_secs(60));
        let op = StoredOperation::new(receipt());
        store.put("op-1", op.clone()).await.unwrap();

        let cached = store.get("op-1").await.unwrap().expect("cached entry");
        assert_eq!(cached.receipt.new_balance, op.receipt.new_balance);
    }

    #[tokio::test]
    async fn expired_entries_are_invisible_and_purged() {
        let store = InMemoryIdempotencyStore::new(Duration::from_millis(10));
        store
            .put("op-2", StoredOperation::new(receipt()))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(25)).await;

        assert!(store.get("op-2").await.unwrap().is_none());
        store.purge_expired().await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unknown_keys_miss() {
        let store = InMemoryIdempotencyStore::default();
        assert!(store.get("never-seen").await.unwrap().is_none());
    }
}
