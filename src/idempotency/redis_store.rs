use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::warn;

use super::{IdempotencyStore, StoredOperation};
use crate::errors::ServiceError;

/// Shared idempotency store for multi-instance deployments. Entries expire
/// via Redis key TTL, so `purge_expired` is a no-op.
pub struct RedisIdempotencyStore {
    client: redis::Client,
    ttl: Duration,
    namespace: String,
}

impl RedisIdempotencyStore {
    pub fn new(client: redis::Client, ttl: Duration, namespace: impl Into<String>) -> Self {
        Self {
            client,
            ttl,
            namespace: namespace.into(),
        }
    }

    fn key(&self, operation_id: &str) -> String {
        format!("{}:exit:{}", self.namespace, operation_id)
    }
}

#[async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    async fn get(&self, operation_id: &str) -> Result<Option<StoredOperation>, ServiceError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| ServiceError::CacheError(format!("redis connection failed: {}", e)))?;

        let json: Option<String> = conn
            .get(self.key(operation_id))
            .await
            .map_err(|e| ServiceError::CacheError(format!("redis GET failed: {}", e)))?;

        match json {
            Some(json) => match serde_json::from_str::<StoredOperation>(&json) {
                Ok(op) => Ok(Some(op)),
                Err(e) => {
                    // A corrupt cache entry must not block the operation.
                    warn!(operation_id = %operation_id, error = %e, "Discarding unreadable idempotency entry");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn put(&self, operation_id: &str, op: StoredOperation) -> Result<(), ServiceError> {
        let json = serde_json::to_string(&op)
            .map_err(|e| ServiceError::CacheError(format!("serialize failed: {}", e)))?;

        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| ServiceError::CacheError(format!("redis connection failed: {}", e)))?;

        conn.set_ex::<_, _, ()>(self.key(operation_id), json, self.ttl.as_secs() as usize)
            .await
            .map_err(|e| ServiceError::CacheError(format!("redis SETEX failed: {}", e)))?;

        Ok(())
    }

    async fn purge_expired(&self) {
        // Redis expires keys on its own.
    }
}
