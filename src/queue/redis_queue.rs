use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::error::QueueError;

use super::{ExecuteMessage, QueueConsumer, QueueProducer};

/// Redis-list-backed broker. `RPUSH` on the producer side, blocking `BLPOP`
/// on the consumer side; delivery is at-least-once, which is why the worker
/// relies on the job transition CAS for idempotency rather than the queue.
pub struct RedisQueue {
    pool: Pool,
    queue_name: String,
    block_timeout_ms: u64,
}

impl RedisQueue {
    pub fn new(config: &QueueConfig) -> Result<Self, QueueError> {
        let cfg = Config::from_url(&config.redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| QueueError::Unavailable { reason: e.to_string() })?;

        Ok(Self {
            pool,
            queue_name: config.queue_name.clone(),
            block_timeout_ms: config.consumer_block_timeout_ms,
        })
    }
}

#[async_trait]
impl QueueProducer for RedisQueue {
    async fn enqueue_execute(
        &self,
        job_id: Uuid,
        request_id: &str,
        owner_user_id: Option<&str>,
    ) -> Result<(), QueueError> {
        let message = ExecuteMessage {
            job_id,
            request_id: request_id.to_string(),
            owner_user_id: owner_user_id.map(str::to_string),
        };
        let body = serde_json::to_string(&message)
            .map_err(|e| QueueError::Unavailable { reason: e.to_string() })?;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| QueueError::Unavailable { reason: e.to_string() })?;

        let _: i64 = conn
            .rpush(&self.queue_name, body)
            .await
            .map_err(|e| QueueError::Unavailable { reason: e.to_string() })?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), QueueError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| QueueError::Unavailable { reason: e.to_string() })?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Unavailable { reason: e.to_string() })?;

        Ok(())
    }
}

#[async_trait]
impl QueueConsumer for RedisQueue {
    async fn dequeue(&self) -> Result<Option<ExecuteMessage>, QueueError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| QueueError::Unavailable { reason: e.to_string() })?;

        let timeout_s = (self.block_timeout_ms as f64 / 1000.0).max(0.1);
        let result: Option<(String, String)> = conn
            .blpop(&self.queue_name, timeout_s)
            .await
            .map_err(|e| QueueError::Unavailable { reason: e.to_string() })?;

        match result {
            None => Ok(None),
            Some((_key, body)) => {
                let message = serde_json::from_str(&body)
                    .map_err(|e| QueueError::Unavailable { reason: e.to_string() })?;
                Ok(Some(message))
            }
        }
    }
}
