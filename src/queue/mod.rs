//! Publishes job-id handoffs to the broker and consumes them in the worker.

mod redis_queue;

pub use redis_queue::RedisQueue;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QueueError;

/// Wire format for a queued handoff. `owner_user_id` travels alongside for
/// tracing even though the worker re-fetches the job for authoritative state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteMessage {
    pub job_id: Uuid,
    pub request_id: String,
    pub owner_user_id: Option<String>,
}

#[async_trait]
pub trait QueueProducer: Send + Sync {
    async fn enqueue_execute(
        &self,
        job_id: Uuid,
        request_id: &str,
        owner_user_id: Option<&str>,
    ) -> Result<(), QueueError>;

    /// Verifies connectivity to the broker without enqueuing anything.
    /// Backs the `/readyz` probe.
    async fn ping(&self) -> Result<(), QueueError>;
}

#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Blocks up to the configured timeout for the next message. Returns
    /// `None` on a clean timeout (no message available).
    async fn dequeue(&self) -> Result<Option<ExecuteMessage>, QueueError>;
}
