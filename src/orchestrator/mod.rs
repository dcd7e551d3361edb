//! Admission: validates, dedupes, persists and enqueues incoming tasks, and
//! answers ownership-guarded status reads.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::event::{self, Event, EventLog, EventType};
use crate::job::{Job, JobError, JobStore};
use crate::queue::QueueProducer;

/// What a caller submits for execution.
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub task: String,
    pub mode: Option<String>,
    pub webhook_url: Option<String>,
}

/// What the orchestrator hands back immediately after admission.
#[derive(Debug, Clone)]
pub struct JobAccepted {
    pub job_id: Uuid,
    pub status: &'static str,
    pub request_id: String,
}

fn task_hash(task: &str) -> String {
    let normalized = task.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    let digest = Sha256::digest(normalized.as_bytes());
    format!("{digest:x}")
}

pub struct Orchestrator {
    jobs: Arc<dyn JobStore>,
    events: Arc<dyn EventLog>,
    producer: Arc<dyn QueueProducer>,
}

impl Orchestrator {
    pub fn new(jobs: Arc<dyn JobStore>, events: Arc<dyn EventLog>, producer: Arc<dyn QueueProducer>) -> Self {
        Self { jobs, events, producer }
    }

    /// Create (or short-circuit to an existing) job and publish it to the
    /// broker. Returns the accepted-job DTO.
    pub async fn create_and_enqueue(
        &self,
        payload: ExecuteRequest,
        owner_user_id: &str,
        http_request_id: Option<String>,
        idempotency_key: Option<String>,
    ) -> Result<JobAccepted, OrchestratorError> {
        let hash = task_hash(&payload.task);

        if let Some(key) = idempotency_key.as_deref() {
            if let Some(existing) = self.jobs.get_by_idempotency(key, &hash).await? {
                return Ok(JobAccepted {
                    job_id: existing.job_id,
                    status: "queued",
                    request_id: existing.request_id,
                });
            }
        }

        let job_id = Uuid::new_v4();
        let request_id = http_request_id.unwrap_or_else(|| format!("req_{}", Uuid::new_v4().simple()));

        let job = Job::new_queued(
            job_id,
            request_id.clone(),
            Some(owner_user_id.to_string()),
            payload.task.clone(),
            hash,
            idempotency_key,
            payload.webhook_url.clone(),
        );
        self.jobs.create(&job).await?;

        event::push_best_effort(
            self.events.as_ref(),
            Event::new(
                job_id,
                &request_id,
                EventType::RequestReceived,
                serde_json::json!({ "mode": payload.mode, "owner_user_id": owner_user_id }),
            ),
        )
        .await;

        if let Err(e) = self.producer.enqueue_execute(job_id, &request_id, Some(owner_user_id)).await {
            event::push_best_effort(
                self.events.as_ref(),
                Event::new(
                    job_id,
                    &request_id,
                    EventType::Error,
                    serde_json::json!({ "stage": "enqueue", "message": "failed to publish to queue", "exc": e.to_string() }),
                ),
            )
            .await;

            let _ = self
                .jobs
                .fail(
                    job_id,
                    JobError {
                        code: "queue_unavailable".to_string(),
                        message: "Queue publish failed".to_string(),
                        retryable: true,
                        detail: Some(serde_json::json!({ "exc": e.to_string() })),
                    },
                )
                .await;

            return Err(OrchestratorError::QueueUnavailable);
        }

        Ok(JobAccepted { job_id, status: "queued", request_id })
    }

    /// Fetch a job's status, enforcing that only its owner can read it.
    pub async fn get_status_owner_guard(&self, job_id: Uuid, owner_user_id: &str) -> Result<Job, OrchestratorError> {
        let job = self.jobs.get(job_id).await?.ok_or(OrchestratorError::NotFound)?;
        match &job.owner_user_id {
            Some(owner) if owner != owner_user_id => {
                Err(OrchestratorError::Auth(crate::error::AuthError::UnauthorizedAccess))
            }
            _ => Ok(job),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use crate::test_support::{FailingProducer, FakeEventLog, FakeJobStore, RecordingProducer};

    #[test]
    fn task_hash_is_case_and_whitespace_insensitive() {
        assert_eq!(task_hash("Hello   World"), task_hash("hello world"));
        assert_eq!(task_hash(" hello world "), task_hash("hello world"));
        assert_ne!(task_hash("hello world"), task_hash("hello there"));
    }

    fn request(task: &str) -> ExecuteRequest {
        ExecuteRequest { task: task.to_string(), mode: None, webhook_url: None }
    }

    // S3: resubmitting the same task under the same idempotency key returns
    // the original job instead of creating a second one.
    #[tokio::test]
    async fn replay_with_same_idempotency_key_and_task_returns_the_existing_job() {
        let jobs = Arc::new(FakeJobStore::default());
        let events = Arc::new(FakeEventLog::default());
        let producer = Arc::new(RecordingProducer::default());
        let orchestrator = Orchestrator::new(jobs, events, producer.clone());

        let first = orchestrator
            .create_and_enqueue(request("Write a fibonacci function"), "user-1", None, Some("key-1".to_string()))
            .await
            .unwrap();
        let second = orchestrator
            .create_and_enqueue(request("Write a fibonacci function"), "user-1", None, Some("key-1".to_string()))
            .await
            .unwrap();

        assert_eq!(first.job_id, second.job_id);
        assert_eq!(producer.calls.lock().unwrap().len(), 1, "replay must not re-enqueue");
    }

    // A different idempotency key (or task) is a genuinely new job.
    #[tokio::test]
    async fn different_idempotency_key_creates_a_new_job() {
        let jobs = Arc::new(FakeJobStore::default());
        let events = Arc::new(FakeEventLog::default());
        let producer = Arc::new(RecordingProducer::default());
        let orchestrator = Orchestrator::new(jobs, events, producer.clone());

        let first = orchestrator
            .create_and_enqueue(request("Write a fibonacci function"), "user-1", None, Some("key-1".to_string()))
            .await
            .unwrap();
        let second = orchestrator
            .create_and_enqueue(request("Write a fibonacci function"), "user-1", None, Some("key-2".to_string()))
            .await
            .unwrap();

        assert_ne!(first.job_id, second.job_id);
        assert_eq!(producer.calls.lock().unwrap().len(), 2);
    }

    // S4: the broker is unreachable. The job must land in `failed` with a
    // retryable `queue_unavailable` error rather than disappear silently.
    #[tokio::test]
    async fn enqueue_failure_fails_the_job_and_surfaces_queue_unavailable() {
        let jobs = Arc::new(FakeJobStore::default());
        let events = Arc::new(FakeEventLog::default());
        let producer = Arc::new(FailingProducer);
        let orchestrator = Orchestrator::new(Arc::clone(&jobs) as Arc<dyn JobStore>, events, producer);

        let err = orchestrator.create_and_enqueue(request("Summarize the news"), "user-1", None, None).await;

        assert!(matches!(err, Err(OrchestratorError::QueueUnavailable)));

        let stored = jobs.only().expect("job should have been persisted before enqueue was attempted");
        assert_eq!(stored.status, JobStatus::Failed);
        let job_error = stored.error.expect("failed job carries an error payload");
        assert_eq!(job_error.code, "queue_unavailable");
        assert!(job_error.retryable);
    }
}
