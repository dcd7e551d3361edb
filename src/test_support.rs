//! In-memory fakes for exercising the Orchestrator/Worker state machine
//! without a real database or broker. Test-only.
#![cfg(test)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{DatabaseError, QueueError};
use crate::event::{Event, EventLog};
use crate::job::{AgentKind, Job, JobError, JobResult, JobStatus, JobStore};
use crate::queue::{ExecuteMessage, QueueConsumer, QueueProducer};

#[derive(Default)]
pub struct FakeJobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
}

impl FakeJobStore {
    pub fn seed(&self, job: Job) {
        self.jobs.lock().unwrap().insert(job.job_id, job);
    }

    pub fn snapshot(&self, job_id: Uuid) -> Job {
        self.jobs.lock().unwrap().get(&job_id).cloned().expect("job not seeded")
    }

    /// Returns the sole stored job. Panics if there is more than one; for
    /// tests where exactly one job was ever created.
    pub fn only(&self) -> Option<Job> {
        let jobs = self.jobs.lock().unwrap();
        assert!(jobs.len() <= 1, "expected at most one job, found {}", jobs.len());
        jobs.values().next().cloned()
    }
}

#[async_trait]
impl JobStore for FakeJobStore {
    async fn create(&self, job: &Job) -> Result<(), DatabaseError> {
        let mut jobs = self.jobs.lock().unwrap();
        let collides = jobs.values().any(|existing| {
            job.idempotency_key.is_some()
                && existing.idempotency_key == job.idempotency_key
                && existing.task_hash == job.task_hash
        });
        if collides {
            return Err(DatabaseError::Conflict);
        }
        jobs.insert(job.job_id, job.clone());
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>, DatabaseError> {
        Ok(self.jobs.lock().unwrap().get(&job_id).cloned())
    }

    async fn get_by_idempotency(
        &self,
        idempotency_key: &str,
        task_hash: &str,
    ) -> Result<Option<Job>, DatabaseError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .find(|j| j.idempotency_key.as_deref() == Some(idempotency_key) && j.task_hash == task_hash)
            .cloned())
    }

    async fn transition(&self, job_id: Uuid, to: JobStatus, expected_from: JobStatus) -> Result<bool, DatabaseError> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(&job_id) {
            Some(job) if job.status == expected_from && expected_from.allows(to) => {
                job.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn succeed(&self, job_id: Uuid, result: JobResult) -> Result<bool, DatabaseError> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(&job_id) {
            Some(job) if !job.status.is_terminal() => {
                job.status = JobStatus::Succeeded;
                job.result = Some(result);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail(&self, job_id: Uuid, error: JobError) -> Result<bool, DatabaseError> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(&job_id) {
            Some(job) if !job.status.is_terminal() => {
                job.status = JobStatus::Failed;
                job.error = Some(error);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_decision(&self, job_id: Uuid, agent: AgentKind, reason: &str) -> Result<(), DatabaseError> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&job_id) {
            job.decided_agent = Some(agent);
            job.reason = Some(reason.to_string());
        }
        Ok(())
    }

    async fn progress(&self, job_id: Uuid, value: f64) -> Result<(), DatabaseError> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&job_id) {
            job.progress = Some(value.clamp(0.0, 1.0));
        }
        Ok(())
    }

    async fn increment_attempts(&self, job_id: Uuid, by: i32) -> Result<(), DatabaseError> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&job_id) {
            job.attempts += by;
        }
        Ok(())
    }

    async fn reap_expired(&self) -> Result<u64, DatabaseError> {
        Ok(0)
    }
}

#[derive(Default)]
pub struct FakeEventLog {
    pub events: Mutex<Vec<Event>>,
}

impl FakeEventLog {
    pub fn types_for(&self, job_id: Uuid) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().filter(|e| e.job_id == job_id).map(|e| e.event_type.as_str()).collect()
    }
}

#[async_trait]
impl EventLog for FakeEventLog {
    async fn push(&self, event: Event) -> Result<(), DatabaseError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    async fn list_by_job(&self, job_id: Uuid, limit: i64) -> Result<Vec<Event>, DatabaseError> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.job_id == job_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

/// Producer that always fails, modeling a broker outage.
pub struct FailingProducer;

#[async_trait]
impl QueueProducer for FailingProducer {
    async fn enqueue_execute(
        &self,
        _job_id: Uuid,
        _request_id: &str,
        _owner_user_id: Option<&str>,
    ) -> Result<(), QueueError> {
        Err(QueueError::Unavailable { reason: "connection refused".to_string() })
    }

    async fn ping(&self) -> Result<(), QueueError> {
        Err(QueueError::Unavailable { reason: "connection refused".to_string() })
    }
}

/// Producer that records every call and always succeeds.
#[derive(Default)]
pub struct RecordingProducer {
    pub calls: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl QueueProducer for RecordingProducer {
    async fn enqueue_execute(
        &self,
        job_id: Uuid,
        _request_id: &str,
        _owner_user_id: Option<&str>,
    ) -> Result<(), QueueError> {
        self.calls.lock().unwrap().push(job_id);
        Ok(())
    }

    async fn ping(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

/// Consumer that yields one preloaded message, then reports empty forever.
#[derive(Default)]
pub struct OnceConsumer {
    message: Mutex<Option<ExecuteMessage>>,
}

impl OnceConsumer {
    pub fn new(message: ExecuteMessage) -> Self {
        Self { message: Mutex::new(Some(message)) }
    }
}

#[async_trait]
impl QueueConsumer for OnceConsumer {
    async fn dequeue(&self) -> Result<Option<ExecuteMessage>, QueueError> {
        Ok(self.message.lock().unwrap().take())
    }
}
