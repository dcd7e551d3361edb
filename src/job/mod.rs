//! Durable record of each job and its atomic state transitions.

mod postgres;

pub use postgres::PostgresJobStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DatabaseError;

/// The closed set of agent kinds a task can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Code,
    Content,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Code => "code",
            AgentKind::Content => "content",
        }
    }
}

impl std::str::FromStr for AgentKind {
    type Err = crate::error::UnknownAgentKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(AgentKind::Code),
            "content" => Ok(AgentKind::Content),
            other => Err(crate::error::UnknownAgentKind(other.to_string())),
        }
    }
}

/// Job lifecycle status. See `ALLOWED_TRANSITIONS` for the legal edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed | JobStatus::Canceled)
    }

    /// Whether `to` is a legal edge from `self`. Mirrors the `ALLOWED_TRANSITIONS`
    /// table; kept as a pure function so it can be unit tested without a database.
    pub fn allows(&self, to: JobStatus) -> bool {
        matches!(
            (self, to),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Queued, JobStatus::Canceled)
                | (JobStatus::Running, JobStatus::Succeeded)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Canceled)
        )
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            "canceled" => Ok(JobStatus::Canceled),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A job's terminal success payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub agent: AgentKind,
    pub output: serde_json::Value,
}

/// A job's terminal failure payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

/// The unit of work tracked by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub request_id: String,
    pub owner_user_id: Option<String>,

    pub task: String,
    pub task_hash: String,
    pub idempotency_key: Option<String>,
    pub webhook_url: Option<String>,

    pub status: JobStatus,
    pub decided_agent: Option<AgentKind>,
    pub reason: Option<String>,

    pub result: Option<JobResult>,
    pub error: Option<JobError>,

    pub progress: Option<f64>,
    pub attempts: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Build a new job in `queued` status, ready to persist. Timestamps are
    /// left to the store's `INSERT ... DEFAULT now()` so that "now at insert"
    /// is evaluated per-row rather than once at construction time.
    pub fn new_queued(
        job_id: Uuid,
        request_id: String,
        owner_user_id: Option<String>,
        task: String,
        task_hash: String,
        idempotency_key: Option<String>,
        webhook_url: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Job {
            job_id,
            request_id,
            owner_user_id,
            task,
            task_hash,
            idempotency_key,
            webhook_url,
            status: JobStatus::Queued,
            decided_agent: None,
            reason: None,
            result: None,
            error: None,
            progress: Some(0.0),
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Durable job storage with atomic compare-and-set state transitions.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job. Fails with `DatabaseError::Conflict` if the
    /// `(idempotency_key, task_hash)` uniqueness constraint is violated.
    async fn create(&self, job: &Job) -> Result<(), DatabaseError>;

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>, DatabaseError>;

    async fn get_by_idempotency(
        &self,
        idempotency_key: &str,
        task_hash: &str,
    ) -> Result<Option<Job>, DatabaseError>;

    /// Atomic compare-and-set: succeeds iff the current status equals
    /// `expected_from` and `(expected_from, to)` is an allowed edge.
    async fn transition(
        &self,
        job_id: Uuid,
        to: JobStatus,
        expected_from: JobStatus,
    ) -> Result<bool, DatabaseError>;

    /// queued|running -> succeeded.
    async fn succeed(&self, job_id: Uuid, result: JobResult) -> Result<bool, DatabaseError>;

    /// queued|running -> failed.
    async fn fail(&self, job_id: Uuid, error: JobError) -> Result<bool, DatabaseError>;

    async fn set_decision(
        &self,
        job_id: Uuid,
        agent: AgentKind,
        reason: &str,
    ) -> Result<(), DatabaseError>;

    /// Clamped to `[0, 1]`.
    async fn progress(&self, job_id: Uuid, value: f64) -> Result<(), DatabaseError>;

    async fn increment_attempts(&self, job_id: Uuid, by: i32) -> Result<(), DatabaseError>;

    /// Deletes terminal jobs whose `updated_at` predates the 48-hour retention
    /// window. Returns the number of rows removed.
    async fn reap_expired(&self) -> Result<u64, DatabaseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_transitions_match_the_state_table() {
        assert!(JobStatus::Queued.allows(JobStatus::Running));
        assert!(JobStatus::Queued.allows(JobStatus::Canceled));
        assert!(JobStatus::Running.allows(JobStatus::Succeeded));
        assert!(JobStatus::Running.allows(JobStatus::Failed));
        assert!(JobStatus::Running.allows(JobStatus::Canceled));

        assert!(!JobStatus::Queued.allows(JobStatus::Succeeded));
        assert!(!JobStatus::Queued.allows(JobStatus::Failed));
        assert!(!JobStatus::Running.allows(JobStatus::Queued));
    }

    #[test]
    fn terminal_statuses_allow_nothing() {
        for terminal in [JobStatus::Succeeded, JobStatus::Failed, JobStatus::Canceled] {
            for to in [
                JobStatus::Queued,
                JobStatus::Running,
                JobStatus::Succeeded,
                JobStatus::Failed,
                JobStatus::Canceled,
            ] {
                assert!(!terminal.allows(to), "{terminal:?} -> {to:?} should be rejected");
            }
            assert!(terminal.is_terminal());
        }
    }
}
