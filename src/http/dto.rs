//! Request/response shapes for the public HTTP API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::{AgentKind, Job};

fn default_mode() -> String {
    "async".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequestDto {
    pub task: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobAcceptedDto {
    pub job_id: Uuid,
    pub status: &'static str,
    pub request_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatusDto {
    pub job_id: Uuid,
    pub status: String,
    pub decided_agent: Option<AgentKind>,
    pub result: Option<serde_json::Value>,
    pub error: Option<serde_json::Value>,
    pub progress: Option<f64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Job> for JobStatusDto {
    fn from(job: Job) -> Self {
        JobStatusDto {
            job_id: job.job_id,
            status: job.status.as_str().to_string(),
            decided_agent: job.decided_agent,
            result: job.result.map(|r| serde_json::to_value(r).unwrap_or(serde_json::Value::Null)),
            error: job.error.map(|e| serde_json::to_value(e).unwrap_or(serde_json::Value::Null)),
            progress: job.progress,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}
