//! Code and Content agents: the actual work a job dispatches to once routed.

mod code_agent;
mod content_agent;
pub mod registry;

pub use code_agent::CodeAgent;
pub use content_agent::ContentAgent;
pub use registry::AgentRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Fire-and-forget progress reporter. Agents call this as they move through
/// their pipeline; the worker is responsible for persisting the value and
/// never lets a failure here affect the agent's own result.
pub type ProgressCb<'a> = &'a (dyn Fn(f64) + Send + Sync);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "agent", rename_all = "lowercase")]
pub enum AgentOutput {
    Code { language: String, code: String, explanation: String },
    Content { answer: String, sources: Vec<Source> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub title: String,
    pub url: String,
}

#[async_trait]
pub trait Agent: Send + Sync {
    async fn run(
        &self,
        task: &str,
        job_id: uuid::Uuid,
        request_id: &str,
        progress_cb: ProgressCb<'_>,
    ) -> Result<AgentOutput, AgentError>;
}
