//! Append-only per-job event trail. All writes are best-effort.

mod postgres;

pub use postgres::PostgresEventLog;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DatabaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RequestReceived,
    RouteDecision,
    AgentStarted,
    ToolCall,
    AgentFinished,
    Error,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::RequestReceived => "request_received",
            EventType::RouteDecision => "route_decision",
            EventType::AgentStarted => "agent_started",
            EventType::ToolCall => "tool_call",
            EventType::AgentFinished => "agent_finished",
            EventType::Error => "error",
        }
    }
}

/// An immutable observability record. Events are never mutated once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: Uuid,
    pub job_id: Uuid,
    pub request_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub payload: serde_json::Value,
    pub ts: DateTime<Utc>,
}

impl Event {
    pub fn new(job_id: Uuid, request_id: &str, event_type: EventType, payload: serde_json::Value) -> Self {
        Event {
            event_id: Uuid::new_v4(),
            job_id,
            request_id: request_id.to_string(),
            event_type,
            payload,
            ts: Utc::now(),
        }
    }
}

#[async_trait]
pub trait EventLog: Send + Sync {
    async fn push(&self, event: Event) -> Result<(), DatabaseError>;

    async fn list_by_job(&self, job_id: Uuid, limit: i64) -> Result<Vec<Event>, DatabaseError>;
}

/// Push an event, swallowing any failure. Event Log writes must never cause
/// a job-state rollback; callers log-and-continue rather than propagate.
pub async fn push_best_effort(log: &dyn EventLog, event: Event) {
    let job_id = event.job_id;
    let event_type = event.event_type;
    if let Err(e) = log.push(event).await {
        tracing::warn!(job_id = %job_id, event_type = event_type.as_str(), error = %e, "failed to persist job event");
    }
}
