use async_trait::async_trait;
use deadpool_postgres::Pool;
use uuid::Uuid;

use crate::error::DatabaseError;

use super::{Event, EventLog, EventType};

pub struct PostgresEventLog {
    pool: Pool,
}

impl PostgresEventLog {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn parse_event_type(s: &str) -> Result<EventType, DatabaseError> {
    Ok(match s {
        "request_received" => EventType::RequestReceived,
        "route_decision" => EventType::RouteDecision,
        "agent_started" => EventType::AgentStarted,
        "tool_call" => EventType::ToolCall,
        "agent_finished" => EventType::AgentFinished,
        "error" => EventType::Error,
        other => return Err(DatabaseError::Migration(format!("unknown event type: {other}"))),
    })
}

#[async_trait]
impl EventLog for PostgresEventLog {
    async fn push(&self, event: Event) -> Result<(), DatabaseError> {
        let conn = self.pool.get().await?;
        conn.execute(
            "INSERT INTO job_events (event_id, job_id, request_id, type, payload, ts) VALUES ($1, $2, $3, $4, $5, $6)",
            &[
                &event.event_id,
                &event.job_id,
                &event.request_id,
                &event.event_type.as_str(),
                &event.payload,
                &event.ts,
            ],
        )
        .await?;
        Ok(())
    }

    async fn list_by_job(&self, job_id: Uuid, limit: i64) -> Result<Vec<Event>, DatabaseError> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                "SELECT event_id, job_id, request_id, type, payload, ts FROM job_events WHERE job_id = $1 ORDER BY ts ASC LIMIT $2",
                &[&job_id, &limit],
            )
            .await?;

        rows.iter()
            .map(|row| {
                let type_str: String = row.get("type");
                Ok(Event {
                    event_id: row.get("event_id"),
                    job_id: row.get("job_id"),
                    request_id: row.get("request_id"),
                    event_type: parse_event_type(&type_str)?,
                    payload: row.get("payload"),
                    ts: row.get("ts"),
                })
            })
            .collect()
    }
}
