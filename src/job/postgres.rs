use async_trait::async_trait;
use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::NoTls;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::DatabaseError;

use super::{AgentKind, Job, JobError, JobResult, JobStatus, JobStore};

/// PostgreSQL-backed job store.
pub struct PostgresJobStore {
    pool: Pool,
}

impl PostgresJobStore {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let mut cfg = Config::new();
        cfg.url = Some(config.url());
        cfg.pool = Some(deadpool_postgres::PoolConfig {
            max_size: config.pool_size,
            ..Default::default()
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;

        let _ = pool.get().await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> Pool {
        self.pool.clone()
    }
}

fn row_to_job(row: &tokio_postgres::Row) -> Result<Job, DatabaseError> {
    let status: String = row.get("status");
    let status = status
        .parse::<JobStatus>()
        .map_err(DatabaseError::Migration)?;
    let decided_agent: Option<String> = row.get("decided_agent");
    let decided_agent = decided_agent
        .map(|s| s.parse::<AgentKind>())
        .transpose()
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    let result: Option<serde_json::Value> = row.get("result");
    let result = result
        .map(serde_json::from_value::<JobResult>)
        .transpose()
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    let error: Option<serde_json::Value> = row.get("error");
    let error = error
        .map(serde_json::from_value::<JobError>)
        .transpose()
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    Ok(Job {
        job_id: row.get("job_id"),
        request_id: row.get("request_id"),
        owner_user_id: row.get("owner_user_id"),
        task: row.get("task"),
        task_hash: row.get("task_hash"),
        idempotency_key: row.get("idempotency_key"),
        webhook_url: row.get("webhook_url"),
        status,
        decided_agent,
        reason: row.get("reason"),
        result,
        error,
        progress: row.get("progress"),
        attempts: row.get("attempts"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn create(&self, job: &Job) -> Result<(), DatabaseError> {
        let conn = self.pool.get().await?;
        let result = conn
            .execute(
                r#"
                INSERT INTO jobs (
                    job_id, request_id, owner_user_id, task, task_hash, idempotency_key,
                    webhook_url, status, progress, attempts, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
                &[
                    &job.job_id,
                    &job.request_id,
                    &job.owner_user_id,
                    &job.task,
                    &job.task_hash,
                    &job.idempotency_key,
                    &job.webhook_url,
                    &job.status.as_str(),
                    &job.progress,
                    &job.attempts,
                    &job.created_at,
                    &job.updated_at,
                ],
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if e.code() == Some(&tokio_postgres::error::SqlState::UNIQUE_VIOLATION) {
                    Err(DatabaseError::Conflict)
                } else {
                    Err(DatabaseError::Postgres(e))
                }
            }
        }
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>, DatabaseError> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt("SELECT * FROM jobs WHERE job_id = $1", &[&job_id])
            .await?;
        row.as_ref().map(row_to_job).transpose()
    }

    async fn get_by_idempotency(
        &self,
        idempotency_key: &str,
        task_hash: &str,
    ) -> Result<Option<Job>, DatabaseError> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt(
                "SELECT * FROM jobs WHERE idempotency_key = $1 AND task_hash = $2",
                &[&idempotency_key, &task_hash],
            )
            .await?;
        row.as_ref().map(row_to_job).transpose()
    }

    async fn transition(
        &self,
        job_id: Uuid,
        to: JobStatus,
        expected_from: JobStatus,
    ) -> Result<bool, DatabaseError> {
        if !expected_from.allows(to) {
            return Ok(false);
        }

        let conn = self.pool.get().await?;
        let rows = conn
            .execute(
                "UPDATE jobs SET status = $1, updated_at = now() WHERE job_id = $2 AND status = $3",
                &[&to.as_str(), &job_id, &expected_from.as_str()],
            )
            .await?;
        Ok(rows == 1)
    }

    async fn succeed(&self, job_id: Uuid, result: JobResult) -> Result<bool, DatabaseError> {
        let payload = serde_json::to_value(&result).map_err(|e| DatabaseError::Migration(e.to_string()))?;
        let conn = self.pool.get().await?;
        let rows = conn
            .execute(
                r#"
                UPDATE jobs SET status = 'succeeded', result = $1, error = NULL, updated_at = now()
                WHERE job_id = $2 AND status IN ('queued', 'running')
                "#,
                &[&payload, &job_id],
            )
            .await?;
        Ok(rows == 1)
    }

    async fn fail(&self, job_id: Uuid, error: JobError) -> Result<bool, DatabaseError> {
        let payload = serde_json::to_value(&error).map_err(|e| DatabaseError::Migration(e.to_string()))?;
        let conn = self.pool.get().await?;
        let rows = conn
            .execute(
                r#"
                UPDATE jobs SET status = 'failed', error = $1, updated_at = now()
                WHERE job_id = $2 AND status IN ('queued', 'running')
                "#,
                &[&payload, &job_id],
            )
            .await?;
        Ok(rows == 1)
    }

    async fn set_decision(
        &self,
        job_id: Uuid,
        agent: AgentKind,
        reason: &str,
    ) -> Result<(), DatabaseError> {
        let conn = self.pool.get().await?;
        conn.execute(
            "UPDATE jobs SET decided_agent = $1, reason = $2, updated_at = now() WHERE job_id = $3",
            &[&agent.as_str(), &reason, &job_id],
        )
        .await?;
        Ok(())
    }

    async fn progress(&self, job_id: Uuid, value: f64) -> Result<(), DatabaseError> {
        let clamped = value.clamp(0.0, 1.0);
        let conn = self.pool.get().await?;
        conn.execute(
            "UPDATE jobs SET progress = $1, updated_at = now() WHERE job_id = $2",
            &[&clamped, &job_id],
        )
        .await?;
        Ok(())
    }

    async fn increment_attempts(&self, job_id: Uuid, by: i32) -> Result<(), DatabaseError> {
        let conn = self.pool.get().await?;
        conn.execute(
            "UPDATE jobs SET attempts = attempts + $1, updated_at = now() WHERE job_id = $2",
            &[&by, &job_id],
        )
        .await?;
        Ok(())
    }

    async fn reap_expired(&self) -> Result<u64, DatabaseError> {
        let conn = self.pool.get().await?;
        let rows = conn
            .execute(
                r#"
                DELETE FROM jobs
                WHERE status IN ('succeeded', 'failed', 'canceled')
                  AND updated_at < now() - interval '172800 seconds'
                "#,
                &[],
            )
            .await?;
        Ok(rows)
    }
}
