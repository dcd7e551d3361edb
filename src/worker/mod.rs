//! Dequeues jobs and drives them through routing, agent execution and the
//! terminal state transition. One worker process runs a consumer loop that
//! calls `run_once` per message.

use std::sync::Arc;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::agent::registry::AgentRegistry;
use crate::error::{AgentError, DatabaseError};
use crate::event::{self, Event, EventLog, EventType};
use crate::job::{JobError, JobResult, JobStatus, JobStore};
use crate::queue::{ExecuteMessage, QueueConsumer};
use crate::router;

pub struct Worker {
    jobs: Arc<dyn JobStore>,
    events: Arc<dyn EventLog>,
    consumer: Arc<dyn QueueConsumer>,
    agents: Arc<AgentRegistry>,
}

impl Worker {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        events: Arc<dyn EventLog>,
        consumer: Arc<dyn QueueConsumer>,
        agents: Arc<AgentRegistry>,
    ) -> Self {
        Self { jobs, events, consumer, agents }
    }

    /// Blocks on the consumer for the next message and runs it to completion.
    /// Returns without error on a clean dequeue timeout (no message).
    pub async fn run_once(&self) -> Result<(), DatabaseError> {
        let message = match self.consumer.dequeue().await {
            Ok(Some(m)) => m,
            Ok(None) => return Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "dequeue failed, backing off");
                return Ok(());
            }
        };
        self.process(message).await
    }

    async fn process(&self, message: ExecuteMessage) -> Result<(), DatabaseError> {
        let ExecuteMessage { job_id, request_id, .. } = message;

        self.jobs.increment_attempts(job_id, 1).await?;

        let transitioned = self.jobs.transition(job_id, JobStatus::Running, JobStatus::Queued).await?;
        if !transitioned {
            event::push_best_effort(
                self.events.as_ref(),
                Event::new(
                    job_id,
                    &request_id,
                    EventType::Error,
                    serde_json::json!({ "stage": "transition", "msg": "state_not_queued_or_already_taken" }),
                ),
            )
            .await;
            return Ok(());
        }

        event::push_best_effort(
            self.events.as_ref(),
            Event::new(job_id, &request_id, EventType::AgentStarted, serde_json::json!({})),
        )
        .await;

        let job = match self.jobs.get(job_id).await? {
            Some(j) => j,
            None => {
                let _ = self
                    .jobs
                    .fail(
                        job_id,
                        JobError {
                            code: "job_not_found".to_string(),
                            message: "Job not found".to_string(),
                            retryable: false,
                            detail: None,
                        },
                    )
                    .await;
                event::push_best_effort(
                    self.events.as_ref(),
                    Event::new(
                        job_id,
                        &request_id,
                        EventType::Error,
                        serde_json::json!({ "stage": "load_job", "err": "job_not_found" }),
                    ),
                )
                .await;
                return Ok(());
            }
        };

        let pending: Arc<std::sync::Mutex<Vec<JoinHandle<()>>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let result = self.run_agent(&job.task, job_id, &request_id, Arc::clone(&pending)).await;

        match result {
            Ok((agent_kind, output)) => {
                let ok = self
                    .jobs
                    .succeed(job_id, JobResult { agent: agent_kind, output })
                    .await?;
                if ok {
                    event::push_best_effort(
                        self.events.as_ref(),
                        Event::new(
                            job_id,
                            &request_id,
                            EventType::AgentFinished,
                            serde_json::json!({ "agent": agent_kind.as_str() }),
                        ),
                    )
                    .await;
                    self.jobs.progress(job_id, 1.0).await?;
                } else {
                    event::push_best_effort(
                        self.events.as_ref(),
                        Event::new(
                            job_id,
                            &request_id,
                            EventType::Error,
                            serde_json::json!({ "stage": "succeed", "msg": "state_not_modified" }),
                        ),
                    )
                    .await;
                }
            }
            Err(AgentRunError::Database(db_err)) => {
                let _ = self
                    .jobs
                    .fail(
                        job_id,
                        JobError {
                            code: "database_error".to_string(),
                            message: db_err.to_string(),
                            retryable: true,
                            detail: None,
                        },
                    )
                    .await;
                event::push_best_effort(
                    self.events.as_ref(),
                    Event::new(
                        job_id,
                        &request_id,
                        EventType::Error,
                        serde_json::json!({ "stage": "agent_run", "err": db_err.to_string() }),
                    ),
                )
                .await;

                let handles = std::mem::take(&mut *pending.lock().expect("pending handle list poisoned"));
                futures::future::join_all(handles).await;
                return Err(db_err);
            }
            Err(e) => {
                let code = match &e {
                    AgentRunError::Agent(ae) => ae.code(),
                    AgentRunError::UnknownKind(_) => "agent_run_error",
                    AgentRunError::Database(_) => unreachable!("handled above"),
                };
                let retryable = match &e {
                    AgentRunError::Agent(ae) => ae.retryable(),
                    AgentRunError::UnknownKind(_) => false,
                    AgentRunError::Database(_) => unreachable!("handled above"),
                };
                let _ = self
                    .jobs
                    .fail(
                        job_id,
                        JobError { code: code.to_string(), message: e.to_string(), retryable, detail: None },
                    )
                    .await;
                event::push_best_effort(
                    self.events.as_ref(),
                    Event::new(
                        job_id,
                        &request_id,
                        EventType::Error,
                        serde_json::json!({ "stage": "agent_run", "err": e.to_string() }),
                    ),
                )
                .await;
            }
        }

        let handles = std::mem::take(&mut *pending.lock().expect("pending handle list poisoned"));
        futures::future::join_all(handles).await;
        Ok(())
    }

    async fn run_agent(
        &self,
        task: &str,
        job_id: Uuid,
        request_id: &str,
        pending: Arc<std::sync::Mutex<Vec<JoinHandle<()>>>>,
    ) -> Result<(crate::job::AgentKind, serde_json::Value), AgentRunError> {
        let decision = router::decide(task);

        self.jobs.set_decision(job_id, decision.agent, &decision.reason).await?;
        event::push_best_effort(
            self.events.as_ref(),
            Event::new(
                job_id,
                request_id,
                EventType::RouteDecision,
                serde_json::json!({ "agent": decision.agent.as_str(), "reason": decision.reason }),
            ),
        )
        .await;

        let agent = self.agents.get(decision.agent).await.map_err(AgentRunError::UnknownKind)?;

        event::push_best_effort(
            self.events.as_ref(),
            Event::new(
                job_id,
                request_id,
                EventType::AgentStarted,
                serde_json::json!({ "agent": decision.agent.as_str() }),
            ),
        )
        .await;

        let jobs = Arc::clone(&self.jobs);
        let events = Arc::clone(&self.events);
        let request_id_owned = request_id.to_string();

        let progress_cb = move |value: f64| {
            let jobs = Arc::clone(&jobs);
            let events = Arc::clone(&events);
            let request_id = request_id_owned.clone();
            let handle = tokio::spawn(async move {
                let _ = jobs.progress(job_id, value).await;
                event::push_best_effort(
                    events.as_ref(),
                    Event::new(job_id, &request_id, EventType::ToolCall, serde_json::json!({ "progress": value })),
                )
                .await;
            });
            pending.lock().expect("pending handle list poisoned").push(handle);
        };

        let output = agent.run(task, job_id, request_id, &progress_cb).await.map_err(AgentRunError::Agent)?;

        let value = serde_json::to_value(&output).expect("AgentOutput always serializes to JSON");

        Ok((decision.agent, value))
    }
}

#[derive(Debug, thiserror::Error)]
enum AgentRunError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("unknown agent kind: {0}")]
    UnknownKind(crate::error::UnknownAgentKind),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::registry::AgentRegistry;
    use crate::config::{LlmConfig, WebConfig};
    use crate::job::Job;
    use crate::llm::LlmClientFactory;
    use crate::test_support::{FakeEventLog, FakeJobStore, OnceConsumer};
    use crate::web::WebClient;

    fn test_registry() -> Arc<AgentRegistry> {
        let llm = Arc::new(LlmClientFactory::new(LlmConfig {
            provider: "openai".into(),
            model_content: "gpt-4o-mini".into(),
            model_code: "gpt-4o-mini".into(),
            timeout_s: 30,
            max_retries: 0,
            api_key: secrecy::SecretString::from("test-key".to_string()),
            base_url: "https://api.openai.com/v1".into(),
        }));
        let web = Arc::new(WebClient::new(&WebConfig { user_agent: "test".into(), timeout_s: 5, whitelist: vec![] }, None));
        Arc::new(AgentRegistry::new(llm, web))
    }

    fn seeded_job(job_id: Uuid, status: JobStatus) -> Job {
        let mut job = Job::new_queued(job_id, "req-1".to_string(), None, "do something".to_string(), "hash".to_string(), None, None);
        job.status = status;
        job
    }

    // A clean dequeue timeout must not touch the job store at all.
    #[tokio::test]
    async fn run_once_returns_ok_on_empty_dequeue() {
        let jobs = Arc::new(FakeJobStore::default());
        let events = Arc::new(FakeEventLog::default());
        let consumer = Arc::new(OnceConsumer::default());
        let worker = Worker::new(jobs, events, consumer, test_registry());

        assert!(worker.run_once().await.is_ok());
    }

    // S7: another worker already claimed this job (status is already
    // `running`, not `queued`) by the time this one dequeues it. The CAS
    // transition must fail closed: no double-processing, no state mutation,
    // an error event recorded, and the iteration still completes cleanly.
    #[tokio::test]
    async fn lost_transition_race_leaves_job_state_untouched() {
        let job_id = Uuid::new_v4();
        let jobs = Arc::new(FakeJobStore::default());
        jobs.seed(seeded_job(job_id, JobStatus::Running));
        let events = Arc::new(FakeEventLog::default());
        let consumer =
            Arc::new(OnceConsumer::new(ExecuteMessage { job_id, request_id: "req-1".to_string(), owner_user_id: None }));
        let worker = Worker::new(Arc::clone(&jobs) as Arc<dyn JobStore>, Arc::clone(&events) as Arc<dyn EventLog>, consumer, test_registry());

        let result = worker.run_once().await;

        assert!(result.is_ok());
        let job = jobs.snapshot(job_id);
        assert_eq!(job.status, JobStatus::Running, "status must not change on a failed CAS");
        assert_eq!(job.attempts, 1, "attempts still count the delivery even when the CAS loses the race");
        assert!(events.types_for(job_id).contains(&"error"));
    }
}
