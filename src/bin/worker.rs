//! Long-running worker process: dequeues jobs and drives them to completion.

use std::sync::Arc;

use peerforge::agent::registry::AgentRegistry;
use peerforge::config::Config;
use peerforge::event::{EventLog, PostgresEventLog};
use peerforge::job::{JobStore, PostgresJobStore};
use peerforge::llm::LlmClientFactory;
use peerforge::queue::{QueueConsumer, RedisQueue};
use peerforge::search::SerpApiProvider;
use peerforge::web::WebClient;
use peerforge::worker::Worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = Config::from_env()?;

    let filter = tracing_subscriber::EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let job_store: Arc<dyn JobStore> = Arc::new(PostgresJobStore::new(&config.database).await?);

    let mut event_pool_cfg = deadpool_postgres::Config::new();
    event_pool_cfg.url = Some(config.database.url());
    let event_pool =
        event_pool_cfg.create_pool(Some(deadpool_postgres::Runtime::Tokio1), tokio_postgres::NoTls)?;
    let event_log: Arc<dyn EventLog> = Arc::new(PostgresEventLog::new(event_pool));

    let consumer: Arc<dyn QueueConsumer> = Arc::new(RedisQueue::new(&config.queue)?);

    let search_provider = SerpApiProvider::new(&config.search, &config.web.user_agent, config.web.timeout_s)
        .map(|p| Arc::new(p) as Arc<dyn peerforge::search::SearchProvider>)
        .ok();
    let web_client = Arc::new(WebClient::new(&config.web, search_provider));
    let llm_factory = Arc::new(LlmClientFactory::new(config.llm.clone()));
    let agents = Arc::new(AgentRegistry::new(llm_factory, web_client));

    let worker = Worker::new(Arc::clone(&job_store), event_log, consumer, agents);

    tokio::spawn(reap_expired_periodically(job_store));

    tracing::info!("peerforge-worker started, polling queue");
    loop {
        if let Err(e) = worker.run_once().await {
            tracing::error!(error = %e, "worker iteration failed, backing off");
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    }
}

/// Deletes terminal jobs past the 48-hour retention window on a fixed tick.
/// Runs alongside the dequeue loop rather than blocking it.
async fn reap_expired_periodically(jobs: Arc<dyn JobStore>) {
    let mut tick = tokio::time::interval(std::time::Duration::from_secs(3600));
    loop {
        tick.tick().await;
        match jobs.reap_expired().await {
            Ok(count) if count > 0 => tracing::info!(count, "reaped expired jobs"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to reap expired jobs"),
        }
    }
}
