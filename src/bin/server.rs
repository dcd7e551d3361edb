//! HTTP server: accepts job submissions and serves status polling.

use std::sync::Arc;

use peerforge::config::Config;
use peerforge::event::PostgresEventLog;
use peerforge::http::{self, AppState};
use peerforge::job::{JobStore, PostgresJobStore};
use peerforge::orchestrator::Orchestrator;
use peerforge::queue::RedisQueue;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = Config::from_env()?;

    init_tracing(&config.logging);

    let job_store: Arc<dyn JobStore> = Arc::new(PostgresJobStore::new(&config.database).await?);
    let event_log = Arc::new(PostgresEventLog::new(job_store_pool(&config).await?));
    let queue: Arc<dyn peerforge::queue::QueueProducer> = Arc::new(RedisQueue::new(&config.queue)?);

    let orchestrator =
        Arc::new(Orchestrator::new(Arc::clone(&job_store), event_log, Arc::clone(&queue)));

    let state = AppState { orchestrator, jobs: job_store, queue };
    let app = http::router(state, &config.jwt, &config.app.api_prefix);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], 8080));
    tracing::info!(%addr, "peerforge-server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn job_store_pool(config: &peerforge::config::Config) -> anyhow::Result<deadpool_postgres::Pool> {
    let mut cfg = deadpool_postgres::Config::new();
    cfg.host = Some(config.database.host.clone());
    cfg.port = Some(config.database.port);
    cfg.user = Some(config.database.user.clone());
    cfg.password = Some(config.database.password.clone());
    cfg.dbname = Some(config.database.dbname.clone());
    let pool = cfg.create_pool(Some(deadpool_postgres::Runtime::Tokio1), tokio_postgres::NoTls)?;
    Ok(pool)
}

fn init_tracing(logging: &peerforge::config::LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
