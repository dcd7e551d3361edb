//! Runs pending schema migrations against the configured database.

use peerforge::config::Config;

refinery::embed_migrations!("migrations");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(config.logging.level.clone()))
        .init();

    let (mut client, connection) =
        tokio_postgres::connect(&config.database.url(), tokio_postgres::NoTls).await?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "migration connection closed with error");
        }
    });

    let report = migrations::runner().run_async(&mut client).await?;
    for migration in report.applied_migrations() {
        tracing::info!(name = migration.name(), version = migration.version(), "applied migration");
    }

    Ok(())
}
