use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use audit_sink::audit::{self, AuditSink};
use audit_sink::config::Config;
use audit_sink::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::load();

    // Directory creation failure aborts startup
    let sink = Arc::new(AuditSink::new(
        config.log_dir.clone(),
        config.max_log_size_bytes(),
        config.timezone(),
    )?);

    // Retention runs independently of the write path for the process lifetime
    tokio::spawn(audit::run_sweeper(
        config.log_dir.clone(),
        config.retention_policy(),
    ));

    tracing::info!("Log directory: {}", config.log_dir.display());
    tracing::info!("Log file lifetime: {} hours", config.log_lifetime_hours);
    tracing::info!("Max log size: {} MB", config.max_log_size_mb);
    tracing::info!("Time zone: {}", config.timezone());

    let state = AppState {
        sink,
        config: config.clone(),
    };
    let handle = server::start(config.port, state).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    handle.shutdown()
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "audit_sink=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
