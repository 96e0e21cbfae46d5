use anyhow::Context;
use tracing::{info, warn};

use campus_api::app::{AppServices, build_app};
use campus_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    campus_observability::init(config.log_format);

    if config.uses_dev_secret() {
        warn!("JWT_SECRET not set; using insecure dev default");
    }

    let services = AppServices::from_config(&config);
    let retention = services.retention_sweeper().spawn();
    let audit = services.audit.clone();

    let app = build_app(&config.jwt_secret, services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutting down");
    retention.shutdown().await;
    audit.flush().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
