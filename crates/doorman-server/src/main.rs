use anyhow::Context;
use doorman_server::ServerConfig;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ServerConfig::load().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", config.log_level))),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.host,
        port = config.port,
        doors = config.doors.len(),
        "Starting doorman gateway"
    );

    doorman_server::run(config, shutdown_signal())
        .await
        .context("Gateway terminated with an error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}
