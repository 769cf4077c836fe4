use std::sync::Arc;

use anyhow::{Error, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use webhook_relay::{
    api::run_api_server,
    clients::{executor::Executor, sink::TracingSink, webhook::WebhookClient},
    config::{Config, LogFormat},
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;

    init_tracing(config.log_format);

    let retry_config = config.retry_config();
    let client = WebhookClient::new(&retry_config)?;
    let executor: Arc<Executor> = Arc::new(Executor::new(
        client,
        retry_config,
        Arc::new(TracingSink),
    ));

    let listener = TcpListener::bind(("0.0.0.0", config.server_port)).await?;

    run_api_server(listener, Arc::clone(&executor), shutdown_signal()).await?;

    executor.shutdown().await;
    info!("Relay stopped");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    info!("Shutdown signal received");
}
