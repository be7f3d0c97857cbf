//! qrgen server: hosts the QR generation action at `POST /qrgen`.

use qrgen::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        "Starting qrgen on {} (web mode: {})",
        config.bind_addr(),
        config.web_mode
    );

    let server = ActionServer::new(config);
    let action = QrGenAction::new();
    let name = action.name().to_string();
    server.register_action(name.clone(), Box::new(action)).await?;

    tracing::info!(
        "Try: curl -X POST -H 'Content-Type: application/json' -d '{{\"text\":\"hello\"}}' http://localhost:{}/{}",
        server.config().port,
        name
    );

    server.run().await
}
