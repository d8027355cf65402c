// provider: simulated body hardware node offering the four SOME/IP services.

use provider::{ProviderApp, ProviderSettings};
use someip_runtime::{RuntimeConfig, shutdown};
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cfg = match RuntimeConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        application = cfg.application_name,
        "provider starting"
    );

    let app = match ProviderApp::start(ProviderSettings::new(cfg)).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("FATAL: failed to start provider: {e}");
            std::process::exit(1);
        }
    };

    shutdown::shutdown_signal().await;
    info!("shutdown signal received");
    app.stop().await;
}
