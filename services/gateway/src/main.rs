// gateway: REST + SSE front end for the SOME/IP body services.

use clap::Parser;
use gateway::Gateway;
use someip_runtime::{RuntimeConfig, shutdown};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "gateway", about = "Body controller REST/SSE gateway")]
struct Args {
    /// HTTP listen port.
    #[arg(long, default_value_t = 8080)]
    http_port: u16,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
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
        http_port = args.http_port,
        "gateway starting"
    );

    let gateway = match Gateway::start(&cfg).await {
        Ok(gw) => gw,
        Err(e) => {
            eprintln!("FATAL: failed to start gateway: {e}");
            std::process::exit(1);
        }
    };

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), args.http_port);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("FATAL: cannot bind HTTP listener on {addr}: {e}");
            std::process::exit(1);
        }
    };
    info!(%addr, "HTTP listener bound");

    let serve = axum::serve(listener, gateway.router())
        .with_graceful_shutdown(shutdown::shutdown_signal());
    if let Err(e) = serve.await {
        eprintln!("FATAL: HTTP server error: {e}");
        std::process::exit(1);
    }

    info!("shutdown signal received");
    gateway.stop();
}
