//! Server entry point: config + env, tracing, service graph, HTTP.

use sg_core::Config;
use sg_server::{router, Services};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = match std::env::var("SG_CONFIG") {
        Ok(path) if !path.is_empty() => match Config::load(&path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("failed to load config {path}: {e}");
                std::process::exit(1);
            }
        },
        _ => Config::default(),
    };
    config.apply_env();

    let listen = config.server.listen.clone();
    let services = match Services::build(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("boot failed: {e}");
            std::process::exit(1);
        }
    };

    let app = router(services.clone());
    let listener = match tokio::net::TcpListener::bind(&listen).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("cannot bind {listen}: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(%listen, version = sg_server::VERSION, "snakeguard listening");

    let shutdown_services = services.clone();
    let serve = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    });
    if let Err(e) = serve.await {
        tracing::error!(error = %e, "server error");
    }
    shutdown_services.shutdown();
}
