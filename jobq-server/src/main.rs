use std::sync::Arc;

use clap::Parser;

use jobq_server::config::ServerConfig;
use jobq_server::coordinator::Coordinator;
use jobq_server::http;
use jobq_server::k8s::gateway::Gateway;

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level)).init();

    if let Err(error) = run(config).await {
        const BOLD_RED: &str = "\x1b[1;31m";
        const BOLD: &str = "\x1b[1m";
        const RESET: &str = "\x1b[0m";
        eprintln!("{BOLD_RED}error{RESET}{BOLD}:{RESET} {error}");
        std::process::exit(1);
    }
}

async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = kube::Client::try_default().await?;
    let gateway = Gateway::new(client, config.namespace.clone());
    let namespace = gateway.namespace()?;
    log::info!("using namespace {namespace:?}");

    let coordinator = Arc::new(Coordinator::new(gateway, config.clone()));
    let app = http::router(coordinator);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    log::info!("listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("server stopped gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    log::info!("received shutdown signal");
}
