// ABOUTME: Broker entry point: config, logging, and gRPC server startup.
// ABOUTME: Serves Registration and Messaging until ctrl-c, then drains via cancellation.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tonic::transport::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use botrpc::messaging_server::MessagingServer;
use botrpc::registration_server::RegistrationServer;
use chatbot::broker::{MessagingService, RegistrationService};
use chatbot::config::Config;
use chatbot::dispatch::{DispatchConfig, Dispatcher};
use chatbot::registry::Registry;

#[derive(Parser)]
#[command(
    name = "chatbot",
    about = "Chat-message broker routing chat events to registered handlers"
)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address override (host:port)
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.listen.addr = listen;
    }

    let addr: SocketAddr = config
        .listen
        .addr
        .parse()
        .with_context(|| format!("invalid listen address {:?}", config.listen.addr))?;

    tracing::info!(
        listen = %addr,
        handler_timeout_secs = ?config.dispatch.handler_timeout_secs,
        "Configuration loaded"
    );

    let shutdown = chatbot::shutdown::install();

    let registry = Arc::new(Registry::new());
    let dispatcher = Arc::new(Dispatcher::new(
        registry.clone(),
        DispatchConfig {
            handler_timeout: config.dispatch.handler_timeout(),
        },
        shutdown.clone(),
    ));

    tracing::info!("Broker listening for registrations and chat messages");

    // A failed bind is fatal; everything past it is contained per branch.
    let wait_shutdown = shutdown.clone();
    Server::builder()
        .add_service(RegistrationServer::new(RegistrationService::new(registry)))
        .add_service(MessagingServer::new(MessagingService::new(dispatcher)))
        .serve_with_shutdown(addr, async move { wait_shutdown.cancelled().await })
        .await
        .context("broker gRPC server failed")?;

    tracing::info!("Broker shut down");
    Ok(())
}
