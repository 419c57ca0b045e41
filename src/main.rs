use anyhow::{Context, Result};
use clap::Parser;
use genai_adapter::ai::GeminiProvider;
use genai_adapter::assembler::ContentAssembler;
use genai_adapter::config::Config;
use genai_adapter::orchestrator::Orchestrator;
use genai_adapter::server::{build_router, AppState};
use genai_adapter::telemetry;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How long in-flight calls may keep running after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "genai-adapter")]
#[command(about = "Serve text and image generation backed by Gemini")]
struct CliArgs {
    /// Listen address, overriding BIND_ADDR.
    #[arg(long, value_name = "ADDR")]
    bind: Option<SocketAddr>,

    /// Explicit .env file to load before reading the environment.
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Append JSON logs to this file instead of the console (also LOG_FILE).
    #[arg(long, value_name = "PATH", env = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let _log_guard =
        telemetry::init(args.log_file.as_deref()).context("Failed to initialize logging")?;

    info!("Starting genai-adapter");

    let config = match &args.env_file {
        Some(path) => Config::from_env_file(path),
        None => Config::from_env(),
    };
    let mut config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    info!(
        model = %config.default_model,
        temperature = config.default_temperature,
        "Configuration loaded"
    );

    // One shared connection pool for every in-flight call.
    let provider = GeminiProvider::new_with_client(
        config.gemini_api_key.clone(),
        reqwest::Client::new(),
    )
    .with_base_url(config.gemini_base_url.clone());

    let mut assembler = ContentAssembler::new();
    if let Some(root) = &config.media_root {
        info!("Image paths confined to {}", root.display());
        assembler = assembler.with_media_root(root);
    }
    let orchestrator = Orchestrator::new(Arc::new(provider)).with_assembler(assembler);

    let shutdown = CancellationToken::new();
    let app = build_router(AppState::new(orchestrator, &config, shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(
        "Listening on {}",
        listener.local_addr().unwrap_or(config.bind_addr)
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    info!("Server exited");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM, then cancels straggling calls after a grace period.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down; draining in-flight calls");
    tokio::spawn(async move {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
        warn!("Grace period elapsed; cancelling remaining calls");
        shutdown.cancel();
    });
}
