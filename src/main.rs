// src/main.rs

mod cli;

use axum::serve;
use clap::Parser;
use cli::{Cli, Commands};
use cv_keypool::{config, run, AppError};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!(signal = "Ctrl+C", "Received signal. Initiating graceful shutdown...") },
        () = terminate => { info!(signal = "Terminate", "Received signal. Initiating graceful shutdown...") },
    }
}

fn init_tracing(json_logs: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);
    if json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

fn check_config(path: Option<PathBuf>) -> Result<(), AppError> {
    let path = path.unwrap_or_else(|| PathBuf::from("config.yaml"));
    let config = config::load_config(&path)?;
    println!("Configuration OK: {}", path.display());
    println!("Credentials ({}):", config.credentials.len());
    for credential in &config.credentials {
        println!("  - {}", credential.id);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    if let Some(Commands::Check) = cli.command {
        return check_config(cli.config);
    }

    let (app, config, state) = run(cli.config).await.map_err(|e| {
        eprintln!("Application setup error: {e:?}");
        e
    })?;

    let host: IpAddr = cli.host.parse().map_err(|_| {
        AppError::config_validation(format!("Invalid bind address: {}", cli.host), Some("host"))
    })?;
    let addr = SocketAddr::new(host, config.server.port);
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!(server.address = %addr, error = ?e, "Failed to bind to address. Exiting.");
        AppError::from(e)
    })?;
    info!(server.address = %addr, "Server listening");

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!(error = ?e, "Server run loop encountered an error. Exiting.");
            AppError::from(e)
        })?;

    state.prober.shutdown();
    info!("Server shut down gracefully.");
    Ok(())
}
