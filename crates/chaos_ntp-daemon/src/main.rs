//! ChaosNTPd: an NTP daemon that serves deliberately wrong time.
//!
//! Loads configuration, prints the startup banner, installs logging and runs the server until
//! Ctrl-C or SIGTERM.

use std::process::ExitCode;
use std::sync::Arc;

use chaos_server::server::ChaosServer;
use chaos_server::server_common::ServerMetrics;
use clap::Parser;
use tracing::{error, info};

mod banner;
mod cli;
mod error;
mod logging;
mod settings;

use cli::Cli;
use error::DaemonError;
use logging::TransactionLogSink;
use settings::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_tracing(&settings.filter_directive()) {
        eprintln!("Error initialising logging: {e}");
        return ExitCode::FAILURE;
    }

    print!("{}", banner::render(&settings));
    println!();

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error starting server: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Settings) -> Result<(), DaemonError> {
    let sink = TransactionLogSink::open(&settings.logging.output, settings.logging.format)?;
    let config = settings.server_config();

    let server = ChaosServer::builder()
        .listen(settings.listen_addr()?.to_string())
        .config(config.clone())
        .event_sink(Arc::new(sink))
        .metrics(Arc::new(ServerMetrics::new()))
        .build()
        .await?;

    info!(
        "{} listening on {}",
        settings.server.name,
        server.local_addr()?
    );
    info!(
        "Stratum: {}, Initial Offset: ±{} min, Jitter: ±{} sec",
        config.stratum.0, config.policy.initial_offset_minutes, config.policy.jitter_seconds
    );

    server.run_until(shutdown_signal()).await?;

    println!("\n\nShutting down {}...", settings.server.name);
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
