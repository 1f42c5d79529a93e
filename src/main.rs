//! CLI entry point for the timeshift recorder.

use anyhow::Result;
use clap::Parser;
use timeshift_core::Scheduler;
use tokio::sync::watch;
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!("timeshift starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(signal) => {
                info!(signal, "shutdown requested, finishing the recordings in progress");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => warn!(error = %e, "cannot listen for shutdown signals"),
        }
    });

    let mut scheduler = Scheduler::new(&args.config, shutdown_rx);
    if args.once {
        let report = scheduler.run_cycle().await?;
        info!(
            saved = report.saved,
            failed = report.failed,
            next_wake = %report.next_wake,
            "single cycle completed"
        );
    } else {
        scheduler.run().await?;
    }

    info!("timeshift exiting");
    Ok(())
}

/// Resolves with the name of the first shutdown signal received.
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}
