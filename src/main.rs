//! news-sync binary entrypoint.
//! Loads config, connects Redis, then runs the sync loop until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use news_sync::bootstrap;
use news_sync::config::{Config, DEFAULT_CONFIG_PATH, ENV_CONFIG_PATH};
use news_sync::logging::init_tracing;
use news_sync::metrics::Metrics;

#[derive(Debug, Parser)]
#[command(name = "news-sync", version, about = "Crime news sync: Elasticsearch → Drupal")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short, global = true, env = ENV_CONFIG_PATH, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the sync loop (default)
    Run,
    /// Forget delivered item ids so the next cycle may post them again
    ClearSeen {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "fatal");
            eprintln!("news-sync: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cfg = Config::load(&cli.config)
        .with_context(|| format!("load config {}", cli.config.display()))?;
    init_tracing(cfg.debug)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_service(cfg).await,
        Command::ClearSeen { ids } => clear_seen(cfg, ids).await,
    }
}

async fn run_service(cfg: Config) -> Result<()> {
    let ledger = bootstrap::connect_ledger(&cfg).await?;
    let service = bootstrap::build_service(&cfg, ledger)?;

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let metrics = Metrics::init()?;
    let metrics_task = cfg.metrics.listen_addr.clone().map(|addr| {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics.serve(&addr, cancel).await {
                tracing::warn!(error = %format!("{e:#}"), "metrics endpoint stopped");
            }
        })
    });

    tracing::info!("starting sync service");
    service.run(cancel.clone()).await;

    cancel.cancel();
    if let Some(task) = metrics_task {
        join_background(task, "metrics").await;
    }
    tracing::info!("service stopped");
    Ok(())
}

async fn clear_seen(cfg: Config, ids: Vec<String>) -> Result<()> {
    let ledger = bootstrap::connect_ledger(&cfg).await?;
    let mut failures = 0usize;
    for id in &ids {
        match ledger.clear(id).await {
            Ok(()) => println!("cleared {id}"),
            Err(e) => {
                failures += 1;
                eprintln!("failed to clear {id}: {e}");
            }
        }
    }
    if failures > 0 {
        anyhow::bail!("{failures} of {} ids could not be cleared", ids.len());
    }
    Ok(())
}

/// Await a background task; a panic or abort is logged, not propagated.
async fn join_background(task: tokio::task::JoinHandle<()>, name: &str) -> bool {
    match task.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(task = name, error = %e, "background task did not finish cleanly");
            false
        }
    }
}

fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable; waiting for Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
