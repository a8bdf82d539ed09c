mod cli;

use anyhow::{anyhow, Context, Result};
use appointment_finder::adapter::ChromeLauncher;
use appointment_finder::logging::init_logging;
use appointment_finder::{
    AppConfig, AppError, AvailabilityEvent, BestResult, CycleController, CycleOutcome, CycleScheduler,
    CycleTiming, NotifierPlugin, ParameterStore, PluginManager,
};
use chrono::Utc;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use cli::{Cli, Commands};

const EXIT_FAILURE: u8 = 1;
const EXIT_STARTUP: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            let startup = e
                .downcast_ref::<AppError>()
                .map(AppError::is_startup_fatal)
                .unwrap_or(false);
            ExitCode::from(if startup { EXIT_STARTUP } else { EXIT_FAILURE })
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref()).map_err(AppError::from)?;
    if let Some(params) = &cli.params {
        config.store.path = params.clone();
    }

    let _log_guard = init_logging(&config.logging)?;
    info!(version = env!("CARGO_PKG_VERSION"), command = ?cli.command(), "Starting appointment finder");

    let mut store = ParameterStore::new(&config.store.path);
    match cli.command() {
        Commands::Init => {
            if store.init_template()? {
                println!("Created {}", store.path().display());
            } else {
                println!("{} already exists; left untouched", store.path().display());
            }
            Ok(())
        }
        Commands::Status => {
            require_document(&store)?;
            println!("{}", store.read()?.summary());
            Ok(())
        }
        Commands::Recycle => {
            require_document(&store)?;
            if store.recycle()? {
                println!("Checked keys moved back to pending");
            } else {
                println!("Nothing to recycle");
            }
            Ok(())
        }
        Commands::ResetBest => {
            require_document(&store)?;
            store.clear_best()?;
            println!("Best result cleared");
            Ok(())
        }
        Commands::TestNotify => test_notify(&config).await,
        Commands::Run | Commands::Once => {
            require_document(&store)?;
            store.read()?.credentials.ensure_complete()?;
            start_metrics(&config)?;

            let notifier: Arc<dyn NotifierPlugin> = Arc::new(PluginManager::from_config(&config.notifications));
            let controller = CycleController::new(store, notifier, CycleTiming::from(&config.cycle));
            let launcher = Arc::new(ChromeLauncher::new(config.browser.clone()));
            let mut scheduler = CycleScheduler::new(controller, launcher, config.scheduler.cycle_interval());
            let shutdown = shutdown_signal();

            if cli.command() == Commands::Once {
                return match scheduler.run_once(shutdown).await? {
                    Some(report) => match report.outcome {
                        CycleOutcome::Failed { phase, reason } => Err(anyhow!("cycle failed during {}: {}", phase, reason)),
                        outcome => {
                            println!(
                                "Cycle {}: {} key(s) checked, {} skipped",
                                outcome.label(),
                                report.keys_checked.len(),
                                report.keys_skipped.len()
                            );
                            if let Some(best) = report.improvement {
                                println!("New best: {}", best);
                            }
                            Ok(())
                        }
                    },
                    None => {
                        warn!("Interrupted before the cycle finished");
                        Ok(())
                    }
                };
            }

            let stats = scheduler.run(shutdown).await;
            info!(
                cycles = stats.cycles_run,
                improvements = stats.improvements,
                uptime_seconds = stats.uptime_seconds,
                "Shut down cleanly"
            );
            Ok(())
        }
    }
}

fn require_document(store: &ParameterStore) -> Result<()> {
    if store.exists() {
        return Ok(());
    }
    Err(AppError::Validation(format!(
        "parameters document not found at {} (create one with `appointment-finder init`)",
        store.path().display()
    ))
    .into())
}

fn start_metrics(config: &AppConfig) -> Result<()> {
    if !config.metrics.enabled {
        return Ok(());
    }
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.metrics.port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to start Prometheus exporter")?;
    info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// First Ctrl+C asks the scheduler to stop after closing the browser.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
            let _ = tx.send(true);
        }
    });
    rx
}

async fn test_notify(config: &AppConfig) -> Result<()> {
    let manager = PluginManager::from_config(&config.notifications);
    let types = manager.list_notifier_types().await;
    if types.is_empty() {
        return Err(AppError::Validation("no notifiers configured".into()).into());
    }

    let sample = BestResult::new(Utc::now().date_naive(), "00000");
    let result = manager.notify(&AvailabilityEvent::new(sample, None)).await?;
    if result.success {
        println!("Delivered via {}", result.message_id.unwrap_or_else(|| types.join(",")));
        Ok(())
    } else {
        Err(anyhow!("test notification failed: {}", result.error.unwrap_or_default()))
    }
}
