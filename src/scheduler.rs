use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::adapter::SessionLauncher;
use crate::core::{CycleController, CycleOutcome, CycleReport};
use crate::utils::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub cycles_run: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub exhausted: u64,
    pub improvements: u64,
    pub last_error: Option<String>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub uptime_seconds: u64,
}

/// Resolves once shutdown is requested. A dropped sender never requests it.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub struct CycleScheduler {
    controller: CycleController,
    launcher: Arc<dyn SessionLauncher>,
    interval: Duration,
    stats: SchedulerStats,
    start_time: DateTime<Utc>,
}

impl CycleScheduler {
    pub fn new(controller: CycleController, launcher: Arc<dyn SessionLauncher>, interval: Duration) -> Self {
        Self {
            controller,
            launcher,
            interval,
            stats: SchedulerStats::default(),
            start_time: Utc::now(),
        }
    }

    pub fn get_stats(&self) -> SchedulerStats {
        let uptime = Utc::now().signed_duration_since(self.start_time);
        SchedulerStats {
            uptime_seconds: uptime.num_seconds().max(0) as u64,
            ..self.stats.clone()
        }
    }

    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> SchedulerStats {
        info!(interval = ?self.interval, "Scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.cycle_in_session(&mut shutdown).await {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => error!("Cycle could not start: {}", e),
            }

            debug!(interval = ?self.interval, "Sleeping until next cycle");
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        let stats = self.get_stats();
        info!(cycles = stats.cycles_run, succeeded = stats.succeeded, failed = stats.failed, "Scheduler stopped");
        stats
    }

    /// Runs a single cycle. `Ok(None)` means shutdown interrupted it.
    pub async fn run_once(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<Option<CycleReport>> {
        self.cycle_in_session(&mut shutdown).await
    }

    async fn cycle_in_session(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<Option<CycleReport>> {
        let mut session = match self.launcher.launch().await {
            Ok(session) => session,
            Err(e) => {
                self.stats.cycles_run += 1;
                self.stats.failed += 1;
                self.stats.last_error = Some(e.to_string());
                self.stats.last_cycle_at = Some(Utc::now());
                return Err(e);
            }
        };

        let report = tokio::select! {
            biased;
            _ = shutdown_requested(shutdown) => None,
            report = self.controller.run_cycle(session.as_mut()) => Some(report),
        };

        if report.is_none() {
            warn!(phase = %self.controller.phase(), "Shutdown requested; abandoning cycle");
        }
        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {}", e);
        }

        if let Some(report) = &report {
            self.record(report);
        }
        Ok(report)
    }

    fn record(&mut self, report: &CycleReport) {
        self.stats.cycles_run += 1;
        self.stats.last_cycle_at = Some(Utc::now());
        if report.improvement.is_some() {
            self.stats.improvements += 1;
        }
        match &report.outcome {
            CycleOutcome::Completed => self.stats.succeeded += 1,
            CycleOutcome::Exhausted => {
                self.stats.succeeded += 1;
                self.stats.exhausted += 1;
            }
            CycleOutcome::Failed { phase, reason } => {
                self.stats.failed += 1;
                self.stats.last_error = Some(format!("{}: {}", phase, reason));
            }
        }
    }
}
