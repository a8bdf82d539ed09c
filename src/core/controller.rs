use metrics::{counter, gauge};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::adapter::SiteAdapter;
use crate::config::CycleConfig;
use crate::core::comparator;
use crate::models::{BestResult, Credentials};
use crate::plugins::{AvailabilityEvent, NotifierPlugin};
use crate::store::ParameterStore;
use crate::utils::error::Result;
use crate::utils::pacing::Pacing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CyclePhase {
    Idle,
    Authenticating,
    Verifying,
    ProcessingKey(usize),
    ChallengeWait,
    Recycling,
    Done,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CyclePhase::Idle => write!(f, "idle"),
            CyclePhase::Authenticating => write!(f, "authenticating"),
            CyclePhase::Verifying => write!(f, "verifying"),
            CyclePhase::ProcessingKey(i) => write!(f, "processing key #{}", i + 1),
            CyclePhase::ChallengeWait => write!(f, "challenge wait"),
            CyclePhase::Recycling => write!(f, "recycling"),
            CyclePhase::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Ok,
    Skip,
    Abort(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CycleOutcome {
    Completed,
    Exhausted,
    Failed { phase: CyclePhase, reason: String },
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Completed => "completed",
            CycleOutcome::Exhausted => "exhausted",
            CycleOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, CycleOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub outcome: CycleOutcome,
    pub keys_checked: Vec<String>,
    pub keys_skipped: Vec<String>,
    pub improvement: Option<BestResult>,
    pub notified: bool,
    pub recycled: bool,
}

impl CycleReport {
    fn new(cycle_id: Uuid) -> Self {
        Self {
            cycle_id,
            outcome: CycleOutcome::Completed,
            keys_checked: Vec::new(),
            keys_skipped: Vec::new(),
            improvement: None,
            notified: false,
            recycled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTiming {
    pub challenge_cooldown: Duration,
    pub pacing: Pacing,
}

impl CycleTiming {
    pub const fn immediate() -> Self {
        Self {
            challenge_cooldown: Duration::ZERO,
            pacing: Pacing::none(),
        }
    }
}

impl From<&CycleConfig> for CycleTiming {
    fn from(config: &CycleConfig) -> Self {
        Self {
            challenge_cooldown: config.challenge_cooldown(),
            pacing: config.pacing(),
        }
    }
}

fn step_completed(step: &'static str, result: Result<bool>) -> bool {
    match result {
        Ok(true) => true,
        Ok(false) => {
            warn!(step, "Step did not complete");
            false
        }
        Err(e) => {
            warn!(step, error = %e, "Step failed");
            false
        }
    }
}

pub struct CycleController {
    store: ParameterStore,
    notifier: Arc<dyn NotifierPlugin>,
    timing: CycleTiming,
    phase: CyclePhase,
}

impl CycleController {
    pub fn new(store: ParameterStore, notifier: Arc<dyn NotifierPlugin>, timing: CycleTiming) -> Self {
        Self {
            store,
            notifier,
            timing,
            phase: CyclePhase::Idle,
        }
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Runs one full cycle. Never fails: problems end up in the report.
    pub async fn run_cycle(&mut self, adapter: &mut dyn SiteAdapter) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", %cycle_id);

        async move {
            let mut report = CycleReport::new(cycle_id);
            self.phase = CyclePhase::Idle;

            if let Err(e) = self.drive(adapter, &mut report).await {
                error!(phase = %self.phase, "Cycle stopped by store error: {}", e);
                report.outcome = CycleOutcome::Failed {
                    phase: self.phase,
                    reason: e.to_string(),
                };
            }
            self.phase = CyclePhase::Done;

            counter!("finder_cycles_total", "outcome" => report.outcome.label()).increment(1);
            match &report.outcome {
                CycleOutcome::Failed { phase, reason } => {
                    warn!(%phase, checked = report.keys_checked.len(), "Cycle failed: {}", reason)
                }
                outcome => info!(
                    outcome = outcome.label(),
                    checked = report.keys_checked.len(),
                    skipped = report.keys_skipped.len(),
                    improved = report.improvement.is_some(),
                    "Cycle finished"
                ),
            }
            report
        }
        .instrument(span)
        .await
    }

    fn fail(&self, report: &mut CycleReport, reason: impl Into<String>) {
        report.outcome = CycleOutcome::Failed {
            phase: self.phase,
            reason: reason.into(),
        };
    }

    async fn drive(&mut self, adapter: &mut dyn SiteAdapter, report: &mut CycleReport) -> Result<()> {
        let state = self.store.read()?;
        gauge!("finder_pending_keys").set(state.pending_keys.len() as f64);

        if let Err(e) = state.credentials.ensure_complete() {
            self.fail(report, e.to_string());
            return Ok(());
        }

        if state.pending_keys.is_empty() {
            self.phase = CyclePhase::Recycling;
            report.recycled = self.store.recycle()?;
            report.outcome = CycleOutcome::Exhausted;
            info!(recycled = report.recycled, "No pending keys; recycled checked keys");
            return Ok(());
        }

        if !self.establish_session(adapter, &state.credentials).await {
            self.fail(report, "could not sign in to the booking site");
            return Ok(());
        }

        if !self.clear_challenge(adapter).await {
            self.fail(report, "access challenge did not clear");
            return Ok(());
        }

        let total = state.pending_keys.len();
        for (index, key) in state.pending_keys.iter().enumerate() {
            self.phase = CyclePhase::ProcessingKey(index);
            let is_last = index + 1 == total;

            let outcome = match self.process_key(adapter, &state.credentials, key, is_last, report).await {
                Ok(outcome) => outcome,
                Err(e) => StepOutcome::Abort(format!("parameter document update failed: {}", e)),
            };
            match outcome {
                StepOutcome::Ok => {}
                StepOutcome::Skip => {
                    counter!("finder_keys_skipped_total").increment(1);
                    report.keys_skipped.push(key.clone());
                }
                StepOutcome::Abort(reason) => {
                    error!(%key, "Abandoning remaining keys: {}", reason);
                    self.fail(report, reason);
                    break;
                }
            }
        }

        self.phase = CyclePhase::Recycling;
        match self.recycle_if_drained() {
            Ok(recycled) => report.recycled = recycled,
            Err(e) => {
                error!("Recycling failed: {}", e);
                if report.outcome.is_success() {
                    self.fail(report, e.to_string());
                }
            }
        }

        // Persisted improvements are announced even after an abort.
        if let Some(best) = report.improvement.clone() {
            report.notified = self.announce(best, state.best.clone()).await;
        }

        Ok(())
    }

    fn recycle_if_drained(&mut self) -> Result<bool> {
        let after = self.store.read()?;
        gauge!("finder_pending_keys").set(after.pending_keys.len() as f64);
        if !after.pending_keys.is_empty() {
            return Ok(false);
        }
        let recycled = self.store.recycle()?;
        info!("All keys checked; recycled for the next cycle");
        Ok(recycled)
    }

    async fn establish_session(&mut self, adapter: &mut dyn SiteAdapter, credentials: &Credentials) -> bool {
        self.phase = CyclePhase::Authenticating;
        if !step_completed("authenticate", adapter.authenticate(credentials).await) {
            return false;
        }

        self.phase = CyclePhase::Verifying;
        self.timing.pacing.pause().await;
        step_completed("verify_ready_page", adapter.verify_ready_page().await)
    }

    /// Detects a challenge and waits it out once. A detection error counts
    /// as a challenge that did not clear.
    async fn clear_challenge(&mut self, adapter: &mut dyn SiteAdapter) -> bool {
        if !self.challenge_present(adapter).await {
            return true;
        }

        let resumed = self.phase;
        self.phase = CyclePhase::ChallengeWait;
        warn!(cooldown = ?self.timing.challenge_cooldown, "Access challenge detected; waiting");
        tokio::time::sleep(self.timing.challenge_cooldown).await;

        if let Err(e) = adapter.reload().await {
            warn!("Reload after challenge failed: {}", e);
        }

        let resolved = !self.challenge_present(adapter).await;
        counter!("finder_access_challenges_total", "resolved" => if resolved { "true" } else { "false" }).increment(1);
        if resolved {
            info!("Access challenge cleared");
            self.phase = resumed;
        } else {
            warn!("Access challenge persists");
        }
        resolved
    }

    async fn challenge_present(&mut self, adapter: &mut dyn SiteAdapter) -> bool {
        match adapter.detect_access_challenge().await {
            Ok(present) => present,
            Err(e) => {
                warn!("Challenge detection failed: {}", e);
                true
            }
        }
    }

    async fn process_key(
        &mut self,
        adapter: &mut dyn SiteAdapter,
        credentials: &Credentials,
        key: &str,
        is_last: bool,
        report: &mut CycleReport,
    ) -> Result<StepOutcome> {
        if !self.clear_challenge(adapter).await {
            warn!(%key, "Skipping key: access challenge");
            return Ok(StepOutcome::Skip);
        }

        self.timing.pacing.pause().await;
        if !step_completed("search", adapter.search(key).await) {
            warn!(%key, "Skipping key: search failed");
            return Ok(StepOutcome::Skip);
        }

        self.store.mark_checked(key)?;
        counter!("finder_keys_checked_total").increment(1);
        report.keys_checked.push(key.to_string());
        debug!(%key, "Marked key as checked");

        self.timing.pacing.pause().await;
        if step_completed("select_first_result", adapter.select_first_result().await) {
            self.timing.pacing.pause().await;
            match adapter.read_earliest_available_date().await {
                Ok(Some(date)) => self.consider(BestResult::new(date, key), report)?,
                Ok(None) => info!(%key, "No open slots"),
                Err(e) => warn!(%key, step = "read_earliest_available_date", error = %e, "Step failed"),
            }
        }

        if is_last {
            return Ok(StepOutcome::Ok);
        }

        self.timing.pacing.pause().await;
        if step_completed("navigate_back", adapter.navigate_back().await) {
            return Ok(StepOutcome::Ok);
        }

        let resumed = self.phase;
        warn!(%key, "Navigation back failed; signing in again");
        if let Err(e) = adapter.reload().await {
            debug!("Reload before re-authentication failed: {}", e);
        }
        let recovered = self.establish_session(adapter, credentials).await;
        self.phase = resumed;

        if recovered {
            Ok(StepOutcome::Ok)
        } else {
            Ok(StepOutcome::Abort("re-authentication failed after navigation back".to_string()))
        }
    }

    /// Compares against the live store so edits made earlier in this cycle
    /// (or by hand) are respected.
    fn consider(&mut self, candidate: BestResult, report: &mut CycleReport) -> Result<()> {
        let current_date = self.store.read()?.best_date();

        if comparator::is_better(candidate.date, current_date) {
            info!(key = %candidate.key, date = %candidate, "New earliest availability");
            self.store.record_best(Some(&candidate))?;
            counter!("finder_improvements_total").increment(1);
            report.improvement = comparator::earliest(report.improvement.take(), Some(candidate));
        } else {
            debug!(key = %candidate.key, date = %candidate, "Not earlier than current best");
        }
        Ok(())
    }

    async fn announce(&self, best: BestResult, previous: Option<BestResult>) -> bool {
        let event = AvailabilityEvent::new(best, previous);
        match self.notifier.notify(&event).await {
            Ok(result) if result.success => {
                info!(key = %event.key, date = %event.formatted_date(), "Notification sent");
                true
            }
            Ok(result) => {
                warn!("Notification not delivered: {}", result.error.unwrap_or_default());
                false
            }
            Err(e) => {
                warn!("Notification failed: {}", e);
                false
            }
        }
    }
}
