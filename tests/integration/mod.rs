// Shared fixtures for the integration tests: a scripted site adapter, a
// recording notifier and temp-dir backed parameter documents.

pub mod cycle_tests;
pub mod scheduler_tests;

use appointment_finder::adapter::{SessionLauncher, SiteAdapter};
use appointment_finder::models::parse_slot_date;
use appointment_finder::plugins::{AvailabilityEvent, NotificationResult, NotifierPlugin};
use appointment_finder::{AppError, Credentials, CycleController, CycleTiming, ParameterStore, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use url::Url;

pub const TWO_KEY_DOC: &str = "\
# Appointment Finder Parameters

- Permit Number: A1234567
- Date of Birth: 01/02/1990
- Zip Codes: 90001, 90002
- Zip Codes Checked:
- Found Earliest Availability Date:
- Found Earliest Availability Zip Code:
";

pub fn date(text: &str) -> NaiveDate {
    parse_slot_date(text).unwrap()
}

/// A parameters document in its own temp directory.
pub struct TestDocument {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TestDocument {
    pub fn new(contents: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("parameters.md");
        std::fs::write(&path, contents).unwrap();
        Self { dir, path }
    }

    pub fn store(&self) -> ParameterStore {
        ParameterStore::new(&self.path)
    }

    pub fn contents(&self) -> String {
        std::fs::read_to_string(&self.path).unwrap()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<AvailabilityEvent>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<AvailabilityEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotifierPlugin for RecordingNotifier {
    fn name(&self) -> &str {
        "Recording Notifier"
    }

    fn plugin_type(&self) -> &str {
        "recording"
    }

    async fn notify(&self, event: &AvailabilityEvent) -> Result<NotificationResult> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail {
            Err(AppError::notification("recording", "unreachable"))
        } else {
            Ok(NotificationResult::delivered(None))
        }
    }
}

pub fn controller(doc: &TestDocument, notifier: &Arc<RecordingNotifier>) -> CycleController {
    CycleController::new(doc.store(), notifier.clone(), CycleTiming::immediate())
}

/// Site adapter that plays back per-key answers and records every call.
#[derive(Clone, Default)]
pub struct ScriptedAdapter {
    dates: HashMap<String, NaiveDate>,
    failed_searches: HashSet<String>,
    failed_backs: HashSet<String>,
    /// Answers for successive challenge checks; empty means "no challenge".
    challenges: VecDeque<bool>,
    /// Answers for successive sign-ins; empty means success.
    sign_ins: VecDeque<bool>,
    current: Option<String>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date(mut self, key: &str, text: &str) -> Self {
        self.dates.insert(key.to_string(), date(text));
        self
    }

    pub fn with_failed_search(mut self, key: &str) -> Self {
        self.failed_searches.insert(key.to_string());
        self
    }

    pub fn with_failed_back(mut self, key: &str) -> Self {
        self.failed_backs.insert(key.to_string());
        self
    }

    pub fn with_challenges(mut self, answers: &[bool]) -> Self {
        self.challenges = answers.iter().copied().collect();
        self
    }

    pub fn with_sign_ins(mut self, answers: &[bool]) -> Self {
        self.sign_ins = answers.iter().copied().collect();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl SiteAdapter for ScriptedAdapter {
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<bool> {
        self.record(format!("authenticate:{}", credentials.permit_number));
        Ok(self.sign_ins.pop_front().unwrap_or(true))
    }

    async fn verify_ready_page(&mut self) -> Result<bool> {
        self.record("verify");
        Ok(true)
    }

    async fn search(&mut self, key: &str) -> Result<bool> {
        self.record(format!("search:{}", key));
        if self.failed_searches.contains(key) {
            return Err(AppError::ElementNotFound {
                selector: "#inputKeyWord".to_string(),
            });
        }
        self.current = Some(key.to_string());
        Ok(true)
    }

    async fn select_first_result(&mut self) -> Result<bool> {
        self.record("select");
        Ok(self.current.is_some())
    }

    async fn read_earliest_available_date(&mut self) -> Result<Option<NaiveDate>> {
        self.record("read");
        Ok(self.current.as_ref().and_then(|key| self.dates.get(key).copied()))
    }

    async fn navigate_back(&mut self) -> Result<bool> {
        self.record("back");
        let failed = self
            .current
            .as_ref()
            .is_some_and(|key| self.failed_backs.contains(key));
        Ok(!failed)
    }

    async fn detect_access_challenge(&mut self) -> Result<bool> {
        self.record("challenge?");
        Ok(self.challenges.pop_front().unwrap_or(false))
    }

    async fn reload(&mut self) -> Result<()> {
        self.record("reload");
        Ok(())
    }

    fn current_location(&self) -> Option<Url> {
        Url::parse("https://booking.example.com/portal/appointments/select-location").ok()
    }

    async fn close(&mut self) -> Result<()> {
        self.record("close");
        Ok(())
    }
}

/// Hands out clones of one scripted adapter; all clones share a call log.
pub struct ScriptedLauncher {
    pub adapter: ScriptedAdapter,
}

#[async_trait]
impl SessionLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Box<dyn SiteAdapter>> {
        self.adapter.record("launch");
        Ok(Box::new(self.adapter.clone()))
    }
}
