use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::document::{Document, Label};
use crate::models::{format_slot_date, parse_slot_date, BestResult, Credentials, ScanState};
use crate::utils::error::{AppError, Result};

const TEMPLATE: &str = "\
# Appointment Finder Parameters

- Permit Number:
- Date of Birth:
- Zip Codes:
- Zip Codes Checked:
- Found Earliest Availability Date:
- Found Earliest Availability Zip Code:
";

/// Scan state kept in a human-editable text document. Writes are atomic.
#[derive(Debug)]
pub struct ParameterStore {
    path: PathBuf,
}

impl ParameterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn read(&self) -> Result<ScanState> {
        let doc = self.load()?.unwrap_or_default();
        Ok(Self::state_from(&doc))
    }

    pub fn mark_checked(&mut self, key: &str) -> Result<()> {
        let key = Self::normalize_key(key)?;
        let mut doc = self.load_existing()?;

        let mut pending = doc.list(Label::ZipCodes);
        if let Some(pos) = pending.iter().position(|k| k == key) {
            pending.remove(pos);
            doc.set_list(Label::ZipCodes, &pending);
        }

        let mut checked = doc.list(Label::ZipCodesChecked);
        if !checked.iter().any(|k| k == key) {
            checked.push(key.to_string());
        }
        doc.set_list(Label::ZipCodesChecked, &checked);

        self.save(&doc)?;
        debug!(key, "Marked key as checked");
        Ok(())
    }

    pub fn record_best(&mut self, best: Option<&BestResult>) -> Result<()> {
        let mut doc = self.load_existing()?;
        match best {
            Some(best) => {
                doc.set_field(Label::EarliestDate, &format_slot_date(best.date));
                doc.set_field(Label::EarliestZipCode, &best.key);
            }
            None => {
                doc.set_field(Label::EarliestDate, "");
                doc.set_field(Label::EarliestZipCode, "");
            }
        }
        self.save(&doc)
    }

    pub fn clear_best(&mut self) -> Result<()> {
        self.record_best(None)
    }

    /// Returns `false` without touching the document when nothing was checked.
    pub fn recycle(&mut self) -> Result<bool> {
        let Some(mut doc) = self.load()? else {
            return Ok(false);
        };

        let checked = doc.list(Label::ZipCodesChecked);
        if checked.is_empty() {
            return Ok(false);
        }

        let mut pending = doc.list(Label::ZipCodes);
        for key in checked {
            if !pending.contains(&key) {
                pending.push(key);
            }
        }
        doc.set_list(Label::ZipCodes, &pending);
        doc.set_field(Label::ZipCodesChecked, "");

        self.save(&doc)?;
        debug!(pending = pending.len(), "Recycled checked keys");
        Ok(true)
    }

    pub fn write(&mut self, state: &ScanState) -> Result<()> {
        let mut doc = self.load()?.unwrap_or_default();
        doc.set_field(Label::PermitNumber, &state.credentials.permit_number);
        doc.set_field(Label::DateOfBirth, &state.credentials.date_of_birth);
        doc.set_list(Label::ZipCodes, &state.pending_keys);
        doc.set_list(Label::ZipCodesChecked, &state.checked_keys);
        match &state.best {
            Some(best) => {
                doc.set_field(Label::EarliestDate, &format_slot_date(best.date));
                doc.set_field(Label::EarliestZipCode, &best.key);
            }
            None => {
                doc.set_field(Label::EarliestDate, "");
                doc.set_field(Label::EarliestZipCode, "");
            }
        }
        self.save(&doc)
    }

    /// Create a blank document with every label. Never overwrites.
    pub fn init_template(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        self.save(&Document::parse(TEMPLATE))?;
        Ok(true)
    }

    fn normalize_key(key: &str) -> Result<&str> {
        let key = key.trim();
        if key.is_empty() || key.contains(',') {
            return Err(AppError::Validation(format!("invalid search key '{}'", key)));
        }
        Ok(key)
    }

    fn state_from(doc: &Document) -> ScanState {
        let credentials = Credentials::new(
            doc.field(Label::PermitNumber).unwrap_or_default(),
            doc.field(Label::DateOfBirth).unwrap_or_default(),
        );

        let best_key = doc.field(Label::EarliestZipCode).unwrap_or_default();
        let best = match doc.field(Label::EarliestDate) {
            Some(text) if !text.is_empty() => match parse_slot_date(text) {
                Ok(date) => Some(BestResult::new(date, best_key)),
                Err(e) => {
                    warn!("Ignoring stored earliest date: {}", e);
                    None
                }
            },
            _ => None,
        };

        ScanState {
            pending_keys: doc.list(Label::ZipCodes),
            checked_keys: doc.list(Label::ZipCodesChecked),
            credentials,
            best,
        }
    }

    fn load(&self) -> Result<Option<Document>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(Document::parse(&text))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn load_existing(&self) -> Result<Document> {
        self.load()?.ok_or_else(|| {
            AppError::Store(format!(
                "parameter document {} does not exist",
                self.path.display()
            ))
        })
    }

    /// Write-to-temp-then-rename so a crash never leaves a truncated document.
    fn save(&self, doc: &Document) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(doc.render().as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| {
            AppError::Store(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e.error
            ))
        })?;
        Ok(())
    }
}
