use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::error::{AppError, Result};

/// On-document format of appointment dates (`03/15/2026`).
pub const SLOT_DATE_FORMAT: &str = "%m/%d/%Y";

pub fn parse_slot_date(text: &str) -> Result<NaiveDate> {
    let trimmed = text.trim();
    NaiveDate::parse_from_str(trimmed, SLOT_DATE_FORMAT)
        .map_err(|e| AppError::parse(format!("invalid date '{}': {}", trimmed, e)))
}

pub fn format_slot_date(date: NaiveDate) -> String {
    date.format(SLOT_DATE_FORMAT).to_string()
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub permit_number: String,
    pub date_of_birth: String,
}

impl Credentials {
    pub fn new(permit_number: impl Into<String>, date_of_birth: impl Into<String>) -> Self {
        Self {
            permit_number: permit_number.into(),
            date_of_birth: date_of_birth.into(),
        }
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.permit_number.trim().is_empty() {
            missing.push("Permit Number");
        }
        if self.date_of_birth.trim().is_empty() {
            missing.push("Date of Birth");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn ensure_complete(&self) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::MissingCredentials(missing.join(", ")))
        }
    }
}

fn mask(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 2 {
        return "*".repeat(count);
    }
    let tail: String = secret.chars().skip(count - 2).collect();
    format!("{}{}", "*".repeat(count - 2), tail)
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("permit_number", &mask(&self.permit_number))
            .field("date_of_birth", &mask(&self.date_of_birth))
            .finish()
    }
}

/// Earliest confirmed-available date seen so far and the key that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestResult {
    pub date: NaiveDate,
    pub key: String,
}

impl BestResult {
    pub fn new(date: NaiveDate, key: impl Into<String>) -> Self {
        Self { date, key: key.into() }
    }
}

impl fmt::Display for BestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", format_slot_date(self.date), self.key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanState {
    pub pending_keys: Vec<String>,
    pub checked_keys: Vec<String>,
    pub credentials: Credentials,
    pub best: Option<BestResult>,
}

impl ScanState {
    pub fn best_date(&self) -> Option<NaiveDate> {
        self.best.as_ref().map(|b| b.date)
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending_keys.iter().any(|k| k == key)
    }

    pub fn is_checked(&self, key: &str) -> bool {
        self.checked_keys.iter().any(|k| k == key)
    }

    pub fn summary(&self) -> String {
        let best = match &self.best {
            Some(best) => best.to_string(),
            None => "none".to_string(),
        };
        format!(
            "Permit Number: {}\nDate of Birth: {}\nPending keys ({}): {}\nChecked keys ({}): {}\nBest result: {}",
            mask(&self.credentials.permit_number),
            mask(&self.credentials.date_of_birth),
            self.pending_keys.len(),
            self.pending_keys.join(", "),
            self.checked_keys.len(),
            self.checked_keys.join(", "),
            best,
        )
    }
}
