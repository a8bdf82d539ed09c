use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{format_slot_date, BestResult};
use crate::utils::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityEvent {
    pub key: String,
    pub date: NaiveDate,
    /// Best result on record before this cycle started.
    pub previous: Option<BestResult>,
    pub found_at: DateTime<Utc>,
}

impl AvailabilityEvent {
    pub fn new(best: BestResult, previous: Option<BestResult>) -> Self {
        Self {
            key: best.key,
            date: best.date,
            previous,
            found_at: Utc::now(),
        }
    }

    pub fn formatted_date(&self) -> String {
        format_slot_date(self.date)
    }

    pub fn message_body(&self) -> String {
        format!(
            "A new appointment availability has been found!\n\nZip Code: {}\nDate: {}",
            self.key,
            self.formatted_date()
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl NotificationResult {
    pub fn delivered(message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// A channel that can tell the operator about a new best slot.
#[async_trait]
pub trait NotifierPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn plugin_type(&self) -> &str;
    async fn notify(&self, event: &AvailabilityEvent) -> Result<NotificationResult>;
}
