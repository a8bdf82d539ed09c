use chrono::NaiveDate;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::utils::error::{AppError, Result};

/// Calendar day labels as the site renders them (`March 15, 2026`).
const CALENDAR_DAY_FORMAT: &str = "%B %d, %Y";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarSelectors {
    pub segment: String,
    pub availability: String,
    pub day: String,
}

impl Default for CalendarSelectors {
    fn default() -> Self {
        Self {
            segment: ".rbc-row-segment".to_string(),
            availability: "span.rbc-event-available".to_string(),
            day: "span.rbc-event-day-num--mobile".to_string(),
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| AppError::parse(format!("invalid CSS selector '{}': {:?}", selector, e)))
}

fn element_text(element: scraper::ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_calendar_day(text: &str) -> Result<NaiveDate> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDate::parse_from_str(&normalized, CALENDAR_DAY_FORMAT)
        .map_err(|e| AppError::parse(format!("invalid calendar day '{}': {}", normalized, e)))
}

/// First open slot on a rendered calendar page.
pub fn earliest_open_date(
    html: &str,
    selectors: &CalendarSelectors,
    open_labels: &[String],
) -> Result<Option<NaiveDate>> {
    let document = Html::parse_document(html);
    let segment_sel = parse_selector(&selectors.segment)?;
    let availability_sel = parse_selector(&selectors.availability)?;
    let day_sel = parse_selector(&selectors.day)?;

    for (index, segment) in document.select(&segment_sel).enumerate() {
        let Some(badge) = segment.select(&availability_sel).next() else {
            continue;
        };
        let status = element_text(badge);
        if !open_labels.iter().any(|label| label == &status) {
            continue;
        }

        let Some(day) = segment.select(&day_sel).next() else {
            warn!(segment = index, "'{}' slot without a day label", status);
            continue;
        };

        match parse_calendar_day(&element_text(day)) {
            Ok(date) => {
                debug!(segment = index, %date, "Found open slot");
                return Ok(Some(date));
            }
            Err(e) => warn!(segment = index, "Skipping segment: {}", e),
        }
    }

    Ok(None)
}

pub fn has_access_challenge(html: &str, selectors: &[String]) -> bool {
    let document = Html::parse_document(html);
    selectors.iter().any(|raw| match Selector::parse(raw) {
        Ok(selector) => document.select(&selector).next().is_some(),
        Err(e) => {
            warn!("Ignoring invalid challenge selector '{}': {:?}", raw, e);
            false
        }
    })
}

pub fn default_open_slot_labels() -> Vec<String> {
    vec!["Open Times".to_string(), "Nearby Office Times".to_string()]
}

pub fn default_challenge_selectors() -> Vec<String> {
    vec![
        "iframe[src*='recaptcha']".to_string(),
        "iframe[src*='hcaptcha']".to_string(),
        "iframe[src*='challenges.cloudflare.com']".to_string(),
        "#challenge-running".to_string(),
        "#px-captcha".to_string(),
    ]
}
