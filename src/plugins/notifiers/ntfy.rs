use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, warn};

use crate::config::NtfyConfig;
use crate::plugins::traits::{AvailabilityEvent, NotificationResult, NotifierPlugin};
use crate::utils::error::Result;

const DEFAULT_RETRY_UNIT_MS: u64 = 500;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug)]
enum SendError {
    Transient(String),
    Permanent(String),
}

impl SendError {
    fn message(&self) -> &str {
        match self {
            SendError::Transient(m) | SendError::Permanent(m) => m,
        }
    }
}

/// Push notifications through an ntfy server (`{server}/{topic}`).
pub struct NtfyNotifier {
    client: Client,
    config: NtfyConfig,
    retry_unit_ms: u64,
}

impl NtfyNotifier {
    pub fn new(config: NtfyConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            retry_unit_ms: DEFAULT_RETRY_UNIT_MS,
        }
    }

    /// Scales the backoff between attempts.
    pub fn with_retry_unit(mut self, millis: u64) -> Self {
        self.retry_unit_ms = millis;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.config.server_url.trim_end_matches('/'),
            self.config.topic.trim_start_matches('/')
        )
    }

    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        let retries = self.config.retry_attempts.saturating_sub(1);
        ExponentialBackoff::from_millis(2)
            .factor(self.retry_unit_ms)
            .max_delay(MAX_RETRY_DELAY)
            .map(jitter)
            .take(retries)
    }

    async fn send(&self, body: &str) -> std::result::Result<Option<String>, SendError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Title", &self.config.title)
            .header("Priority", &self.config.priority)
            .header("Tags", &self.config.tags)
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| SendError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let id = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(str::to_string));
            return Ok(id);
        }

        let message = format!("ntfy responded with {}", status);
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(SendError::Transient(message))
        } else {
            Err(SendError::Permanent(message))
        }
    }
}

#[async_trait]
impl NotifierPlugin for NtfyNotifier {
    fn name(&self) -> &str {
        "ntfy Notifier"
    }

    fn plugin_type(&self) -> &str {
        "ntfy"
    }

    async fn notify(&self, event: &AvailabilityEvent) -> Result<NotificationResult> {
        let body = event.message_body();
        let outcome = RetryIf::spawn(
            self.retry_strategy(),
            || async {
                let result = self.send(&body).await;
                if let Err(e) = &result {
                    debug!(topic = %self.config.topic, "ntfy attempt failed: {}", e.message());
                }
                result
            },
            |e: &SendError| matches!(e, SendError::Transient(_)),
        )
        .await;

        match outcome {
            Ok(message_id) => Ok(NotificationResult::delivered(message_id)),
            Err(e) => {
                warn!(topic = %self.config.topic, "ntfy delivery failed: {}", e.message());
                Ok(NotificationResult::failed(e.message()))
            }
        }
    }
}
