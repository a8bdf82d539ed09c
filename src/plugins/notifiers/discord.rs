use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::config::DiscordConfig;
use crate::models::format_slot_date;
use crate::plugins::traits::{AvailabilityEvent, NotificationResult, NotifierPlugin};
use crate::utils::error::{AppError, Result};

const EMBED_COLOR: u32 = 0x00ff00;

pub struct DiscordNotifier {
    client: Client,
    config: DiscordConfig,
}

impl DiscordNotifier {
    pub fn new(config: DiscordConfig) -> Self {
        DiscordNotifier {
            client: Client::new(),
            config,
        }
    }

    fn create_embed(&self, event: &AvailabilityEvent) -> serde_json::Value {
        let previous = match &event.previous {
            Some(best) => format!("{} ({})", format_slot_date(best.date), best.key),
            None => "none".to_string(),
        };

        json!({
            "title": "📅 Earlier appointment found",
            "color": EMBED_COLOR,
            "timestamp": event.found_at.to_rfc3339(),
            "fields": [
                {
                    "name": "Date",
                    "value": event.formatted_date(),
                    "inline": true
                },
                {
                    "name": "Zip Code",
                    "value": event.key,
                    "inline": true
                },
                {
                    "name": "Previous best",
                    "value": previous,
                    "inline": false
                }
            ],
            "footer": {
                "text": "Appointment Finder"
            }
        })
    }

    fn create_webhook_payload(&self, event: &AvailabilityEvent) -> serde_json::Value {
        let mut payload = json!({
            "username": self.config.username,
            "embeds": [self.create_embed(event)]
        });

        if let Some(avatar_url) = &self.config.avatar_url {
            payload["avatar_url"] = json!(avatar_url);
        }

        if let Some(user) = &self.config.mention_user {
            payload["content"] = json!(format!("<@{}>", user));
        }

        payload
    }
}

#[async_trait]
impl NotifierPlugin for DiscordNotifier {
    fn name(&self) -> &str {
        "Discord Notifier"
    }

    fn plugin_type(&self) -> &str {
        "discord"
    }

    async fn notify(&self, event: &AvailabilityEvent) -> Result<NotificationResult> {
        let payload = self.create_webhook_payload(event);

        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::notification("discord", e))?;

        let status = response.status();
        if status.is_success() {
            Ok(NotificationResult::delivered(None))
        } else {
            Ok(NotificationResult::failed(format!("Discord webhook responded with {}", status)))
        }
    }
}
