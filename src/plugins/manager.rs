use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::notifiers::{DiscordNotifier, EmailNotifier, NtfyNotifier};
use super::traits::{AvailabilityEvent, NotificationResult, NotifierPlugin};
use crate::config::NotificationsConfig;
use crate::utils::error::Result;

pub type NotifierPluginBox = Box<dyn NotifierPlugin>;

/// Every configured notification channel, addressed as one.
#[derive(Clone)]
pub struct PluginManager {
    notifiers: Arc<RwLock<HashMap<String, NotifierPluginBox>>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            notifiers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn from_config(config: &NotificationsConfig) -> Self {
        let mut notifiers: HashMap<String, NotifierPluginBox> = HashMap::new();

        let mut insert = |plugin: NotifierPluginBox| {
            notifiers.insert(plugin.plugin_type().to_string(), plugin);
        };
        if let Some(ntfy) = &config.ntfy {
            insert(Box::new(NtfyNotifier::new(ntfy.clone())));
        }
        if let Some(discord) = &config.discord {
            insert(Box::new(DiscordNotifier::new(discord.clone())));
        }
        if let Some(smtp) = &config.smtp {
            insert(Box::new(EmailNotifier::new(smtp.clone())));
        }

        if notifiers.is_empty() {
            warn!("No notifiers configured; improvements will only be logged");
        }

        Self {
            notifiers: Arc::new(RwLock::new(notifiers)),
        }
    }

    pub async fn register_notifier(&self, plugin: NotifierPluginBox) {
        let plugin_type = plugin.plugin_type().to_string();
        let mut notifiers = self.notifiers.write().await;
        notifiers.insert(plugin_type, plugin);
    }

    pub async fn has_notifier(&self, plugin_type: &str) -> bool {
        let notifiers = self.notifiers.read().await;
        notifiers.contains_key(plugin_type)
    }

    pub async fn list_notifier_types(&self) -> Vec<String> {
        let notifiers = self.notifiers.read().await;
        let mut types: Vec<String> = notifiers.keys().cloned().collect();
        types.sort();
        types
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotifierPlugin for PluginManager {
    fn name(&self) -> &str {
        "Plugin Manager"
    }

    fn plugin_type(&self) -> &str {
        "broadcast"
    }

    async fn notify(&self, event: &AvailabilityEvent) -> Result<NotificationResult> {
        let notifiers = self.notifiers.read().await;
        if notifiers.is_empty() {
            return Ok(NotificationResult::failed("no notifiers configured"));
        }

        let deliveries = notifiers.iter().map(|(plugin_type, notifier)| async move {
            (plugin_type.as_str(), notifier.notify(event).await)
        });

        let mut delivered = Vec::new();
        let mut errors = Vec::new();
        for (plugin_type, outcome) in join_all(deliveries).await {
            match outcome {
                Ok(result) if result.success => {
                    info!(notifier = plugin_type, "Notification delivered");
                    delivered.push(plugin_type.to_string());
                }
                Ok(result) => {
                    let error = result.error.unwrap_or_else(|| "unknown error".to_string());
                    warn!(notifier = plugin_type, "Notification not delivered: {}", error);
                    errors.push(format!("{}: {}", plugin_type, error));
                }
                Err(e) => {
                    warn!(notifier = plugin_type, "Notifier failed: {}", e);
                    errors.push(format!("{}: {}", plugin_type, e));
                }
            }
        }

        if delivered.is_empty() {
            errors.sort();
            Ok(NotificationResult::failed(errors.join("; ")))
        } else {
            delivered.sort();
            Ok(NotificationResult::delivered(Some(delivered.join(","))))
        }
    }
}
