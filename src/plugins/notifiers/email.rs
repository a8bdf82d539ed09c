use async_trait::async_trait;
use lettre::message::{header, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::plugins::traits::{AvailabilityEvent, NotificationResult, NotifierPlugin};
use crate::utils::error::{AppError, Result};

pub struct EmailNotifier {
    config: SmtpConfig,
}

impl EmailNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        EmailNotifier { config }
    }

    fn format_subject(&self, event: &AvailabilityEvent) -> String {
        format!("📅 Appointment available {} near {}", event.formatted_date(), event.key)
    }

    fn format_text_body(&self, event: &AvailabilityEvent) -> String {
        let mut text = event.message_body();
        if let Some(previous) = &event.previous {
            text.push_str(&format!("\nPrevious best: {}", previous));
        }
        text.push_str(&format!("\nFound at: {}\n", event.found_at.to_rfc3339()));
        text
    }

    fn build_message(&self, event: &AvailabilityEvent) -> Result<Message> {
        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_address)
            .parse()
            .map_err(|e| AppError::notification("email", format!("invalid from address: {}", e)))?;
        let to: Mailbox = self
            .config
            .to_address
            .parse()
            .map_err(|e| AppError::notification("email", format!("invalid to address: {}", e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(self.format_subject(event))
            .header(header::ContentType::TEXT_PLAIN)
            .body(self.format_text_body(event))
            .map_err(|e| AppError::notification("email", e))
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = if self.config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
                .map_err(|e| AppError::notification("email", e))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
        };

        let mut builder = builder.port(self.config.port);
        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        Ok(builder.build())
    }
}

#[async_trait]
impl NotifierPlugin for EmailNotifier {
    fn name(&self) -> &str {
        "Email Notifier"
    }

    fn plugin_type(&self) -> &str {
        "email"
    }

    async fn notify(&self, event: &AvailabilityEvent) -> Result<NotificationResult> {
        let email = self.build_message(event)?;
        let mailer = self.transport()?;

        match mailer.send(email).await {
            Ok(response) => Ok(NotificationResult::delivered(Some(response.code().to_string()))),
            Err(e) => Ok(NotificationResult::failed(e.to_string())),
        }
    }
}
