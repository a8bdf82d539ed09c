use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parsing error: {message}")]
    Parse { message: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Notification error: {notifier}: {message}")]
    Notification { notifier: String, message: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

impl AppError {
    pub fn parse(message: impl Into<String>) -> Self {
        AppError::Parse { message: message.into() }
    }

    pub fn notification(notifier: &str, message: impl std::fmt::Display) -> Self {
        AppError::Notification {
            notifier: notifier.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether the error is a configuration or startup problem that should stop the process.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Config(_) | AppError::Validation(_) | AppError::MissingCredentials(_)
        )
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
