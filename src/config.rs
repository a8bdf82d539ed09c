use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::adapter::page::{default_challenge_selectors, default_open_slot_labels, CalendarSelectors};
use crate::utils::pacing::Pacing;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub scheduler: SchedulerConfig,
    pub cycle: CycleConfig,
    pub browser: BrowserConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("Management/parameters.md"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub cycle_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 1800,
        }
    }
}

impl SchedulerConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    pub challenge_cooldown_secs: u64,
    pub pacing_min_ms: u64,
    pub pacing_max_ms: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            challenge_cooldown_secs: 60,
            pacing_min_ms: 2_000,
            pacing_max_ms: 5_000,
        }
    }
}

impl CycleConfig {
    pub fn challenge_cooldown(&self) -> Duration {
        Duration::from_secs(self.challenge_cooldown_secs)
    }

    pub fn pacing(&self) -> Pacing {
        Pacing::new(self.pacing_min_ms, self.pacing_max_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SiteSelectors {
    pub appointment_type: String,
    pub permit_number: String,
    pub date_of_birth: String,
    pub submit: String,
    pub search_input: String,
    pub search_button: String,
    pub first_result: String,
    pub back_button: String,
    pub calendar: CalendarSelectors,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            appointment_type: "#appointment-type-selector > div > div:nth-child(2) > div > fieldset > ul > li:nth-child(1) > label > span:nth-child(1)".to_string(),
            permit_number: "#dlNumber".to_string(),
            date_of_birth: "#dob".to_string(),
            submit: "#appointment-type-selector > div > div:nth-child(2) > div > div.button-holder > button".to_string(),
            search_input: "#inputKeyWord".to_string(),
            search_button: "#locations-search > button".to_string(),
            first_result: "#js-location-result-list > li:nth-child(1) > div > div.search-card__options > div > button".to_string(),
            back_button: "#appointments-react-root > section > div.appointments__top-bar > div > div:nth-child(2) > a".to_string(),
            calendar: CalendarSelectors::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub start_url: String,
    pub headless: bool,
    pub chrome_path: Option<String>,
    pub user_agent: Option<String>,
    pub element_timeout_secs: u64,
    pub calendar_timeout_secs: u64,
    pub typing_delay_min_ms: u64,
    pub typing_delay_max_ms: u64,
    pub settle_min_ms: u64,
    pub settle_max_ms: u64,
    pub ready_page_text: String,
    pub calendar_url_fragment: String,
    pub open_slot_labels: Vec<String>,
    pub challenge_selectors: Vec<String>,
    /// Where to save page HTML when the calendar never renders.
    pub debug_dump_dir: Option<PathBuf>,
    pub selectors: SiteSelectors,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            start_url: "https://www.dmv.ca.gov/portal/appointments/select-appointment-type".to_string(),
            headless: true,
            chrome_path: None,
            user_agent: None,
            element_timeout_secs: 15,
            calendar_timeout_secs: 5,
            typing_delay_min_ms: 50,
            typing_delay_max_ms: 150,
            settle_min_ms: 2_000,
            settle_max_ms: 4_000,
            ready_page_text: "Which office would you like to visit?".to_string(),
            calendar_url_fragment: "appointments/select-date".to_string(),
            open_slot_labels: default_open_slot_labels(),
            challenge_selectors: default_challenge_selectors(),
            debug_dump_dir: None,
            selectors: SiteSelectors::default(),
        }
    }
}

impl BrowserConfig {
    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    pub fn calendar_timeout(&self) -> Duration {
        Duration::from_secs(self.calendar_timeout_secs)
    }

    pub fn typing(&self) -> Pacing {
        Pacing::new(self.typing_delay_min_ms, self.typing_delay_max_ms)
    }

    pub fn settle(&self) -> Pacing {
        Pacing::new(self.settle_min_ms, self.settle_max_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub ntfy: Option<NtfyConfig>,
    pub discord: Option<DiscordConfig>,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NtfyConfig {
    pub server_url: String,
    pub topic: String,
    pub title: String,
    pub priority: String,
    pub tags: String,
    pub retry_attempts: usize,
}

impl Default for NtfyConfig {
    fn default() -> Self {
        Self {
            server_url: "https://ntfy.sh".to_string(),
            topic: String::new(),
            title: "Appointment Alert!".to_string(),
            priority: "high".to_string(),
            tags: "calendar,car".to_string(),
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub webhook_url: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub mention_user: Option<String>,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            username: "Appointment Finder".to_string(),
            avatar_url: None,
            mention_user: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
    pub to_address: String,
    pub use_tls: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 587,
            username: None,
            password: None,
            from_address: String::new(),
            from_name: "Appointment Finder".to_string(),
            to_address: String::new(),
            use_tls: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "appointment_finder=info".to_string(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9001,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Layered load: built-in defaults, then config files, then `FINDER__*`
    /// environment variables. An explicit file replaces the `config/` lookup.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder();
        builder = match explicit {
            Some(path) => builder.add_source(File::from(path)),
            None => builder
                .add_source(File::with_name("config/default").required(false))
                .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
                .add_source(File::with_name("config/local").required(false)),
        };

        let s = builder
            .add_source(
                Environment::with_prefix("FINDER")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("browser.open_slot_labels")
                    .with_list_parse_key("browser.challenge_selectors")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        if config.browser.chrome_path.is_none() {
            config.browser.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::Message("Store path must not be empty".into()));
        }

        if self.scheduler.cycle_interval_secs == 0 {
            return Err(ConfigError::Message("Scheduler cycle_interval_secs must be greater than 0".into()));
        }

        if self.cycle.pacing_min_ms > self.cycle.pacing_max_ms {
            return Err(ConfigError::Message("Cycle pacing_min_ms cannot exceed pacing_max_ms".into()));
        }

        if Url::parse(&self.browser.start_url).is_err() {
            return Err(ConfigError::Message("Invalid browser start_url format".into()));
        }

        if self.browser.typing_delay_min_ms > self.browser.typing_delay_max_ms {
            return Err(ConfigError::Message("Browser typing_delay_min_ms cannot exceed typing_delay_max_ms".into()));
        }

        if self.browser.settle_min_ms > self.browser.settle_max_ms {
            return Err(ConfigError::Message("Browser settle_min_ms cannot exceed settle_max_ms".into()));
        }

        if self.browser.element_timeout_secs == 0 {
            return Err(ConfigError::Message("Browser element_timeout_secs must be greater than 0".into()));
        }

        if self.browser.open_slot_labels.is_empty() {
            return Err(ConfigError::Message("Browser open_slot_labels must not be empty".into()));
        }

        if let Some(ntfy) = &self.notifications.ntfy {
            if ntfy.topic.trim().is_empty() {
                return Err(ConfigError::Message("ntfy topic must not be empty".into()));
            }
            if Url::parse(&ntfy.server_url).is_err() {
                return Err(ConfigError::Message("Invalid ntfy server_url format".into()));
            }
        }

        if let Some(discord) = &self.notifications.discord {
            if !discord.webhook_url.starts_with("https://discord.com/api/webhooks/") {
                return Err(ConfigError::Message("Invalid Discord webhook URL format".into()));
            }
        }

        if let Some(smtp) = &self.notifications.smtp {
            if smtp.port == 0 {
                return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
            }
            if smtp.host.trim().is_empty() || smtp.to_address.trim().is_empty() {
                return Err(ConfigError::Message("SMTP host and to_address are required".into()));
            }
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }
}
