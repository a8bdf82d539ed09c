pub mod adapter;
pub mod config;
pub mod core;
pub mod logging;
pub mod models;
pub mod plugins;
pub mod scheduler;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use adapter::{SessionLauncher, SiteAdapter};
pub use config::AppConfig;
pub use crate::core::{CycleController, CycleOutcome, CycleReport, CycleTiming};
pub use models::{BestResult, Credentials, ScanState};
pub use plugins::{AvailabilityEvent, NotifierPlugin, PluginManager};
pub use scheduler::{CycleScheduler, SchedulerStats};
pub use store::ParameterStore;
pub use utils::error::{AppError, Result};
