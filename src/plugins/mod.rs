pub mod manager;
pub mod notifiers;
pub mod traits;

pub use manager::PluginManager;
pub use traits::{AvailabilityEvent, NotificationResult, NotifierPlugin};
