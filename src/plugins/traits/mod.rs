pub mod notifier;

pub use notifier::{AvailabilityEvent, NotificationResult, NotifierPlugin};
