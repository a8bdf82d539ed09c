// Notifier plugin implementations
pub mod discord;
pub mod email;
pub mod ntfy;

pub use discord::DiscordNotifier;
pub use email::EmailNotifier;
pub use ntfy::NtfyNotifier;
