pub mod error;
pub mod pacing;

pub use error::{AppError, Result};
pub use pacing::Pacing;
