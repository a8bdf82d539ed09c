pub mod scan_state;

// Re-exports for convenience
pub use scan_state::*;
