pub mod document;
pub mod parameter_store;

pub use document::{Document, Label};
pub use parameter_store::ParameterStore;
