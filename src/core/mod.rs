pub mod comparator;
pub mod controller;

pub use controller::{CycleController, CycleOutcome, CyclePhase, CycleReport, CycleTiming, StepOutcome};
