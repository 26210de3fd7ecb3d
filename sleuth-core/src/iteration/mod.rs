//! Training iterations: state machine, per-category history, runner

pub mod registry;
pub mod runner;
pub mod state;

// Re-export key types for convenience
pub use registry::IterationLog;
pub use runner::{Collaborators, IterationRunner};
pub use state::{Iteration, IterationResult, IterationStatus, IterationSummary, PredictionSet};
