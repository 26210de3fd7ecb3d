//! Workspaces and the orchestrator facade

pub mod orchestrator;
mod state;

pub use orchestrator::Orchestrator;
pub use state::{Category, ElementView, WorkspaceInfo};
