//! Dataset model and the provider boundary

pub mod memory;
pub mod traits;
pub mod types;

// Re-export key types for convenience
pub use memory::{InMemoryDatasetProvider, IngestSummary};
pub use traits::{DatasetError, DatasetProvider};
pub use types::{Dataset, Document, Element};
