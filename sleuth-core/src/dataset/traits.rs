//! DatasetProvider trait
//!
//! Ingestion and storage live outside the orchestrator. A workspace asks its
//! provider for the dataset once, at creation, and keeps the result.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::types::Dataset;
use crate::types::{DatasetId, DocumentId};

/// Errors from dataset providers
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Dataset not found: {0}")]
    NotFound(String),

    #[error("Document already exists in dataset: {0}")]
    DuplicateDocument(DocumentId),
}

/// Read-only source of datasets
#[async_trait]
pub trait DatasetProvider: Send + Sync {
    /// Load a dataset with all of its documents in order
    async fn load(&self, dataset_id: &DatasetId) -> Result<Arc<Dataset>, DatasetError>;
}
