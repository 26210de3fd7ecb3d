//! In-memory DatasetProvider implementation
//!
//! Holds documents per dataset in insertion order. Loading returns an
//! immutable snapshot; documents added later only reach workspaces created
//! after the addition.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::traits::{DatasetError, DatasetProvider};
use super::types::{Dataset, Document};
use crate::types::DatasetId;

/// Counts reported after adding documents to a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub dataset_id: DatasetId,
    pub num_docs: usize,
    pub num_elements: usize,
}

/// In-memory implementation of DatasetProvider
#[derive(Default)]
pub struct InMemoryDatasetProvider {
    datasets: RwLock<HashMap<DatasetId, Vec<Document>>>,
}

impl InMemoryDatasetProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append documents to a dataset, creating it if needed.
    ///
    /// Rejects the whole batch if any document id is already present.
    pub async fn add_documents(
        &self,
        dataset_id: &DatasetId,
        documents: Vec<Document>,
    ) -> Result<IngestSummary, DatasetError> {
        let mut datasets = self.datasets.write().await;

        let current = datasets.get(dataset_id).map(Vec::as_slice).unwrap_or(&[]);
        for (i, doc) in documents.iter().enumerate() {
            let seen_before = current.iter().any(|d| d.id == doc.id)
                || documents[..i].iter().any(|d| d.id == doc.id);
            if seen_before {
                return Err(DatasetError::DuplicateDocument(doc.id.clone()));
            }
        }

        let existing = datasets.entry(dataset_id.clone()).or_default();
        existing.extend(documents);
        let summary = IngestSummary {
            dataset_id: dataset_id.clone(),
            num_docs: existing.len(),
            num_elements: existing.iter().map(|d| d.elements.len()).sum(),
        };
        debug!(
            dataset = %dataset_id,
            docs = summary.num_docs,
            elements = summary.num_elements,
            "Documents added"
        );
        Ok(summary)
    }

    /// List known dataset ids
    pub async fn list_datasets(&self) -> Vec<DatasetId> {
        let mut ids: Vec<DatasetId> = self.datasets.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl DatasetProvider for InMemoryDatasetProvider {
    async fn load(&self, dataset_id: &DatasetId) -> Result<Arc<Dataset>, DatasetError> {
        let datasets = self.datasets.read().await;
        let documents = datasets
            .get(dataset_id)
            .ok_or_else(|| DatasetError::NotFound(dataset_id.to_string()))?;
        Ok(Arc::new(Dataset::new(dataset_id.clone(), documents.clone())))
    }
}
