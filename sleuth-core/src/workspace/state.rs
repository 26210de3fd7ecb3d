//! Per-workspace state
//!
//! A workspace is bound to one dataset at creation. It owns its categories,
//! its partition of the label store, and one iteration log per category.
//! Only the label store and the iteration logs change after creation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::dataset::{Dataset, Element};
use crate::error::{OrchestratorError, ReferenceKind, Result};
use crate::iteration::{IterationLog, PredictionSet};
use crate::labels::LabelStore;
use crate::types::{CategoryId, DocumentId, ElementId, LabelValue, WorkspaceId};

/// A binary classification target within a workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Summary returned when a workspace is created or inspected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub id: WorkspaceId,
    pub dataset_id: crate::types::DatasetId,
    pub first_document_id: Option<DocumentId>,
    pub total_elements: usize,
    pub created_at: DateTime<Utc>,
}

/// An element with its labels and current model predictions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementView {
    pub id: ElementId,
    pub document_id: DocumentId,
    pub begin: usize,
    pub end: usize,
    pub text: String,
    pub user_labels: BTreeMap<CategoryId, LabelValue>,
    pub model_predictions: BTreeMap<CategoryId, LabelValue>,
}

/// Category metadata plus its iteration slot
pub(crate) struct CategoryState {
    pub category: Category,
    pub iterations: Arc<Mutex<IterationLog>>,
}

pub(crate) struct Workspace {
    pub id: WorkspaceId,
    pub dataset: Arc<Dataset>,
    pub created_at: DateTime<Utc>,
    categories: RwLock<HashMap<CategoryId, Arc<CategoryState>>>,
    pub labels: RwLock<LabelStore>,
}

impl Workspace {
    pub fn new(id: WorkspaceId, dataset: Arc<Dataset>) -> Self {
        Self {
            id,
            dataset,
            created_at: Utc::now(),
            categories: RwLock::new(HashMap::new()),
            labels: RwLock::new(LabelStore::new()),
        }
    }

    pub fn info(&self) -> WorkspaceInfo {
        WorkspaceInfo {
            id: self.id.clone(),
            dataset_id: self.dataset.id().clone(),
            first_document_id: self.dataset.documents().first().map(|d| d.id.clone()),
            total_elements: self.dataset.total_elements(),
            created_at: self.created_at,
        }
    }

    pub async fn add_category(&self, name: &str, description: &str) -> Result<Category> {
        let id = CategoryId::new(name);
        let mut categories = self.categories.write().await;
        if categories.contains_key(&id) {
            return Err(OrchestratorError::exists(ReferenceKind::Category, &id));
        }
        let category = Category {
            id: id.clone(),
            name: name.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        };
        categories.insert(
            id.clone(),
            Arc::new(CategoryState {
                category: category.clone(),
                iterations: Arc::new(Mutex::new(IterationLog::new(id))),
            }),
        );
        Ok(category)
    }

    pub async fn category(&self, id: &CategoryId) -> Result<Arc<CategoryState>> {
        self.categories
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| OrchestratorError::unknown(ReferenceKind::Category, id))
    }

    /// Categories in creation order
    pub async fn categories(&self) -> Vec<Category> {
        let mut categories: Vec<Category> = self
            .categories
            .read()
            .await
            .values()
            .map(|state| state.category.clone())
            .collect();
        categories.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        categories
    }

    pub fn element(&self, id: &ElementId) -> Result<&Element> {
        self.dataset
            .element(id)
            .ok_or_else(|| OrchestratorError::unknown(ReferenceKind::Element, id))
    }

    /// Prediction sets of every category's latest READY iteration
    async fn current_predictions(&self) -> Vec<(CategoryId, Arc<PredictionSet>)> {
        let states: Vec<Arc<CategoryState>> =
            self.categories.read().await.values().cloned().collect();

        let mut current = Vec::with_capacity(states.len());
        for state in states {
            let log = state.iterations.lock().await;
            if let Some(result) = log.latest_ready().and_then(|it| it.result()) {
                current.push((state.category.id.clone(), Arc::clone(&result.predictions)));
            }
        }
        current
    }

    /// Views for the given elements, sharing one read of labels and predictions
    pub async fn views<'a>(&self, elements: impl IntoIterator<Item = &'a Element>) -> Vec<ElementView> {
        let elements: Vec<&Element> = elements.into_iter().collect();
        let user_labels: Vec<BTreeMap<CategoryId, LabelValue>> = {
            let labels = self.labels.read().await;
            elements.iter().map(|e| labels.labels_for(&e.id)).collect()
        };
        let predictions = self.current_predictions().await;

        elements
            .into_iter()
            .zip(user_labels)
            .map(|(element, user_labels)| ElementView {
                id: element.id.clone(),
                document_id: element.document_id.clone(),
                begin: element.begin,
                end: element.end,
                text: element.text.clone(),
                user_labels,
                model_predictions: predictions
                    .iter()
                    .filter_map(|(category_id, set)| {
                        set.get(&element.id).map(|p| (category_id.clone(), p.value))
                    })
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Document;
    use crate::types::DatasetId;

    fn workspace() -> Workspace {
        let ds = DatasetId::new("ds");
        let dataset = Dataset::new(
            ds.clone(),
            vec![
                Document::from_texts(&ds, "doc1", &["one"]),
                Document::from_texts(&ds, "doc2", &["two", "three"]),
            ],
        );
        Workspace::new(WorkspaceId::new("ws"), Arc::new(dataset))
    }

    #[test]
    fn info_reports_dataset_binding() {
        let info = workspace().info();
        assert_eq!(info.dataset_id.as_str(), "ds");
        assert_eq!(info.first_document_id, Some(DocumentId::new("ds-doc1")));
        assert_eq!(info.total_elements, 3);
    }

    #[tokio::test]
    async fn duplicate_category_is_rejected() {
        let ws = workspace();
        ws.add_category("sports", "about sports").await.unwrap();

        let result = ws.add_category("sports", "again").await;

        assert!(matches!(
            result,
            Err(OrchestratorError::AlreadyExists { kind: ReferenceKind::Category, .. })
        ));
        assert_eq!(ws.categories().await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_category_is_an_unknown_reference() {
        let ws = workspace();
        let result = ws.category(&CategoryId::new("nope")).await;
        assert!(matches!(
            result,
            Err(OrchestratorError::UnknownReference { kind: ReferenceKind::Category, .. })
        ));
    }

    #[tokio::test]
    async fn views_include_user_labels() {
        let ws = workspace();
        let category = ws.add_category("sports", "").await.unwrap();
        ws.labels
            .write()
            .await
            .set(&ElementId::new("ds-doc2-0"), &category.id, LabelValue::True);

        let views = ws.views(ws.dataset.elements()).await;

        assert_eq!(views.len(), 3);
        assert!(views[0].user_labels.is_empty());
        assert_eq!(views[1].user_labels.get(&category.id), Some(&LabelValue::True));
        assert!(views[1].model_predictions.is_empty());
        assert_eq!((views[2].begin, views[2].end), (4, 9));
    }
}
