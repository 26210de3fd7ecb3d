//! Orchestrator facade
//!
//! The single entry point for ingestion and transport layers. It owns the
//! workspace registry and the locking discipline:
//!
//! - the workspace map and each workspace's category map are `RwLock`s,
//!   written only by create/delete;
//! - labels live behind one `RwLock` per workspace, held only for the write
//!   itself;
//! - each category's iteration log sits behind a `Mutex` that is the
//!   reservation critical section. When both are needed the category mutex
//!   is taken first, then the labels read lock.
//!
//! No lock is held across a collaborator call; runners take the category
//! mutex only to record a status change.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};

use crate::config::OrchestratorConfig;
use crate::dataset::{DatasetProvider, Element};
use crate::error::{EvaluationError, OrchestratorError, ReferenceKind, Result};
use crate::evaluation::{self, PrecisionEvaluation, PrecisionReport, PrecisionSample};
use crate::events::{EventSender, OrchestratorEvent, publish};
use crate::iteration::{Collaborators, IterationRunner, IterationSummary, PredictionSet};
use crate::status::StatusSnapshot;
use crate::training::Prediction;
use crate::trigger::{TriggerDecision, TriggerOutcome};
use crate::types::{CategoryId, DatasetId, DocumentId, ElementId, LabelValue, WorkspaceId};

use super::state::{Category, CategoryState, ElementView, Workspace, WorkspaceInfo};

/// Coordinates labeling, training triggers and status for many workspaces
pub struct Orchestrator {
    workspaces: RwLock<HashMap<WorkspaceId, Arc<Workspace>>>,
    datasets: Arc<dyn DatasetProvider>,
    collaborators: Collaborators,
    config: OrchestratorConfig,
    events: EventSender,
}

impl Orchestrator {
    pub fn new(
        datasets: Arc<dyn DatasetProvider>,
        collaborators: Collaborators,
        config: OrchestratorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.events.channel_capacity.max(1));
        Self {
            workspaces: RwLock::new(HashMap::new()),
            datasets,
            collaborators,
            config,
            events,
        }
    }

    /// Receive iteration events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    // ==================== Workspaces ====================

    /// Create a workspace bound to a dataset.
    ///
    /// The dataset is loaded once here and never reloaded.
    pub async fn create_workspace(
        &self,
        workspace_id: impl Into<WorkspaceId>,
        dataset_id: &DatasetId,
    ) -> Result<WorkspaceInfo> {
        let workspace_id = workspace_id.into();
        if self.workspaces.read().await.contains_key(&workspace_id) {
            return Err(OrchestratorError::exists(ReferenceKind::Workspace, &workspace_id));
        }

        let dataset = self.datasets.load(dataset_id).await?;

        let mut workspaces = self.workspaces.write().await;
        // Another caller may have created it while the dataset loaded
        if workspaces.contains_key(&workspace_id) {
            return Err(OrchestratorError::exists(ReferenceKind::Workspace, &workspace_id));
        }
        let workspace = Workspace::new(workspace_id.clone(), dataset);
        let info = workspace.info();
        workspaces.insert(workspace_id, Arc::new(workspace));

        info!(
            workspace = %info.id,
            dataset = %info.dataset_id,
            elements = info.total_elements,
            "Workspace created"
        );
        Ok(info)
    }

    /// Remove a workspace. Runners still in flight finish against the
    /// detached state and are then dropped.
    pub async fn delete_workspace(&self, workspace_id: &WorkspaceId) -> Result<()> {
        if self.workspaces.write().await.remove(workspace_id).is_none() {
            return Err(OrchestratorError::unknown(ReferenceKind::Workspace, workspace_id));
        }
        info!(workspace = %workspace_id, "Workspace deleted");
        Ok(())
    }

    /// Workspace ids, sorted
    pub async fn list_workspaces(&self) -> Vec<WorkspaceId> {
        let mut ids: Vec<WorkspaceId> = self.workspaces.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn workspace_info(&self, workspace_id: &WorkspaceId) -> Result<WorkspaceInfo> {
        Ok(self.workspace(workspace_id).await?.info())
    }

    // ==================== Categories ====================

    /// Create a category; its id is its name
    pub async fn create_category(
        &self,
        workspace_id: &WorkspaceId,
        name: &str,
        description: &str,
    ) -> Result<Category> {
        let workspace = self.workspace(workspace_id).await?;
        let category = workspace.add_category(name, description).await?;
        debug!(workspace = %workspace_id, category = %category.id, "Category created");
        Ok(category)
    }

    pub async fn list_categories(&self, workspace_id: &WorkspaceId) -> Result<Vec<Category>> {
        Ok(self.workspace(workspace_id).await?.categories().await)
    }

    // ==================== Labels ====================

    /// Overwrite the user label of (element, category), then consult the
    /// trigger. Returns the element's updated view.
    ///
    /// Unknown references are rejected before anything is written.
    pub async fn set_label(
        &self,
        workspace_id: &WorkspaceId,
        element_id: &ElementId,
        category_id: &CategoryId,
        value: LabelValue,
    ) -> Result<ElementView> {
        let workspace = self.workspace(workspace_id).await?;
        let category = workspace.category(category_id).await?;
        let element = workspace.element(element_id)?;

        let write = workspace
            .labels
            .write()
            .await
            .set(element_id, category_id, value);
        debug!(
            workspace = %workspace_id,
            category = %category_id,
            element = %element_id,
            value = %value,
            changed = write.changed,
            "Label set"
        );

        self.trigger(&workspace, &category).await;

        let mut views = workspace.views([element]).await;
        views
            .pop()
            .ok_or_else(|| OrchestratorError::unknown(ReferenceKind::Element, element_id))
    }

    /// Label counts for one category, zero entries omitted
    pub async fn get_counts(
        &self,
        workspace_id: &WorkspaceId,
        category_id: &CategoryId,
    ) -> Result<BTreeMap<LabelValue, usize>> {
        let workspace = self.workspace(workspace_id).await?;
        workspace.category(category_id).await?;
        let counts = workspace.labels.read().await.counts(category_id);
        Ok(counts.to_map())
    }

    // ==================== Training ====================

    /// Start a new iteration for the category if the trigger policy allows.
    ///
    /// Never waits for training: a reserved iteration runs on a detached task.
    pub async fn maybe_trigger(
        &self,
        workspace_id: &WorkspaceId,
        category_id: &CategoryId,
    ) -> Result<TriggerOutcome> {
        let workspace = self.workspace(workspace_id).await?;
        let category = workspace.category(category_id).await?;
        Ok(self.trigger(&workspace, &category).await)
    }

    async fn trigger(&self, workspace: &Workspace, state: &CategoryState) -> TriggerOutcome {
        let category_id = &state.category.id;
        let mut log = state.iterations.lock().await;

        let (number, snapshot) = {
            let labels = workspace.labels.read().await;
            let counts = labels.counts(category_id);
            let version = labels.version(category_id);

            match self.config.trigger.evaluate(&counts, version, &log) {
                TriggerDecision::Start => {}
                TriggerDecision::InProgress(n) => return TriggerOutcome::InProgress(n),
                TriggerDecision::EvaluationOpen(n) => return TriggerOutcome::EvaluationOpen(n),
                TriggerDecision::InsufficientEvidence => return TriggerOutcome::InsufficientEvidence,
                TriggerDecision::NoNewLabels => return TriggerOutcome::NoNewLabels,
            }

            let Some(number) = log.try_reserve(version, counts) else {
                return TriggerOutcome::NoNewLabels;
            };
            (number, labels.snapshot(category_id, &workspace.dataset))
        };
        drop(log);

        info!(
            workspace = %workspace.id,
            category = %category_id,
            iteration = number,
            positive = snapshot.counts.positive,
            negative = snapshot.counts.negative,
            "Iteration reserved"
        );
        publish(
            &self.events,
            OrchestratorEvent::IterationReserved {
                workspace_id: workspace.id.clone(),
                category_id: category_id.clone(),
                iteration: number,
            },
        );

        IterationRunner::new(
            workspace.id.clone(),
            category_id.clone(),
            number,
            snapshot,
            Arc::clone(&workspace.dataset),
            Arc::clone(&state.iterations),
            self.collaborators.clone(),
            self.events.clone(),
            self.config.selection.max_candidates,
        )
        .spawn();

        TriggerOutcome::Reserved(number)
    }

    // ==================== Status ====================

    /// Current status of a category.
    ///
    /// Not a passive read: the trigger runs first, so polling alone starts
    /// training once the policy is met. Never waits on a running iteration.
    pub async fn get_status(
        &self,
        workspace_id: &WorkspaceId,
        category_id: &CategoryId,
    ) -> Result<StatusSnapshot> {
        let workspace = self.workspace(workspace_id).await?;
        let category = workspace.category(category_id).await?;

        self.trigger(&workspace, &category).await;

        let log = category.iterations.lock().await;
        let counts = workspace.labels.read().await.counts(category_id);
        Ok(StatusSnapshot::compose(
            category_id.clone(),
            counts,
            workspace.dataset.total_elements(),
            &log,
        ))
    }

    /// Iteration history in sequence order
    pub async fn list_iterations(
        &self,
        workspace_id: &WorkspaceId,
        category_id: &CategoryId,
    ) -> Result<Vec<IterationSummary>> {
        let category = self.category(workspace_id, category_id).await?;
        let summaries = category.iterations.lock().await.summaries();
        Ok(summaries)
    }

    /// Predictions of the latest READY iteration
    pub async fn predictions(
        &self,
        workspace_id: &WorkspaceId,
        category_id: &CategoryId,
    ) -> Result<Option<Arc<PredictionSet>>> {
        let category = self.category(workspace_id, category_id).await?;
        let log = category.iterations.lock().await;
        Ok(log
            .latest_ready()
            .and_then(|it| it.result())
            .map(|result| Arc::clone(&result.predictions)))
    }

    /// Up to `limit` ranked candidates from the latest READY iteration,
    /// skipping elements labeled for the category since it was reserved
    pub async fn next_candidates(
        &self,
        workspace_id: &WorkspaceId,
        category_id: &CategoryId,
        limit: usize,
    ) -> Result<Vec<ElementId>> {
        let workspace = self.workspace(workspace_id).await?;
        let category = workspace.category(category_id).await?;

        let candidates = {
            let log = category.iterations.lock().await;
            match log.latest_ready().and_then(|it| it.result()) {
                Some(result) => result.candidates.clone(),
                None => return Ok(Vec::new()),
            }
        };

        let labels = workspace.labels.read().await;
        Ok(candidates
            .into_iter()
            .filter(|id| !labels.is_labeled(id, category_id))
            .take(limit)
            .collect())
    }

    /// Positively predicted elements of the latest READY iteration, most
    /// confident first
    pub async fn positive_predictions(
        &self,
        workspace_id: &WorkspaceId,
        category_id: &CategoryId,
        limit: usize,
    ) -> Result<Vec<ElementView>> {
        let workspace = self.workspace(workspace_id).await?;
        let category = workspace.category(category_id).await?;

        let predictions = {
            let log = category.iterations.lock().await;
            match log.latest_ready().and_then(|it| it.result()) {
                Some(result) => Arc::clone(&result.predictions),
                None => return Ok(Vec::new()),
            }
        };

        let mut positives: Vec<(&ElementId, &Prediction)> = predictions
            .iter()
            .filter(|(_, prediction)| prediction.value == LabelValue::True)
            .collect();
        positives.sort_by(|a, b| b.1.score.total_cmp(&a.1.score).then_with(|| a.0.cmp(b.0)));

        let elements: Vec<&Element> = positives
            .into_iter()
            .take(limit)
            .filter_map(|(id, _)| workspace.dataset.element(id))
            .collect();
        Ok(workspace.views(elements).await)
    }

    // ==================== Precision evaluation ====================

    /// Open a precision evaluation of the latest READY model.
    ///
    /// Samples up to `sample` elements the model predicts positive. Training
    /// for the category is deferred until the evaluation is submitted or
    /// cancelled. Asking again replaces the open evaluation.
    pub async fn precision_evaluation_elements(
        &self,
        workspace_id: &WorkspaceId,
        category_id: &CategoryId,
        sample: usize,
    ) -> Result<PrecisionSample> {
        let workspace = self.workspace(workspace_id).await?;
        let category = workspace.category(category_id).await?;

        let (iteration, ids) = {
            let mut log = category.iterations.lock().await;
            let Some((iteration, predictions)) = log
                .latest_ready()
                .and_then(|it| it.result().map(|result| (it.number(), &result.predictions)))
            else {
                return Err(EvaluationError::NoModel.into());
            };
            let ids = evaluation::sample_positive(predictions, sample);
            log.open_evaluation(PrecisionEvaluation {
                iteration,
                elements: ids.clone(),
            });
            (iteration, ids)
        };
        info!(
            workspace = %workspace_id,
            category = %category_id,
            iteration,
            sampled = ids.len(),
            "Precision evaluation opened"
        );

        let elements: Vec<&Element> = ids
            .iter()
            .filter_map(|id| workspace.dataset.element(id))
            .collect();
        Ok(PrecisionSample {
            iteration,
            elements: workspace.views(elements).await,
        })
    }

    /// Score the open evaluation from the user labels of `element_ids`,
    /// record the estimate on the iteration, and close the evaluation
    pub async fn submit_precision_evaluation(
        &self,
        workspace_id: &WorkspaceId,
        category_id: &CategoryId,
        iteration: u32,
        element_ids: &[ElementId],
    ) -> Result<PrecisionReport> {
        let workspace = self.workspace(workspace_id).await?;
        let category = workspace.category(category_id).await?;
        for id in element_ids {
            workspace.element(id)?;
        }

        let report = {
            let mut log = category.iterations.lock().await;
            let open = log.evaluation().ok_or(EvaluationError::NotOpen)?.iteration;
            if open != iteration {
                return Err(EvaluationError::IterationMismatch {
                    requested: iteration,
                    open,
                }
                .into());
            }

            let report = {
                let labels = workspace.labels.read().await;
                evaluation::score(element_ids, |id| labels.get(id, category_id), iteration)
                    .ok_or(EvaluationError::NothingLabeled)?
            };
            log.record_precision(iteration, report.score)
                .map_err(EvaluationError::from)?;
            log.close_evaluation();
            report
        };
        info!(
            workspace = %workspace_id,
            category = %category_id,
            iteration,
            score = report.score,
            evaluated = report.evaluated,
            "Precision evaluation submitted"
        );

        self.trigger(&workspace, &category).await;
        Ok(report)
    }

    /// Close the open evaluation without scoring it. Returns whether one
    /// was open.
    pub async fn cancel_precision_evaluation(
        &self,
        workspace_id: &WorkspaceId,
        category_id: &CategoryId,
    ) -> Result<bool> {
        let workspace = self.workspace(workspace_id).await?;
        let category = workspace.category(category_id).await?;

        let closed = category.iterations.lock().await.close_evaluation();
        let Some(closed) = closed else {
            return Ok(false);
        };
        debug!(
            workspace = %workspace_id,
            category = %category_id,
            iteration = closed.iteration,
            "Precision evaluation cancelled"
        );

        self.trigger(&workspace, &category).await;
        Ok(true)
    }

    // ==================== Elements and documents ====================

    pub async fn get_element(
        &self,
        workspace_id: &WorkspaceId,
        element_id: &ElementId,
    ) -> Result<ElementView> {
        let workspace = self.workspace(workspace_id).await?;
        let element = workspace.element(element_id)?;
        let mut views = workspace.views([element]).await;
        views
            .pop()
            .ok_or_else(|| OrchestratorError::unknown(ReferenceKind::Element, element_id))
    }

    /// Document ids in dataset order
    pub async fn list_documents(&self, workspace_id: &WorkspaceId) -> Result<Vec<DocumentId>> {
        let workspace = self.workspace(workspace_id).await?;
        Ok(workspace
            .dataset
            .documents()
            .iter()
            .map(|doc| doc.id.clone())
            .collect())
    }

    /// Views of every element of a document, in order
    pub async fn document_elements(
        &self,
        workspace_id: &WorkspaceId,
        document_id: &DocumentId,
    ) -> Result<Vec<ElementView>> {
        let workspace = self.workspace(workspace_id).await?;
        let document = workspace
            .dataset
            .document(document_id)
            .ok_or_else(|| OrchestratorError::unknown(ReferenceKind::Document, document_id))?;
        Ok(workspace.views(&document.elements).await)
    }

    /// Elements whose text contains `query`, ignoring case, in dataset
    /// order. A blank query matches nothing.
    pub async fn search(
        &self,
        workspace_id: &WorkspaceId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ElementView>> {
        let workspace = self.workspace(workspace_id).await?;
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let hits: Vec<&Element> = workspace
            .dataset
            .elements()
            .iter()
            .filter(|element| element.text.to_lowercase().contains(&needle))
            .take(limit)
            .collect();
        debug!(workspace = %workspace_id, query = %needle, hits = hits.len(), "Search");
        Ok(workspace.views(hits).await)
    }

    // ==================== Lookup ====================

    async fn workspace(&self, workspace_id: &WorkspaceId) -> Result<Arc<Workspace>> {
        self.workspaces
            .read()
            .await
            .get(workspace_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::unknown(ReferenceKind::Workspace, workspace_id))
    }

    async fn category(
        &self,
        workspace_id: &WorkspaceId,
        category_id: &CategoryId,
    ) -> Result<Arc<CategoryState>> {
        self.workspace(workspace_id).await?.category(category_id).await
    }
}
