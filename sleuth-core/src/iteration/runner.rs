//! Iteration runner
//!
//! Executes one reserved iteration off the caller's task: train on the label
//! snapshot, predict every element, rank the unlabeled ones, then record the
//! result. The category lock is taken only for each status write, never
//! across a collaborator call.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dataset::{Dataset, Element};
use crate::error::{IterationError, TrainingError};
use crate::events::{EventSender, OrchestratorEvent, publish};
use crate::labels::LabelSnapshot;
use crate::training::{ActiveLearningSelector, ClassifierTrainer, Prediction};
use crate::types::{CategoryId, ElementId, WorkspaceId};

use super::registry::IterationLog;
use super::state::{IterationResult, IterationStatus, PredictionSet};

/// The pluggable training collaborators
#[derive(Clone)]
pub struct Collaborators {
    pub trainer: Arc<dyn ClassifierTrainer>,
    pub selector: Arc<dyn ActiveLearningSelector>,
}

impl Collaborators {
    pub fn new(
        trainer: Arc<dyn ClassifierTrainer>,
        selector: Arc<dyn ActiveLearningSelector>,
    ) -> Self {
        Self { trainer, selector }
    }
}

#[derive(Error, Debug)]
enum RunnerError {
    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error(transparent)]
    Iteration(#[from] IterationError),
}

/// Runs a single PENDING iteration to a terminal status
#[derive(Clone)]
pub struct IterationRunner {
    workspace_id: WorkspaceId,
    category_id: CategoryId,
    number: u32,
    snapshot: Arc<LabelSnapshot>,
    dataset: Arc<Dataset>,
    log: Arc<Mutex<IterationLog>>,
    collaborators: Collaborators,
    events: EventSender,
    max_candidates: usize,
}

impl IterationRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workspace_id: WorkspaceId,
        category_id: CategoryId,
        number: u32,
        snapshot: LabelSnapshot,
        dataset: Arc<Dataset>,
        log: Arc<Mutex<IterationLog>>,
        collaborators: Collaborators,
        events: EventSender,
        max_candidates: usize,
    ) -> Self {
        Self {
            workspace_id,
            category_id,
            number,
            snapshot: Arc::new(snapshot),
            dataset,
            log,
            collaborators,
            events,
            max_candidates,
        }
    }

    /// Detach the run; the handle resolves to the terminal status.
    ///
    /// The work itself runs in an inner task so a panicking collaborator
    /// still leaves the iteration in ERROR instead of in flight forever.
    pub fn spawn(self) -> JoinHandle<IterationStatus> {
        tokio::spawn(async move {
            let work = tokio::spawn(self.clone().execute());
            let outcome = match work.await {
                Ok(outcome) => outcome,
                Err(join_error) => Err(RunnerError::Training(TrainingError::Trainer(format!(
                    "iteration task aborted: {}",
                    join_error
                )))),
            };
            self.finish(outcome).await
        })
    }

    async fn execute(self) -> Result<IterationResult, RunnerError> {
        self.transition(IterationStatus::Training).await?;
        let model = self.collaborators.trainer.train(&self.snapshot).await?;
        info!(
            workspace = %self.workspace_id,
            category = %self.category_id,
            iteration = self.number,
            model = %model.id(),
            "Model trained"
        );

        self.transition(IterationStatus::RunningActiveLearning).await?;
        let elements = self.dataset.elements();
        let scores = model.predict(elements).await?;
        let predictions: PredictionSet = elements
            .iter()
            .map(|element| element.id.clone())
            .zip(scores)
            .collect();

        let unlabeled: Vec<Element> = self
            .snapshot
            .unlabeled(&self.dataset)
            .into_iter()
            .cloned()
            .collect();
        let unlabeled_scores: Vec<Prediction> = unlabeled
            .iter()
            .filter_map(|element| predictions.get(&element.id).copied())
            .collect();
        let ranked = self
            .collaborators
            .selector
            .rank(&model, &unlabeled, &unlabeled_scores)
            .await?;
        let mut candidates = self.retain_unlabeled(ranked, &unlabeled);
        candidates.truncate(self.max_candidates);

        Ok(IterationResult {
            model,
            predictions: Arc::new(predictions),
            candidates,
        })
    }

    /// Keep ranked ids that name a snapshot-unlabeled element, first
    /// occurrence only
    fn retain_unlabeled(&self, ranked: Vec<ElementId>, unlabeled: &[Element]) -> Vec<ElementId> {
        let allowed: HashSet<&ElementId> = unlabeled.iter().map(|element| &element.id).collect();
        let mut seen = HashSet::with_capacity(ranked.len());
        let mut discarded = 0usize;
        let mut kept = Vec::with_capacity(ranked.len());
        for id in ranked {
            if allowed.contains(&id) && seen.insert(id.clone()) {
                kept.push(id);
            } else {
                discarded += 1;
            }
        }
        if discarded > 0 {
            warn!(
                workspace = %self.workspace_id,
                category = %self.category_id,
                iteration = self.number,
                discarded,
                "Selector returned unknown, labeled or repeated elements"
            );
        }
        kept
    }

    async fn transition(&self, next: IterationStatus) -> Result<(), RunnerError> {
        self.log.lock().await.advance(self.number, next)?;
        debug!(
            workspace = %self.workspace_id,
            category = %self.category_id,
            iteration = self.number,
            status = %next,
            "Iteration status changed"
        );
        self.publish(next, None);
        Ok(())
    }

    async fn finish(&self, outcome: Result<IterationResult, RunnerError>) -> IterationStatus {
        let mut log = self.log.lock().await;

        let recorded = match outcome {
            Ok(result) => log.complete(self.number, result).map(|()| None),
            Err(err) => {
                let reason = err.to_string();
                match err {
                    RunnerError::Training(_) => warn!(
                        workspace = %self.workspace_id,
                        category = %self.category_id,
                        iteration = self.number,
                        reason = %reason,
                        "Iteration failed"
                    ),
                    RunnerError::Iteration(_) => error!(
                        workspace = %self.workspace_id,
                        category = %self.category_id,
                        iteration = self.number,
                        reason = %reason,
                        "Iteration state machine violated"
                    ),
                }
                log.fail(self.number, reason.clone()).map(|()| Some(reason))
            }
        };

        let status = log
            .get(self.number)
            .map(|it| it.status())
            .unwrap_or(IterationStatus::Error);
        drop(log);

        match recorded {
            Ok(failure) => {
                debug!(
                    workspace = %self.workspace_id,
                    category = %self.category_id,
                    iteration = self.number,
                    status = %status,
                    "Iteration finished"
                );
                self.publish(status, failure);
            }
            Err(err) => error!(
                workspace = %self.workspace_id,
                category = %self.category_id,
                iteration = self.number,
                error = %err,
                "Could not record iteration outcome"
            ),
        }
        status
    }

    fn publish(&self, status: IterationStatus, failure: Option<String>) {
        publish(
            &self.events,
            OrchestratorEvent::IterationStatusChanged {
                workspace_id: self.workspace_id.clone(),
                category_id: self.category_id.clone(),
                iteration: self.number,
                status,
                failure,
            },
        );
    }
}
