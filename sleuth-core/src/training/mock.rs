//! Scripted training collaborators for tests and demos
//!
//! `ScriptedTrainer` succeeds by default. Queue failures with `fail_next()`,
//! vary the produced model per call with `queue_score()`, slow it down with
//! `with_delay()`, or hold every run at a gate with `gated()` until
//! `release()` is called, which lets tests keep an iteration in flight for
//! as long as they need.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use super::traits::{ActiveLearningSelector, ClassifierTrainer, ModelHandle, Prediction, Predictor};
use crate::dataset::Element;
use crate::error::TrainingError;
use crate::labels::LabelSnapshot;
use crate::types::ElementId;

/// Predictor returning the same score for every element
#[derive(Debug, Clone, Copy)]
pub struct ConstantPredictor {
    pub score: f32,
}

#[async_trait]
impl Predictor for ConstantPredictor {
    async fn predict(&self, elements: &[Element]) -> Result<Vec<Prediction>, TrainingError> {
        Ok(vec![Prediction::from_score(self.score); elements.len()])
    }
}

/// Scripted implementation of ClassifierTrainer
pub struct ScriptedTrainer {
    /// Queued failures (each train() consumes one entry; empty means success)
    outcomes: Mutex<VecDeque<Option<String>>>,
    /// Snapshots seen, in call order
    snapshots: Mutex<Vec<LabelSnapshot>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    gate: Option<watch::Sender<bool>>,
    /// Scores for upcoming successful calls; `score` once drained
    scores: Mutex<VecDeque<f32>>,
    score: f32,
}

impl ScriptedTrainer {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            snapshots: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
            gate: None,
            scores: Mutex::new(VecDeque::new()),
            score: 0.75,
        }
    }

    /// Sleep for `delay` inside every train() call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Block every train() call until `release()`
    pub fn gated(mut self) -> Self {
        let (tx, _) = watch::channel(false);
        self.gate = Some(tx);
        self
    }

    /// Score the produced models assign to every element
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    /// Make the next train() call fail with `reason`
    pub fn fail_next(&self, reason: &str) {
        self.lock_outcomes().push_back(Some(reason.to_string()));
    }

    /// Score for the model of the next successful train() call
    pub fn queue_score(&self, score: f32) {
        self.scores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(score);
    }

    /// Let all current and future gated calls proceed
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.send_replace(true);
        }
    }

    /// Number of train() calls started
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Snapshots passed to train(), in call order
    pub fn snapshots(&self) -> Vec<LabelSnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_outcomes(&self) -> std::sync::MutexGuard<'_, VecDeque<Option<String>>> {
        self.outcomes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ScriptedTrainer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClassifierTrainer for ScriptedTrainer {
    async fn train(&self, snapshot: &LabelSnapshot) -> Result<ModelHandle, TrainingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.snapshots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(snapshot.clone());

        if let Some(gate) = &self.gate {
            let mut rx = gate.subscribe();
            // Sender lives in self, so the channel cannot close while we wait
            let _ = rx.wait_for(|open| *open).await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self.lock_outcomes().pop_front().flatten();
        if let Some(reason) = outcome {
            return Err(TrainingError::Trainer(reason));
        }
        let score = self
            .scores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or(self.score);
        Ok(ModelHandle::new(Arc::new(ConstantPredictor { score })))
    }
}

/// Scripted implementation of ActiveLearningSelector
///
/// Ranks elements in the order given unless a failure or a fixed ranking is
/// queued.
#[derive(Default)]
pub struct ScriptedSelector {
    failures: Mutex<VecDeque<String>>,
    rankings: Mutex<VecDeque<Vec<ElementId>>>,
    calls: AtomicUsize,
}

impl ScriptedSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next rank() call fail with `reason`
    pub fn fail_next(&self, reason: &str) {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(reason.to_string());
    }

    /// Return exactly `ids` from the next successful rank() call
    pub fn queue_ranking(&self, ids: Vec<ElementId>) {
        self.rankings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(ids);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActiveLearningSelector for ScriptedSelector {
    async fn rank(
        &self,
        _model: &ModelHandle,
        unlabeled: &[Element],
        _predictions: &[Prediction],
    ) -> Result<Vec<ElementId>, TrainingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        if let Some(reason) = failure {
            return Err(TrainingError::Selector(reason));
        }
        let scripted = self
            .rankings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        Ok(scripted.unwrap_or_else(|| unlabeled.iter().map(|e| e.id.clone()).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::LabelCounts;
    use crate::types::CategoryId;

    fn empty_snapshot() -> LabelSnapshot {
        LabelSnapshot {
            category_id: CategoryId::new("cat"),
            version: 0,
            counts: LabelCounts::default(),
            examples: vec![],
        }
    }

    #[tokio::test]
    async fn trainer_succeeds_by_default() {
        let trainer = ScriptedTrainer::new();

        assert!(trainer.train(&empty_snapshot()).await.is_ok());
        assert_eq!(trainer.calls(), 1);
        assert_eq!(trainer.snapshots().len(), 1);
    }

    #[tokio::test]
    async fn trainer_fails_once_when_queued() {
        let trainer = ScriptedTrainer::new();
        trainer.fail_next("boom");

        let first = trainer.train(&empty_snapshot()).await;
        let second = trainer.train(&empty_snapshot()).await;

        assert!(matches!(first, Err(TrainingError::Trainer(ref r)) if r == "boom"));
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn gated_trainer_waits_for_release() {
        let trainer = Arc::new(ScriptedTrainer::new().gated());
        let task = {
            let trainer = Arc::clone(&trainer);
            tokio::spawn(async move { trainer.train(&empty_snapshot()).await.is_ok() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        trainer.release();
        assert!(task.await.unwrap());
    }

    #[tokio::test]
    async fn queued_scores_apply_per_call() {
        let trainer = ScriptedTrainer::new().with_score(0.9);
        trainer.queue_score(0.1);
        let element = Element {
            id: ElementId::new("e"),
            document_id: crate::types::DocumentId::new("d"),
            begin: 0,
            end: 1,
            text: "x".to_string(),
        };

        let first = trainer.train(&empty_snapshot()).await.unwrap();
        let second = trainer.train(&empty_snapshot()).await.unwrap();

        let first = first.predict(std::slice::from_ref(&element)).await.unwrap();
        let second = second.predict(std::slice::from_ref(&element)).await.unwrap();
        assert_eq!(first[0].score, 0.1);
        assert_eq!(second[0].score, 0.9);
    }

    #[tokio::test]
    async fn selector_returns_queued_ranking_once() {
        let selector = ScriptedSelector::new();
        let model = ModelHandle::new(Arc::new(ConstantPredictor { score: 0.5 }));
        selector.queue_ranking(vec![ElementId::new("z")]);

        let scripted = selector.rank(&model, &[], &[]).await.unwrap();
        let default = selector.rank(&model, &[], &[]).await.unwrap();

        assert_eq!(scripted, vec![ElementId::new("z")]);
        assert!(default.is_empty());
    }

    #[tokio::test]
    async fn selector_fails_when_queued() {
        let selector = ScriptedSelector::new();
        let model = ModelHandle::new(Arc::new(ConstantPredictor { score: 0.5 }));
        selector.fail_next("no candidates");

        let result = selector.rank(&model, &[], &[]).await;

        assert!(matches!(result, Err(TrainingError::Selector(_))));
        assert_eq!(selector.calls(), 1);
    }
}
