//! Training collaborator traits
//!
//! The orchestrator wraps any implementation of "train a classifier" and
//! "rank unlabeled elements". Models cross this boundary as [`ModelHandle`]s,
//! which the orchestrator stores and forwards without interpreting.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dataset::Element;
use crate::error::TrainingError;
use crate::labels::LabelSnapshot;
use crate::types::{ElementId, LabelValue, ModelId};

/// Classifier output for one element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub value: LabelValue,
    /// Confidence that the element belongs to the category, in [0, 1]
    pub score: f32,
}

impl Prediction {
    /// Prediction from a positive-class score, thresholded at 0.5
    #[must_use]
    pub fn from_score(score: f32) -> Self {
        let score = score.clamp(0.0, 1.0);
        Self {
            value: LabelValue::from(score >= 0.5),
            score,
        }
    }
}

/// Capability to score elements with a trained model
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Return one prediction per element, in input order
    async fn predict(&self, elements: &[Element]) -> Result<Vec<Prediction>, TrainingError>;
}

/// Opaque token for a trained model
#[derive(Clone)]
pub struct ModelHandle {
    id: ModelId,
    predictor: Arc<dyn Predictor>,
}

impl ModelHandle {
    pub fn new(predictor: Arc<dyn Predictor>) -> Self {
        Self::with_id(ModelId::new(), predictor)
    }

    pub fn with_id(id: ModelId, predictor: Arc<dyn Predictor>) -> Self {
        Self { id, predictor }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    /// Score elements, checking the predictor kept the contract
    pub async fn predict(&self, elements: &[Element]) -> Result<Vec<Prediction>, TrainingError> {
        let predictions = self.predictor.predict(elements).await?;
        if predictions.len() != elements.len() {
            return Err(TrainingError::Inference(format!(
                "model {} returned {} predictions for {} elements",
                self.id,
                predictions.len(),
                elements.len()
            )));
        }
        Ok(predictions)
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle").field("id", &self.id).finish()
    }
}

/// Trains a classifier for one category from a label snapshot
#[async_trait]
pub trait ClassifierTrainer: Send + Sync {
    async fn train(&self, snapshot: &LabelSnapshot) -> Result<ModelHandle, TrainingError>;
}

/// Ranks unlabeled elements by value of labeling them next
#[async_trait]
pub trait ActiveLearningSelector: Send + Sync {
    /// Return element ids, most valuable first.
    ///
    /// `predictions` are the iteration's own predictions for `unlabeled`, in
    /// the same order, so selectors that only need scores skip inference.
    /// Ids outside `unlabeled` and repeats are dropped by the caller.
    async fn rank(
        &self,
        model: &ModelHandle,
        unlabeled: &[Element],
        predictions: &[Prediction],
    ) -> Result<Vec<ElementId>, TrainingError>;
}
