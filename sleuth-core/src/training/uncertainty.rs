//! Uncertainty sampling selector
//!
//! Ranks elements whose predicted score is closest to the decision boundary
//! first. Works from the scores the iteration already computed and never
//! runs the model again.

use async_trait::async_trait;

use super::traits::{ActiveLearningSelector, ModelHandle, Prediction};
use crate::dataset::Element;
use crate::error::TrainingError;
use crate::types::ElementId;

#[derive(Debug, Clone, Copy, Default)]
pub struct UncertaintySelector;

impl UncertaintySelector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ActiveLearningSelector for UncertaintySelector {
    async fn rank(
        &self,
        _model: &ModelHandle,
        unlabeled: &[Element],
        predictions: &[Prediction],
    ) -> Result<Vec<ElementId>, TrainingError> {
        if predictions.len() != unlabeled.len() {
            return Err(TrainingError::Selector(format!(
                "{} predictions for {} elements",
                predictions.len(),
                unlabeled.len()
            )));
        }

        let mut ranked: Vec<(f32, &ElementId)> = unlabeled
            .iter()
            .zip(predictions)
            .map(|(element, prediction)| ((prediction.score - 0.5).abs(), &element.id))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));

        Ok(ranked.into_iter().map(|(_, id)| id.clone()).collect())
    }
}
