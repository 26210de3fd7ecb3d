//! Precision evaluation of a READY model
//!
//! The user is shown a sample of elements the model predicts positive and
//! labels them. The share labeled `true` estimates the model's precision.
//! While an evaluation is open for a category the trigger defers training;
//! the labels written meanwhile still count as changes, so training resumes
//! once the evaluation is submitted or cancelled.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::iteration::PredictionSet;
use crate::types::{ElementId, LabelValue};
use crate::workspace::ElementView;

/// An evaluation handed out and not yet submitted or cancelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecisionEvaluation {
    /// READY iteration whose predictions were sampled
    pub iteration: u32,
    pub elements: Vec<ElementId>,
}

/// Elements to label for an evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecisionSample {
    pub iteration: u32,
    pub elements: Vec<ElementView>,
}

/// Outcome of a submitted evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionReport {
    pub iteration: u32,
    /// Share of evaluated elements labeled `true`, in [0, 1]
    pub score: f64,
    /// Submitted elements carrying a `true` or `false` label
    pub evaluated: usize,
    pub positive: usize,
}

/// Pick up to `sample` positively predicted elements, spread evenly over
/// the positives in id order
pub(crate) fn sample_positive(predictions: &PredictionSet, sample: usize) -> Vec<ElementId> {
    let positives: Vec<&ElementId> = predictions
        .iter()
        .filter(|(_, prediction)| prediction.value == LabelValue::True)
        .map(|(id, _)| id)
        .collect();
    if sample == 0 || positives.is_empty() {
        return Vec::new();
    }
    if positives.len() <= sample {
        return positives.into_iter().cloned().collect();
    }
    (0..sample)
        .map(|i| positives[i * positives.len() / sample].clone())
        .collect()
}

/// Score submitted elements by their current user labels.
///
/// Unlabeled and repeated ids are skipped. `None` when nothing submitted
/// carries a label.
pub(crate) fn score<'a>(
    ids: &'a [ElementId],
    label_of: impl Fn(&ElementId) -> Option<LabelValue>,
    iteration: u32,
) -> Option<PrecisionReport> {
    let mut seen: HashSet<&'a ElementId> = HashSet::with_capacity(ids.len());
    let mut evaluated = 0usize;
    let mut positive = 0usize;
    for id in ids {
        if !seen.insert(id) {
            continue;
        }
        match label_of(id) {
            Some(LabelValue::True) => {
                evaluated += 1;
                positive += 1;
            }
            Some(LabelValue::False) => evaluated += 1,
            Some(LabelValue::Unset) | None => {}
        }
    }
    if evaluated == 0 {
        return None;
    }
    let score = positive as f64 / evaluated as f64;
    Some(PrecisionReport {
        iteration,
        score,
        evaluated,
        positive,
    })
}
