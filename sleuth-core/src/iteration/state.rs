//! Iteration record and state machine
//!
//! ```text
//! PENDING -> TRAINING -> RUNNING_ACTIVE_LEARNING -> READY
//!     \__________\_______________\______________-> ERROR
//! ```
//!
//! `PENDING` is only created by a trigger reservation. `READY` and `ERROR`
//! are terminal: once reached, status and result never change.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IterationError;
use crate::labels::LabelCounts;
use crate::training::{ModelHandle, Prediction};
use crate::types::{CategoryId, ElementId, ModelId};

/// Predictions of one model, keyed by element
pub type PredictionSet = BTreeMap<ElementId, Prediction>;

/// Status of a training iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IterationStatus {
    /// Reserved, runner not started yet
    Pending,
    /// Classifier training in progress
    Training,
    /// Model produced; predicting and ranking candidates
    RunningActiveLearning,
    /// Finished with a result (terminal)
    Ready,
    /// Failed (terminal)
    Error,
}

impl IterationStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Training => "TRAINING",
            Self::RunningActiveLearning => "RUNNING_ACTIVE_LEARNING",
            Self::Ready => "READY",
            Self::Error => "ERROR",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "TRAINING" => Some(Self::Training),
            "RUNNING_ACTIVE_LEARNING" => Some(Self::RunningActiveLearning),
            "READY" => Some(Self::Ready),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Error)
    }

    /// Allowed edges: one step forward, or into ERROR from any non-terminal
    #[must_use]
    pub fn can_transition_to(&self, next: IterationStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Training)
                | (Self::Training, Self::RunningActiveLearning)
                | (Self::RunningActiveLearning, Self::Ready)
                | (Self::Pending | Self::Training | Self::RunningActiveLearning, Self::Error)
        )
    }
}

impl fmt::Display for IterationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result bundle attached when an iteration reaches READY
#[derive(Debug, Clone)]
pub struct IterationResult {
    pub model: ModelHandle,
    pub predictions: Arc<PredictionSet>,
    /// Unlabeled elements ranked for labeling next
    pub candidates: Vec<ElementId>,
}

/// One training cycle for a category
#[derive(Debug, Clone)]
pub struct Iteration {
    number: u32,
    category_id: CategoryId,
    status: IterationStatus,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    /// Label version of the snapshot this iteration trains on
    label_version: u64,
    label_counts: LabelCounts,
    result: Option<IterationResult>,
    failure: Option<String>,
    /// Latest precision estimate from a submitted evaluation
    precision: Option<f64>,
}

impl Iteration {
    /// Create a PENDING iteration
    pub(crate) fn pending(
        number: u32,
        category_id: CategoryId,
        label_version: u64,
        label_counts: LabelCounts,
    ) -> Self {
        Self {
            number,
            category_id,
            status: IterationStatus::Pending,
            created_at: Utc::now(),
            finished_at: None,
            label_version,
            label_counts,
            result: None,
            failure: None,
            precision: None,
        }
    }

    /// Sequence number within the category, starting at 1
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn category_id(&self) -> &CategoryId {
        &self.category_id
    }

    pub fn status(&self) -> IterationStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn label_version(&self) -> u64 {
        self.label_version
    }

    pub fn label_counts(&self) -> LabelCounts {
        self.label_counts
    }

    /// Result bundle; present only once READY
    pub fn result(&self) -> Option<&IterationResult> {
        self.result.as_ref()
    }

    /// Failure reason; present only once ERROR
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn precision(&self) -> Option<f64> {
        self.precision
    }

    /// Attach a precision estimate; only READY iterations have a model to
    /// evaluate. A later evaluation replaces the earlier estimate.
    pub(crate) fn record_precision(&mut self, score: f64) -> Result<(), IterationError> {
        if self.status != IterationStatus::Ready {
            return Err(IterationError::InvalidTransition {
                from: self.status,
                to: IterationStatus::Ready,
            });
        }
        self.precision = Some(score);
        Ok(())
    }

    /// Move to a non-terminal successor state
    pub(crate) fn advance(&mut self, next: IterationStatus) -> Result<(), IterationError> {
        if next.is_terminal() {
            return Err(IterationError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.transition(next)
    }

    /// Attach the result bundle and move to READY
    pub(crate) fn complete(&mut self, result: IterationResult) -> Result<(), IterationError> {
        self.transition(IterationStatus::Ready)?;
        self.result = Some(result);
        Ok(())
    }

    /// Record the failure reason and move to ERROR
    pub(crate) fn fail(&mut self, reason: impl Into<String>) -> Result<(), IterationError> {
        self.transition(IterationStatus::Error)?;
        self.failure = Some(reason.into());
        Ok(())
    }

    fn transition(&mut self, next: IterationStatus) -> Result<(), IterationError> {
        if self.status.is_terminal() {
            return Err(IterationError::Terminal(self.status));
        }
        if !self.status.can_transition_to(next) {
            return Err(IterationError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn summary(&self) -> IterationSummary {
        IterationSummary {
            iteration: self.number,
            category_id: self.category_id.clone(),
            status: self.status,
            created_at: self.created_at,
            finished_at: self.finished_at,
            model_id: self.result.as_ref().map(|r| r.model.id()),
            failure: self.failure.clone(),
            label_counts: self.label_counts,
            precision: self.precision,
        }
    }
}

/// Serializable view of an iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSummary {
    pub iteration: u32,
    pub category_id: CategoryId,
    pub status: IterationStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<ModelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub label_counts: LabelCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::ConstantPredictor;

    fn pending() -> Iteration {
        Iteration::pending(1, CategoryId::new("cat"), 3, LabelCounts::default())
    }

    fn result() -> IterationResult {
        IterationResult {
            model: ModelHandle::new(Arc::new(ConstantPredictor { score: 0.9 })),
            predictions: Arc::new(PredictionSet::new()),
            candidates: vec![],
        }
    }

    // ==================== Status Tests ====================

    #[test]
    fn status_string_roundtrip() {
        for status in [
            IterationStatus::Pending,
            IterationStatus::Training,
            IterationStatus::RunningActiveLearning,
            IterationStatus::Ready,
            IterationStatus::Error,
        ] {
            assert_eq!(IterationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(IterationStatus::parse("ready"), None);
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&IterationStatus::RunningActiveLearning).unwrap();
        assert_eq!(json, "\"RUNNING_ACTIVE_LEARNING\"");
    }

    #[test]
    fn only_ready_and_error_are_terminal() {
        assert!(!IterationStatus::Pending.is_terminal());
        assert!(!IterationStatus::Training.is_terminal());
        assert!(!IterationStatus::RunningActiveLearning.is_terminal());
        assert!(IterationStatus::Ready.is_terminal());
        assert!(IterationStatus::Error.is_terminal());
    }

    #[test]
    fn transitions_cannot_skip_states() {
        assert!(!IterationStatus::Pending.can_transition_to(IterationStatus::RunningActiveLearning));
        assert!(!IterationStatus::Pending.can_transition_to(IterationStatus::Ready));
        assert!(!IterationStatus::Training.can_transition_to(IterationStatus::Ready));
        assert!(!IterationStatus::Training.can_transition_to(IterationStatus::Pending));
        assert!(IterationStatus::Pending.can_transition_to(IterationStatus::Error));
        assert!(IterationStatus::RunningActiveLearning.can_transition_to(IterationStatus::Error));
    }

    // ==================== Iteration Tests ====================

    #[test]
    fn happy_path_reaches_ready_with_result() {
        let mut iteration = pending();

        iteration.advance(IterationStatus::Training).unwrap();
        iteration.advance(IterationStatus::RunningActiveLearning).unwrap();
        iteration.complete(result()).unwrap();

        assert_eq!(iteration.status(), IterationStatus::Ready);
        assert!(iteration.result().is_some());
        assert!(iteration.finished_at().is_some());
        assert!(iteration.summary().model_id.is_some());
    }

    #[test]
    fn complete_from_training_is_rejected() {
        let mut iteration = pending();
        iteration.advance(IterationStatus::Training).unwrap();

        let err = iteration.complete(result()).unwrap_err();

        assert!(matches!(err, IterationError::InvalidTransition { .. }));
        assert!(iteration.result().is_none());
        assert_eq!(iteration.status(), IterationStatus::Training);
    }

    #[test]
    fn advance_refuses_terminal_targets() {
        let mut iteration = pending();
        assert!(iteration.advance(IterationStatus::Error).is_err());
        assert_eq!(iteration.status(), IterationStatus::Pending);
    }

    #[test]
    fn fail_records_reason() {
        let mut iteration = pending();
        iteration.advance(IterationStatus::Training).unwrap();

        iteration.fail("trainer exploded").unwrap();

        assert_eq!(iteration.status(), IterationStatus::Error);
        assert_eq!(iteration.failure(), Some("trainer exploded"));
        assert_eq!(iteration.summary().failure.as_deref(), Some("trainer exploded"));
    }

    #[test]
    fn terminal_iteration_is_immutable() {
        let mut iteration = pending();
        iteration.fail("first").unwrap();

        let again = iteration.fail("second");
        let advance = iteration.advance(IterationStatus::Training);

        assert!(matches!(again, Err(IterationError::Terminal(IterationStatus::Error))));
        assert!(advance.is_err());
        assert_eq!(iteration.failure(), Some("first"));
    }
}
