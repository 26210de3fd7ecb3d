//! Error types for sleuth-core

use std::fmt;

use thiserror::Error;

use crate::dataset::DatasetError;
use crate::iteration::IterationStatus;

/// Kind of entity an id failed to resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Workspace,
    Category,
    Element,
    Document,
    Dataset,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Workspace => "workspace",
            Self::Category => "category",
            Self::Element => "element",
            Self::Document => "document",
            Self::Dataset => "dataset",
        };
        f.write_str(name)
    }
}

/// Errors returned synchronously by the orchestrator.
///
/// Training failures are never returned here; they are recorded on the
/// iteration and surface through the status snapshot.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Unknown {kind}: {id}")]
    UnknownReference { kind: ReferenceKind, id: String },

    #[error("Invalid label value: {0:?}")]
    InvalidLabelValue(String),

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: ReferenceKind, id: String },

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Precision evaluation: {0}")]
    Evaluation(#[from] EvaluationError),
}

impl OrchestratorError {
    pub(crate) fn unknown(kind: ReferenceKind, id: impl fmt::Display) -> Self {
        Self::UnknownReference {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn exists(kind: ReferenceKind, id: impl fmt::Display) -> Self {
        Self::AlreadyExists {
            kind,
            id: id.to_string(),
        }
    }
}

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors from the external training collaborators.
///
/// The display text becomes the failure reason of the iteration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrainingError {
    #[error("Trainer failed: {0}")]
    Trainer(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Selector failed: {0}")]
    Selector(String),
}

/// Precision evaluation misuse
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("no READY model to evaluate")]
    NoModel,

    #[error("no evaluation is open")]
    NotOpen,

    #[error("evaluation is open for iteration {open}, not {requested}")]
    IterationMismatch { requested: u32, open: u32 },

    #[error("none of the submitted elements is labeled")]
    NothingLabeled,

    #[error(transparent)]
    Iteration(#[from] IterationError),
}

/// Iteration state machine violations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IterationError {
    #[error("Invalid iteration transition from {from} to {to}")]
    InvalidTransition {
        from: IterationStatus,
        to: IterationStatus,
    },

    #[error("Iteration is terminal ({0}) and can no longer change")]
    Terminal(IterationStatus),

    #[error("Iteration {0} not found")]
    Missing(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_reference_displays_kind_and_id() {
        let error = OrchestratorError::unknown(ReferenceKind::Element, "doc-3");
        assert_eq!(error.to_string(), "Unknown element: doc-3");
    }

    #[test]
    fn already_exists_displays_kind_and_id() {
        let error = OrchestratorError::exists(ReferenceKind::Category, "sports");
        assert!(error.to_string().contains("category already exists"));
        assert!(error.to_string().contains("sports"));
    }

    #[test]
    fn evaluation_error_nests_under_orchestrator_error() {
        let error = OrchestratorError::from(EvaluationError::IterationMismatch {
            requested: 1,
            open: 2,
        });
        assert_eq!(
            error.to_string(),
            "Precision evaluation: evaluation is open for iteration 2, not 1"
        );
    }

    #[test]
    fn invalid_label_value_quotes_input() {
        let error = OrchestratorError::InvalidLabelValue("maybe".to_string());
        assert_eq!(error.to_string(), "Invalid label value: \"maybe\"");
    }

    #[test]
    fn orchestrator_error_converts_from_dataset_error() {
        let dataset_error = DatasetError::NotFound("ds".to_string());
        let error: OrchestratorError = dataset_error.into();
        assert!(matches!(error, OrchestratorError::Dataset(_)));
    }

    #[test]
    fn training_error_displays_reason() {
        let error = TrainingError::Trainer("only one class".to_string());
        assert_eq!(error.to_string(), "Trainer failed: only one class");
    }

    #[test]
    fn iteration_error_names_both_states() {
        let error = IterationError::InvalidTransition {
            from: IterationStatus::Pending,
            to: IterationStatus::Ready,
        };
        assert!(error.to_string().contains("PENDING"));
        assert!(error.to_string().contains("READY"));
    }
}
