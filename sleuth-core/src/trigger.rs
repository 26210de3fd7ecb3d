//! Training trigger policy
//!
//! Decides whether a category should start a new iteration. The decision is
//! pure; the orchestrator evaluates it inside the category's reservation
//! lock and acts on [`TriggerDecision::Start`].

use serde::{Deserialize, Serialize};

use crate::iteration::IterationLog;
use crate::labels::LabelCounts;

/// Minimum-evidence thresholds gating training
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerPolicy {
    /// Labels with value `true` required
    pub min_positive_labels: usize,
    /// Labels with value `false` required
    pub min_negative_labels: usize,
    /// Absolute minimum of labeled elements, on top of the per-class minimums
    pub min_total_labels: usize,
    /// Label changes since the previous iteration was reserved before another
    /// may start. The first iteration counts every change. Zero retrains on
    /// every poll once the previous iteration is terminal.
    pub changed_element_threshold: u64,
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        Self {
            min_positive_labels: 1,
            min_negative_labels: 1,
            min_total_labels: 0,
            changed_element_threshold: 1,
        }
    }
}

/// Outcome of evaluating the policy for one category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Reserve a new iteration
    Start,
    /// An iteration is already in flight
    InProgress(u32),
    /// A precision evaluation of this iteration is open
    EvaluationOpen(u32),
    /// Label counts do not meet the minimums
    InsufficientEvidence,
    /// Too few label changes since the last iteration
    NoNewLabels,
}

/// What a `maybe_trigger` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "iteration", rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// A new PENDING iteration was reserved and its runner detached
    Reserved(u32),
    /// Nothing started; this iteration is still in flight
    InProgress(u32),
    /// Training deferred until the evaluation of this iteration closes
    EvaluationOpen(u32),
    InsufficientEvidence,
    NoNewLabels,
}

impl TriggerOutcome {
    /// Sequence number of the reserved or in-flight iteration
    #[must_use]
    pub fn iteration(&self) -> Option<u32> {
        match self {
            Self::Reserved(n) | Self::InProgress(n) => Some(*n),
            Self::EvaluationOpen(_) | Self::InsufficientEvidence | Self::NoNewLabels => None,
        }
    }
}

impl TriggerPolicy {
    /// Whether the label counts satisfy the minimum-evidence policy
    #[must_use]
    pub fn has_evidence(&self, counts: &LabelCounts) -> bool {
        counts.positive >= self.min_positive_labels
            && counts.negative >= self.min_negative_labels
            && counts.total() >= self.min_total_labels
            && counts.total() > 0
    }

    /// Decide given current labels and the category's iteration history
    #[must_use]
    pub fn evaluate(
        &self,
        counts: &LabelCounts,
        label_version: u64,
        log: &IterationLog,
    ) -> TriggerDecision {
        if let Some(active) = log.active() {
            return TriggerDecision::InProgress(active.number());
        }
        if let Some(evaluation) = log.evaluation() {
            return TriggerDecision::EvaluationOpen(evaluation.iteration);
        }
        if !self.has_evidence(counts) {
            return TriggerDecision::InsufficientEvidence;
        }
        let baseline = log.latest().map(|it| it.label_version()).unwrap_or(0);
        if label_version.saturating_sub(baseline) < self.changed_element_threshold {
            return TriggerDecision::NoNewLabels;
        }
        TriggerDecision::Start
    }
}
