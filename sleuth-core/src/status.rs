//! Status snapshots
//!
//! Composes label counts, dataset size and iteration history into the view
//! callers poll. Composition only reads; the orchestrator runs the trigger
//! before composing (see `Orchestrator::get_status`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::iteration::{IterationLog, IterationStatus};
use crate::labels::LabelCounts;
use crate::types::{CategoryId, LabelValue};

/// Labeling progress as a bounded percentage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Labeled elements as a percentage (0-100) of all dataset elements
    pub overall: u8,
}

impl Progress {
    /// Integer floor of `labeled * 100 / total`; 0 for an empty dataset
    #[must_use]
    pub fn from_counts(labeled: usize, total: usize) -> Self {
        if total == 0 {
            return Self::default();
        }
        let percent = labeled.min(total) * 100 / total;
        Self {
            overall: u8::try_from(percent).unwrap_or(100),
        }
    }
}

/// Externally visible status for one (workspace, category)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub category_id: CategoryId,
    pub labeling_counts: BTreeMap<LabelValue, usize>,
    pub progress: Progress,
    /// Status of the in-flight iteration, else of the latest terminal one;
    /// `None` when no iteration exists yet
    pub model_status: Option<IterationStatus>,
    /// Sequence number of the iteration `model_status` describes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
    /// Sequence number of the latest READY iteration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<u32>,
}

impl StatusSnapshot {
    pub(crate) fn compose(
        category_id: CategoryId,
        counts: LabelCounts,
        total_elements: usize,
        log: &IterationLog,
    ) -> Self {
        // Only the last iteration can be in flight, so the latest one is
        // either the active iteration or the latest terminal one.
        let latest = log.latest();
        Self {
            category_id,
            labeling_counts: counts.to_map(),
            progress: Progress::from_counts(counts.total(), total_elements),
            model_status: latest.map(|it| it.status()),
            iteration: latest.map(|it| it.number()),
            model_version: log.latest_ready().map(|it| it.number()),
        }
    }

    /// True when no iteration is in flight
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.model_status.is_none_or(|status| status.is_terminal())
    }
}
