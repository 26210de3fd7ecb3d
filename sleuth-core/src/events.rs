//! Iteration lifecycle events
//!
//! Published on a broadcast channel as iterations are reserved and change
//! status. Events are notifications only; polling status is still what
//! starts training.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::iteration::IterationStatus;
use crate::types::{CategoryId, WorkspaceId};

/// Events emitted by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// A PENDING iteration was reserved
    IterationReserved {
        workspace_id: WorkspaceId,
        category_id: CategoryId,
        iteration: u32,
    },
    /// An iteration moved to a new status
    IterationStatusChanged {
        workspace_id: WorkspaceId,
        category_id: CategoryId,
        iteration: u32,
        status: IterationStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure: Option<String>,
    },
}

impl OrchestratorEvent {
    pub fn workspace_id(&self) -> &WorkspaceId {
        match self {
            Self::IterationReserved { workspace_id, .. }
            | Self::IterationStatusChanged { workspace_id, .. } => workspace_id,
        }
    }

    pub fn category_id(&self) -> &CategoryId {
        match self {
            Self::IterationReserved { category_id, .. }
            | Self::IterationStatusChanged { category_id, .. } => category_id,
        }
    }

    pub fn iteration(&self) -> u32 {
        match self {
            Self::IterationReserved { iteration, .. }
            | Self::IterationStatusChanged { iteration, .. } => *iteration,
        }
    }

    /// Status the iteration is in after this event
    pub fn status(&self) -> IterationStatus {
        match self {
            Self::IterationReserved { .. } => IterationStatus::Pending,
            Self::IterationStatusChanged { status, .. } => *status,
        }
    }
}

/// Sending half shared by the orchestrator and its runners
pub type EventSender = broadcast::Sender<OrchestratorEvent>;

/// Publish, ignoring the absence of subscribers
pub(crate) fn publish(tx: &EventSender, event: OrchestratorEvent) {
    let _ = tx.send(event);
}
