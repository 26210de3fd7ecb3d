//! sleuth-core: workspace orchestrator for human-in-the-loop text classification
//!
//! A user labels elements (text spans) per category; once a category has
//! enough evidence, the orchestrator trains a classifier on a snapshot of its
//! labels and ranks unlabeled elements for the next round.
//!
//! - **Label store** - [`labels::LabelStore`] with maintained per-category counters
//! - **Iterations** - [`iteration::IterationLog`] and the detached [`iteration::IterationRunner`]
//! - **Trigger** - [`TriggerPolicy`] deciding when a new iteration starts
//! - **Status** - [`StatusSnapshot`] composed on every poll
//! - **Evaluation** - precision estimates for a READY model, see [`evaluation`]
//! - **Facade** - [`Orchestrator`], the single entry point
//!
//! Training and ranking are pluggable through [`ClassifierTrainer`] and
//! [`ActiveLearningSelector`].
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sleuth_core::{
//!     Collaborators, DatasetId, Document, ElementId, InMemoryDatasetProvider, LabelValue,
//!     Orchestrator, OrchestratorConfig, PrototypeTrainer, UncertaintySelector,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = InMemoryDatasetProvider::new();
//! let ds = DatasetId::new("news");
//! provider
//!     .add_documents(&ds, vec![Document::from_texts(&ds, "d1", &["a goal", "a loss"])])
//!     .await?;
//!
//! let orchestrator = Orchestrator::new(
//!     Arc::new(provider),
//!     Collaborators::new(Arc::new(PrototypeTrainer::new()), Arc::new(UncertaintySelector::new())),
//!     OrchestratorConfig::default(),
//! );
//! let info = orchestrator.create_workspace("ws", &ds).await?;
//! let sports = orchestrator.create_category(&info.id, "sports", "").await?.id;
//! orchestrator
//!     .set_label(&info.id, &ElementId::new("news-d1-0"), &sports, LabelValue::True)
//!     .await?;
//!
//! // Polling status is what starts training once the trigger policy is met
//! let status = orchestrator.get_status(&info.id, &sports).await?;
//! println!("{:?}", status.model_status);
//! # Ok(())
//! # }
//! ```
//!
//! # Locking
//!
//! ```text
//! Orchestrator ── RwLock<workspaces>
//!   Workspace ── RwLock<categories>
//!             ── RwLock<LabelStore>            (held only for a write)
//!     Category ── Mutex<IterationLog>         (reservation critical section)
//!                   └─ IterationRunner task    (locks only to record status)
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod events;
pub mod iteration;
pub mod labels;
pub mod status;
pub mod training;
pub mod trigger;
pub mod types;
pub mod workspace;

// Re-export key types for convenience
pub use config::OrchestratorConfig;
pub use dataset::{Dataset, DatasetError, DatasetProvider, Document, Element, InMemoryDatasetProvider};
pub use error::{
    EvaluationError, IterationError, OrchestratorError, ReferenceKind, Result, TrainingError,
};
pub use evaluation::{PrecisionReport, PrecisionSample};
pub use events::{EventSender, OrchestratorEvent};
pub use iteration::{Collaborators, IterationStatus, IterationSummary, PredictionSet};
pub use labels::{LabelCounts, LabelSnapshot};
pub use status::{Progress, StatusSnapshot};
pub use training::{
    ActiveLearningSelector, ClassifierTrainer, ModelHandle, Prediction, Predictor, PrototypeTrainer,
    UncertaintySelector,
};
pub use trigger::{TriggerOutcome, TriggerPolicy};
pub use types::{CategoryId, DatasetId, DocumentId, ElementId, LabelValue, ModelId, WorkspaceId};
pub use workspace::{Category, ElementView, Orchestrator, WorkspaceInfo};
