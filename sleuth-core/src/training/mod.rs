//! Training collaborators
//!
//! The traits are the boundary the orchestrator drives. `PrototypeTrainer`
//! and `UncertaintySelector` are usable defaults; `mock` holds scripted
//! doubles for tests.

pub mod mock;
pub mod prototype;
pub mod traits;
pub mod uncertainty;

// Re-export key types for convenience
pub use mock::{ConstantPredictor, ScriptedSelector, ScriptedTrainer};
pub use prototype::{PrototypeModel, PrototypeTrainer};
pub use traits::{ActiveLearningSelector, ClassifierTrainer, ModelHandle, Prediction, Predictor};
pub use uncertainty::UncertaintySelector;
