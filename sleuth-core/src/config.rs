//! Orchestrator configuration
//!
//! Every section has defaults, so an empty TOML document is a valid config.

use serde::{Deserialize, Serialize};

use crate::trigger::TriggerPolicy;

/// Default broadcast capacity for iteration events
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Default cap on ranked candidates kept per iteration
pub const DEFAULT_MAX_CANDIDATES: usize = 50;

/// Configuration for the orchestrator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// When a category starts a new iteration
    #[serde(default)]
    pub trigger: TriggerPolicy,
    /// Iteration event channel settings
    #[serde(default)]
    pub events: EventsConfig,
    /// Active-learning result settings
    #[serde(default)]
    pub selection: SelectionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Ranked candidates stored in a result bundle
    pub max_candidates: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

impl OrchestratorConfig {
    /// Parse from TOML, filling unspecified keys with defaults
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}
