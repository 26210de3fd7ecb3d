use serde::{Deserialize, Serialize};
use sleuth_core::OrchestratorConfig;
use sleuth_core::config::{EventsConfig, SelectionConfig};
use sleuth_core::trigger::TriggerPolicy;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSleuthConfig {
    #[serde(default)]
    pub trigger: RawTriggerSection,

    #[serde(default)]
    pub events: RawEventsSection,

    #[serde(default)]
    pub selection: RawSelectionSection,

    #[serde(default)]
    pub run: RawRunSection,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTriggerSection {
    pub min_positive_labels: Option<usize>,
    pub min_negative_labels: Option<usize>,
    pub min_total_labels: Option<usize>,
    pub changed_element_threshold: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawEventsSection {
    pub channel_capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSelectionSection {
    pub max_candidates: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRunSection {
    pub poll_interval_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub top_candidates: Option<usize>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SleuthConfig {
    #[serde(default)]
    pub trigger: TriggerPolicy,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub run: RunConfig,
}

impl SleuthConfig {
    /// The part handed to the orchestrator
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            trigger: self.trigger.clone(),
            events: self.events.clone(),
            selection: self.selection.clone(),
        }
    }
}

/// Settings of `sleuth run`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Delay between status polls
    pub poll_interval_ms: u64,

    /// Give up waiting for iterations after this long
    pub timeout_secs: u64,

    /// Candidates reported per category
    pub top_candidates: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            top_candidates: DEFAULT_TOP_CANDIDATES,
        }
    }
}

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TOP_CANDIDATES: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = SleuthConfig::default();
        assert_eq!(config.run.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.run.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.trigger.min_positive_labels, 1);
        assert_eq!(config.selection.max_candidates, 50);
    }

    #[test]
    fn test_orchestrator_config_carries_sections() {
        let config = SleuthConfig {
            trigger: TriggerPolicy {
                min_total_labels: 7,
                ..Default::default()
            },
            ..Default::default()
        };

        let orchestrator = config.orchestrator();

        assert_eq!(orchestrator.trigger.min_total_labels, 7);
        assert_eq!(orchestrator.events, EventsConfig::default());
    }

    #[test]
    fn test_serializes_all_sections() {
        let toml_str = toml::to_string_pretty(&SleuthConfig::default()).unwrap();

        assert!(toml_str.contains("[trigger]"));
        assert!(toml_str.contains("min_negative_labels = 1"));
        assert!(toml_str.contains("[events]"));
        assert!(toml_str.contains("[selection]"));
        assert!(toml_str.contains("[run]"));
    }
}
