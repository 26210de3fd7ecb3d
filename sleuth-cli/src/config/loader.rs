use super::types::{
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_SECS, DEFAULT_TOP_CANDIDATES, RawEventsSection,
    RawRunSection, RawSelectionSection, RawSleuthConfig, RawTriggerSection, RunConfig,
    SleuthConfig,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use sleuth_core::config::{EventsConfig, SelectionConfig};
use sleuth_core::trigger::TriggerPolicy;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user, then project, then `explicit`)
    ///
    /// Missing user and project files are skipped; a missing explicit file
    /// is an error.
    pub fn load(explicit: Option<&Path>) -> Result<SleuthConfig> {
        let mut raw = RawSleuthConfig::default();

        // Layer 1: User config
        if let Some(user_path) = Self::user_config_path()
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_layer(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_layer(&project_path)?);
        }

        // Layer 3: --config
        if let Some(path) = explicit {
            raw = Self::merge_raw(raw, Self::read_layer(path)?);
        }

        Ok(Self::finalize(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "sleuth").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with SLEUTH_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("SLEUTH_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".sleuth/config.toml")
        }
    }

    fn read_layer(path: &Path) -> Result<RawSleuthConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let layer = toml::from_str(&contents)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        debug!(path = %path.display(), "Config layer loaded");
        Ok(layer)
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawSleuthConfig, overlay: RawSleuthConfig) -> RawSleuthConfig {
        RawSleuthConfig {
            trigger: RawTriggerSection {
                min_positive_labels: overlay
                    .trigger
                    .min_positive_labels
                    .or(base.trigger.min_positive_labels),
                min_negative_labels: overlay
                    .trigger
                    .min_negative_labels
                    .or(base.trigger.min_negative_labels),
                min_total_labels: overlay
                    .trigger
                    .min_total_labels
                    .or(base.trigger.min_total_labels),
                changed_element_threshold: overlay
                    .trigger
                    .changed_element_threshold
                    .or(base.trigger.changed_element_threshold),
            },
            events: RawEventsSection {
                channel_capacity: overlay
                    .events
                    .channel_capacity
                    .or(base.events.channel_capacity),
            },
            selection: RawSelectionSection {
                max_candidates: overlay
                    .selection
                    .max_candidates
                    .or(base.selection.max_candidates),
            },
            run: RawRunSection {
                poll_interval_ms: overlay.run.poll_interval_ms.or(base.run.poll_interval_ms),
                timeout_secs: overlay.run.timeout_secs.or(base.run.timeout_secs),
                top_candidates: overlay.run.top_candidates.or(base.run.top_candidates),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawSleuthConfig) -> SleuthConfig {
        let trigger = TriggerPolicy::default();
        let events = EventsConfig::default();
        let selection = SelectionConfig::default();
        SleuthConfig {
            trigger: TriggerPolicy {
                min_positive_labels: raw
                    .trigger
                    .min_positive_labels
                    .unwrap_or(trigger.min_positive_labels),
                min_negative_labels: raw
                    .trigger
                    .min_negative_labels
                    .unwrap_or(trigger.min_negative_labels),
                min_total_labels: raw.trigger.min_total_labels.unwrap_or(trigger.min_total_labels),
                changed_element_threshold: raw
                    .trigger
                    .changed_element_threshold
                    .unwrap_or(trigger.changed_element_threshold),
            },
            events: EventsConfig {
                channel_capacity: raw.events.channel_capacity.unwrap_or(events.channel_capacity),
            },
            selection: SelectionConfig {
                max_candidates: raw.selection.max_candidates.unwrap_or(selection.max_candidates),
            },
            run: RunConfig {
                poll_interval_ms: raw.run.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
                timeout_secs: raw.run.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
                top_candidates: raw.run.top_candidates.unwrap_or(DEFAULT_TOP_CANDIDATES),
            },
        }
    }
}
