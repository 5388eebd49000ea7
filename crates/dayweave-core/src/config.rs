//! TOML-based engine configuration.
//!
//! Loaded once per run and immutable for its duration: the active-hours
//! window, the full routine pool, and the conflict-rule table. A malformed
//! routine pool is the one fatal input class -- the engine refuses to
//! compute rather than silently guess.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::conflict::ConflictRuleTable;
use crate::error::{ConfigError, EngineError};
use crate::freeslot::DEFAULT_MIN_GAP_MINUTES;
use crate::model::{RoutinePoolItem, TimeOfDay};

/// The day's active-hours window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActiveHours {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl Default for ActiveHours {
    fn default() -> Self {
        Self {
            start: TimeOfDay::from_hm(8, 0).expect("valid constant"),
            end: TimeOfDay::from_hm(22, 0).expect("valid constant"),
        }
    }
}

/// Engine configuration: schema is exactly the RoutinePoolItem and
/// ConflictRule shapes plus the active-hours window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub active_hours: ActiveHours,

    /// Gaps shorter than this are not worth allocating against.
    #[serde(default = "default_min_gap")]
    pub min_gap_minutes: u16,

    #[serde(default, rename = "routine")]
    pub routine_pool: Vec<RoutinePoolItem>,

    #[serde(default, rename = "conflict")]
    pub conflict_rules: ConflictRuleTable,
}

fn default_min_gap() -> u16 {
    DEFAULT_MIN_GAP_MINUTES
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            active_hours: ActiveHours::default(),
            min_gap_minutes: default_min_gap(),
            routine_pool: Vec::new(),
            conflict_rules: ConflictRuleTable::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml_str(text: &str) -> Result<Self, EngineError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the routine pool and window. Fatal on failure: the engine
    /// cannot proceed without a well-formed pool.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.active_hours.start >= self.active_hours.end {
            return Err(ConfigError::InvalidValue {
                key: "active_hours".to_string(),
                message: format!(
                    "start ({}) must be before end ({})",
                    self.active_hours.start, self.active_hours.end
                ),
            });
        }
        for item in &self.routine_pool {
            item.validate()?;
        }
        Ok(())
    }

    /// Labels of the ratio-defined routines, for week-history grouping.
    pub fn ratio_labels(&self) -> Vec<String> {
        self.routine_pool
            .iter()
            .filter(|item| item.ratio.is_some())
            .map(|item| item.label.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictAction;
    use indoc::indoc;

    #[test]
    fn parses_full_config() {
        let text = indoc! {r#"
            min_gap_minutes = 20

            [active_hours]
            start = "07:30"
            end = "23:00"

            [[routine]]
            label = "Exercise"
            minutes = 45
            priority = 1

            [[routine]]
            label = "Reading"
            ratio = 0.2
            priority = 2
            splittable = true
            min_block = 20
            preferred_edge = "end"
            earliest_start = "18:00"

            [conflict]
            source_priority = ["google", "notion", "event-log"]

            [conflict.default_actions]
            notion = "shift"
            "event-log" = "delete"

            [[conflict.override]]
            label_contains = "Standup"
            action = "delete"

            [conflict.shift]
            max_shift_minutes = 120
            step_minutes = 10
        "#};

        let config = EngineConfig::from_toml_str(text).unwrap();
        assert_eq!(config.min_gap_minutes, 20);
        assert_eq!(config.active_hours.start.to_string(), "07:30");
        assert_eq!(config.routine_pool.len(), 2);
        assert_eq!(config.routine_pool[1].min_block, 20);
        assert_eq!(config.ratio_labels(), vec!["Reading".to_string()]);
        assert_eq!(config.conflict_rules.source_priority.len(), 3);
        assert_eq!(
            config.conflict_rules.default_actions.get("notion"),
            Some(&ConflictAction::Shift)
        );
        assert_eq!(config.conflict_rules.overrides.len(), 1);
        assert_eq!(config.conflict_rules.shift.max_shift_minutes, 120);
        // Unset shrink section falls back to defaults.
        assert_eq!(config.conflict_rules.shrink.min_minutes, 15);
    }

    #[test]
    fn defaults_applied_when_sections_missing() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.min_gap_minutes, DEFAULT_MIN_GAP_MINUTES);
        assert_eq!(config.active_hours.start.to_string(), "08:00");
        assert!(config.routine_pool.is_empty());
    }

    #[test]
    fn routine_with_both_minutes_and_ratio_is_fatal() {
        let text = indoc! {r#"
            [[routine]]
            label = "Broken"
            minutes = 30
            ratio = 0.5
        "#};
        assert!(EngineConfig::from_toml_str(text).is_err());
    }

    #[test]
    fn routine_with_neither_duration_is_fatal() {
        let text = indoc! {r#"
            [[routine]]
            label = "Broken"
        "#};
        assert!(EngineConfig::from_toml_str(text).is_err());
    }

    #[test]
    fn inverted_active_hours_is_fatal() {
        let text = indoc! {r#"
            [active_hours]
            start = "22:00"
            end = "08:00"
        "#};
        assert!(EngineConfig::from_toml_str(text).is_err());
    }
}
