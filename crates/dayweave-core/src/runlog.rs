//! Run-log: the non-fatal diagnostics channel of a scheduling run.
//!
//! Malformed entries, dropped duplicates, and degraded conflict
//! resolutions are recorded here instead of aborting the run. The log is
//! part of the engine output, not a side effect.

use serde::{Deserialize, Serialize};

/// Pipeline stage that produced a run-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Gather,
    EventLog,
    Normalize,
    Dedupe,
    Conflict,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gather => "gather",
            Self::EventLog => "event_log",
            Self::Normalize => "normalize",
            Self::Dedupe => "dedupe",
            Self::Conflict => "conflict",
        }
    }
}

/// A single run-log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub stage: RunStage,
    pub message: String,
}

/// Ordered collection of run-log entries for one scheduling run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunLog {
    pub entries: Vec<RunLogEntry>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and mirror it to tracing.
    pub fn record(&mut self, stage: RunStage, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(stage = stage.as_str(), "{message}");
        self.entries.push(RunLogEntry { stage, message });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries recorded by a given stage.
    pub fn for_stage(&self, stage: RunStage) -> impl Iterator<Item = &RunLogEntry> {
        self.entries.iter().filter(move |e| e.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_filter_by_stage() {
        let mut log = RunLog::new();
        assert!(log.is_empty());

        log.record(RunStage::Normalize, "dropped entry");
        log.record(RunStage::Dedupe, "collapsed duplicate");
        log.record(RunStage::Normalize, "dropped another");

        assert_eq!(log.len(), 3);
        assert_eq!(log.for_stage(RunStage::Normalize).count(), 2);
        assert_eq!(log.for_stage(RunStage::Conflict).count(), 0);
    }
}
