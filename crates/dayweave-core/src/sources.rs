//! Collaborator interfaces that feed the engine.
//!
//! The engine itself never performs I/O; callers implement these traits
//! over whatever storage/service actually holds the data. A source that is
//! not configured simply contributes nothing -- absence is never a failure.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::TimeOfDay;

/// Error from a collaborator source. Treated as an empty contribution by
/// [`DayInput::gather`](crate::engine::DayInput::gather), recorded in the run-log.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct SourceError(pub String);

/// One entry from the confirmed-entry (calendar/task) source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub title: String,
    /// Absent together with `end` for undated items; such entries become
    /// all-day items.
    pub start: Option<NaiveDateTime>,
    /// Absent for open-ended entries; such entries become all-day items
    /// rather than zero-duration slots.
    pub end: Option<NaiveDateTime>,
    #[serde(default)]
    pub all_day: bool,
    /// Originating source/table identifier, used for priority lookup.
    pub source_id: String,
    #[serde(default)]
    pub completed: bool,
    /// Opaque reference back to the external entry (for write-back).
    #[serde(default)]
    pub origin_ref: Option<String>,
}

/// One entry parsed from the local event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub title: String,
    /// Local time-of-day range; absent for all-day entries.
    pub range: Option<(TimeOfDay, TimeOfDay)>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// A completed historical entry, used to build the week history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedEntry {
    pub title: String,
    pub minutes: u32,
    pub date: NaiveDate,
}

/// Supplies externally-confirmed calendar/task entries for a date.
pub trait ConfirmedEntrySource {
    /// Unique identifier of this source (e.g. a table name).
    fn name(&self) -> &str;

    /// Entries for the given date.
    fn entries_for(&self, date: NaiveDate) -> Result<Vec<CalendarEntry>, SourceError>;
}

/// Supplies local event-log entries for a date.
pub trait EventLogSource {
    fn entries_for(&self, date: NaiveDate) -> Result<Vec<EventLogEntry>, SourceError>;
}

/// Supplies completed-entry durations for a date range (used for the
/// weekly ratio balancer).
pub trait WeekHistorySource {
    /// Completed entries with `from <= date < to`.
    fn completed_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CompletedEntry>, SourceError>;
}
