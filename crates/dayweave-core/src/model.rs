//! Core data model for the schedule synthesis engine.
//!
//! All times are wall-clock times within a single calendar day at minute
//! resolution. `24:00` is representable so shifted entries can be bounded
//! by end-of-day without spilling into the next date.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::error::{ConfigError, EngineError};

/// Minutes in a full day; also the hard upper bound for shifted entries.
pub const MINUTES_PER_DAY: u16 = 1440;

/// A wall-clock time of day at minute resolution.
///
/// Stored as minutes since midnight, `0..=1440`. The value `1440`
/// renders as `24:00` and marks the exclusive end of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MIDNIGHT: Self = Self(0);
    pub const END_OF_DAY: Self = Self(MINUTES_PER_DAY);

    /// Create from hours and minutes. `24:00` is the only valid hour-24 time.
    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if minute >= 60 {
            return None;
        }
        Self::from_minutes(hour * 60 + minute)
    }

    /// Create from minutes since midnight.
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        if minutes > MINUTES_PER_DAY {
            None
        } else {
            Some(Self(minutes))
        }
    }

    /// Minutes since midnight.
    pub fn minutes(self) -> u16 {
        self.0
    }

    /// Minutes from `self` until `later`; zero if `later` is not after `self`.
    pub fn minutes_until(self, later: Self) -> u16 {
        later.0.saturating_sub(self.0)
    }

    /// Add minutes, failing past end of day.
    pub fn add_minutes(self, minutes: u16) -> Option<Self> {
        Self::from_minutes(self.0.checked_add(minutes)?)
    }
}

impl From<NaiveTime> for TimeOfDay {
    fn from(t: NaiveTime) -> Self {
        use chrono::Timelike;
        // Seconds are truncated; the engine is minute-resolution.
        Self((t.hour() * 60 + t.minute()) as u16)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// Error parsing a `HH:MM` time string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid time of day '{0}', expected HH:MM")]
pub struct ParseTimeError(pub String);

impl FromStr for TimeOfDay {
    type Err = ParseTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTimeError(s.to_string());
        let (h, m) = s.split_once(':').ok_or_else(err)?;
        let hour: u16 = h.trim().parse().map_err(|_| err())?;
        let minute: u16 = m.trim().parse().map_err(|_| err())?;
        Self::from_hm(hour, minute).ok_or_else(err)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Kind of a scheduled slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    /// Fixed time from an external source or the local event log.
    Confirmed,
    /// Placed by the routine allocator.
    Routine,
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Routine => "routine",
        }
    }
}

/// The atomic scheduled unit on a day's timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: String,
    pub label: String,
    pub kind: SlotKind,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    /// Originating external source/table; used for priority lookup and
    /// deduplication. Absent for routine slots.
    pub source_id: Option<String>,
    /// Opaque reference back to the external entry, never interpreted here.
    pub origin_ref: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl TimeSlot {
    /// Create a new slot.
    ///
    /// # Panics
    /// Panics if `end <= start`. Use [`try_new`](Self::try_new) for a
    /// non-panicking version.
    pub fn new(label: impl Into<String>, kind: SlotKind, start: TimeOfDay, end: TimeOfDay) -> Self {
        Self::try_new(label, kind, start, end)
            .expect("TimeSlot::new: end must be after start")
    }

    /// Create a new slot, returning a Result.
    ///
    /// # Errors
    /// Returns an error if `end <= start`.
    pub fn try_new(
        label: impl Into<String>,
        kind: SlotKind,
        start: TimeOfDay,
        end: TimeOfDay,
    ) -> Result<Self, EngineError> {
        let label = label.into();
        if end <= start {
            return Err(EngineError::InvalidSlot { label, start, end });
        }
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            label,
            kind,
            start,
            end,
            source_id: None,
            origin_ref: None,
            completed: false,
        })
    }

    /// Confirmed slot from an external source.
    pub fn confirmed(
        label: impl Into<String>,
        start: TimeOfDay,
        end: TimeOfDay,
        source_id: impl Into<String>,
    ) -> Self {
        Self::new(label, SlotKind::Confirmed, start, end).with_source(source_id)
    }

    /// Routine slot placed by the allocator.
    pub fn routine(label: impl Into<String>, start: TimeOfDay, end: TimeOfDay) -> Self {
        Self::new(label, SlotKind::Routine, start, end)
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_origin_ref(mut self, origin_ref: impl Into<String>) -> Self {
        self.origin_ref = Some(origin_ref.into());
        self
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Duration in minutes.
    pub fn duration_minutes(&self) -> u16 {
        self.start.minutes_until(self.end)
    }

    /// Check whether this slot overlaps another in time.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// An all-day item. Never participates in timeline placement; carried
/// through unchanged for downstream display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllDayItem {
    pub label: String,
    pub source_id: Option<String>,
    pub origin_ref: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// A contiguous unscheduled interval within active hours.
///
/// Produced fresh each run; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeSlot {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl FreeSlot {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    /// Duration in minutes.
    pub fn minutes(&self) -> u16 {
        self.start.minutes_until(self.end)
    }
}

/// Which end of a free interval the allocator should fill from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferredEdge {
    Start,
    End,
}

/// Resolved daily duration of a routine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoutineDuration {
    /// Fixed daily minutes.
    Minutes(u16),
    /// Target share (0, 1] of the day's remaining free time.
    Ratio(f64),
}

/// One recurring activity definition in the routine pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutinePoolItem {
    pub label: String,
    /// Fixed daily duration. Mutually exclusive with `ratio`.
    #[serde(default)]
    pub minutes: Option<u16>,
    /// Target share of remaining free time. Mutually exclusive with `minutes`.
    #[serde(default)]
    pub ratio: Option<f64>,
    /// Lower value placed first; ties broken by declaration order.
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Whether the allocation may be split across multiple free intervals.
    #[serde(default)]
    pub splittable: bool,
    /// Minimum contiguous minutes per placed fragment.
    #[serde(default = "default_min_block")]
    pub min_block: u16,
    /// Search order within free intervals.
    #[serde(default)]
    pub preferred_edge: Option<PreferredEdge>,
    /// Intervals ending at or before this time are ineligible.
    #[serde(default)]
    pub earliest_start: Option<TimeOfDay>,
}

fn default_priority() -> u32 {
    100
}

fn default_min_block() -> u16 {
    15
}

impl RoutinePoolItem {
    /// Fixed-duration routine with defaults for everything else.
    pub fn fixed(label: impl Into<String>, minutes: u16) -> Self {
        Self {
            label: label.into(),
            minutes: Some(minutes),
            ratio: None,
            priority: default_priority(),
            splittable: false,
            min_block: default_min_block(),
            preferred_edge: None,
            earliest_start: None,
        }
    }

    /// Ratio-defined routine with defaults for everything else.
    pub fn ratio(label: impl Into<String>, ratio: f64) -> Self {
        Self {
            label: label.into(),
            minutes: None,
            ratio: Some(ratio),
            priority: default_priority(),
            splittable: false,
            min_block: default_min_block(),
            preferred_edge: None,
            earliest_start: None,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_splittable(mut self, splittable: bool) -> Self {
        self.splittable = splittable;
        self
    }

    pub fn with_min_block(mut self, min_block: u16) -> Self {
        self.min_block = min_block;
        self
    }

    pub fn with_preferred_edge(mut self, edge: PreferredEdge) -> Self {
        self.preferred_edge = Some(edge);
        self
    }

    pub fn with_earliest_start(mut self, earliest: TimeOfDay) -> Self {
        self.earliest_start = Some(earliest);
        self
    }

    /// Validate the `minutes` xor `ratio` invariant and value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let key = format!("routine.{}", self.label);
        match (self.minutes, self.ratio) {
            (Some(_), Some(_)) => Err(ConfigError::InvalidValue {
                key,
                message: "exactly one of 'minutes' or 'ratio' may be set, not both".into(),
            }),
            (None, None) => Err(ConfigError::InvalidValue {
                key,
                message: "one of 'minutes' or 'ratio' is required".into(),
            }),
            (Some(0), None) => Err(ConfigError::InvalidValue {
                key,
                message: "'minutes' must be greater than zero".into(),
            }),
            (None, Some(r)) if !(r > 0.0 && r <= 1.0) => Err(ConfigError::InvalidValue {
                key,
                message: format!("'ratio' must be within (0, 1], got {r}"),
            }),
            _ if self.min_block == 0 => Err(ConfigError::InvalidValue {
                key,
                message: "'min_block' must be at least 1 minute".into(),
            }),
            _ => Ok(()),
        }
    }

    /// Resolved duration kind. Only meaningful after [`validate`](Self::validate).
    pub fn duration(&self) -> RoutineDuration {
        match (self.minutes, self.ratio) {
            (Some(m), _) => RoutineDuration::Minutes(m),
            (None, Some(r)) => RoutineDuration::Ratio(r),
            (None, None) => RoutineDuration::Minutes(0),
        }
    }
}

/// Week-to-date completed minutes per routine label.
///
/// Computed once per run from historical confirmed entries
/// (Monday-anchored, inclusive of yesterday, exclusive of today);
/// immutable within the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeekHistory {
    minutes_by_label: HashMap<String, u32>,
}

impl WeekHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from completed entry titles, grouping by prefix/substring
    /// match against the configured routine labels (case-insensitive).
    /// Entries matching no label are ignored.
    pub fn from_completed<'a, I, S>(entries: I, labels: &[S]) -> Self
    where
        I: IntoIterator<Item = (&'a str, u32)>,
        S: AsRef<str>,
    {
        let mut history = Self::new();
        for (title, minutes) in entries {
            let title_lower = title.to_lowercase();
            let matched = labels
                .iter()
                .find(|l| !l.as_ref().is_empty() && title_lower.contains(&l.as_ref().to_lowercase()));
            if let Some(label) = matched {
                history.record(label.as_ref(), minutes);
            }
        }
        history
    }

    /// Add completed minutes for a label.
    pub fn record(&mut self, label: impl Into<String>, minutes: u32) {
        *self.minutes_by_label.entry(label.into()).or_insert(0) += minutes;
    }

    /// Completed minutes for a label this week.
    pub fn minutes_for(&self, label: &str) -> u32 {
        self.minutes_by_label.get(label).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.minutes_by_label.is_empty() || self.minutes_by_label.values().all(|m| *m == 0)
    }
}
