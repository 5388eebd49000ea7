//! # Dayweave Core Library
//!
//! Daily schedule synthesis: turns externally-confirmed calendar/task
//! entries, a prioritized pool of recurring activities ("routines"), and a
//! week-to-date completion history into one non-overlapping timeline for a
//! single day.
//!
//! ## Architecture
//!
//! Data flows strictly forward through the pipeline; no component
//! re-enters an earlier one within a run:
//!
//! - **Entry Normalizer**: heterogeneous confirmed entries into one
//!   time-slot representation
//! - **Duplicate Collapser**: event-log records of calendar-service events
//!   are dropped before conflict resolution
//! - **Conflict Resolver**: cross-source overlaps eliminated by a rule
//!   table, with an audit trail
//! - **Free-Slot Calculator**: active hours minus confirmed slots
//! - **Weekly Ratio Balancer**: proportional-feedback correction of
//!   ratio-defined routines
//! - **Routine Pool Allocator**: constrained packing into free intervals
//!
//! ## Key Components
//!
//! - [`ScheduleEngine`]: the pipeline, driven by an [`EngineConfig`]
//! - [`DayInput`] / [`DayPlan`]: one run's inputs and plain-data output
//! - [`ConfirmedEntrySource`] / [`EventLogSource`] / [`WeekHistorySource`]:
//!   collaborator interfaces the caller implements

pub mod allocator;
pub mod balance;
pub mod config;
pub mod conflict;
pub mod dedupe;
pub mod engine;
pub mod error;
pub mod eventlog;
pub mod freeslot;
pub mod model;
pub mod normalize;
pub mod runlog;
pub mod sources;

pub use allocator::{allocate, AllocationResult, ResolvedRoutine};
pub use balance::{balance_ratios, RatioAllocation, DAYS_IN_WEEK, RATIO_FLOOR};
pub use config::{ActiveHours, EngineConfig};
pub use conflict::{
    reconcile_sources, resolve, AuditRecord, ConflictAction, ConflictRuleTable, OverrideRule,
    ResolutionWarning, ShiftParams, ShrinkParams,
};
pub use dedupe::{collapse_duplicates, NormalizedSubstringMatcher, TitleMatcher};
pub use engine::{DayInput, DayPlan, ScheduleEngine};
pub use error::{ConfigError, EngineError, Result};
pub use eventlog::{parse_event_log, ParseIssue};
pub use freeslot::{compute_free_slots, DEFAULT_MIN_GAP_MINUTES};
pub use model::{
    AllDayItem, FreeSlot, PreferredEdge, RoutineDuration, RoutinePoolItem, SlotKind, TimeOfDay,
    TimeSlot, WeekHistory,
};
pub use normalize::{normalize, NormalizedEntries, EVENT_LOG_SOURCE_ID};
pub use runlog::{RunLog, RunLogEntry, RunStage};
pub use sources::{
    CalendarEntry, CompletedEntry, ConfirmedEntrySource, EventLogEntry, EventLogSource,
    SourceError, WeekHistorySource,
};
