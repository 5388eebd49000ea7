//! The schedule synthesis pipeline.
//!
//! Turns confirmed entries, the routine pool, and the week-to-date history
//! into a single non-overlapping timeline for one day:
//!
//! 1. Normalize heterogeneous confirmed entries
//! 2. Collapse event-log duplicates of calendar-service entries
//! 3. Resolve cross-source conflicts by the rule table
//! 4. Subtract confirmed slots from active hours
//! 5. Balance ratio routines against the week history
//! 6. Pack the routine pool into the free intervals
//! 7. Merge into the final timeline
//!
//! The pipeline is a pure, deterministic function of its inputs; every run
//! starts from freshly supplied, immutable-for-the-run snapshots and the
//! engine holds no state between runs.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::allocator::{allocate, ResolvedRoutine};
use crate::balance::{balance_ratios, RatioAllocation};
use crate::config::EngineConfig;
use crate::conflict::{resolve, AuditRecord};
use crate::dedupe::{collapse_duplicates, NormalizedSubstringMatcher, TitleMatcher};
use crate::error::EngineError;
use crate::freeslot::compute_free_slots;
use crate::model::{
    AllDayItem, FreeSlot, RoutineDuration, TimeSlot, WeekHistory,
};
use crate::normalize::normalize;
use crate::runlog::{RunLog, RunStage};
use crate::sources::{
    CalendarEntry, ConfirmedEntrySource, EventLogEntry, EventLogSource, WeekHistorySource,
};

/// Everything the engine needs for one day, gathered up front.
#[derive(Debug, Clone, Default)]
pub struct DayInput {
    pub calendar_entries: Vec<CalendarEntry>,
    pub event_log_entries: Vec<EventLogEntry>,
    pub week_history: WeekHistory,
    /// Days already elapsed in the Monday-anchored week (0 on Monday).
    pub days_elapsed: u32,
    /// Diagnostics accumulated while gathering; the engine appends to it.
    pub run_log: RunLog,
}

impl DayInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Days elapsed in the week of `date`, Monday-anchored.
    pub fn days_elapsed_for(date: NaiveDate) -> u32 {
        date.weekday().num_days_from_monday()
    }

    /// Parse event-log text into entries, folding parse issues into the
    /// run-log.
    pub fn with_event_log_text(mut self, text: &str) -> Self {
        let (entries, issues) = crate::eventlog::parse_event_log(text);
        for issue in issues {
            self.run_log.record(
                RunStage::EventLog,
                format!("line {}: {} ({})", issue.line_number, issue.reason, issue.line),
            );
        }
        self.event_log_entries.extend(entries);
        self
    }

    /// Gather inputs for `date` from the collaborator sources.
    ///
    /// Absent or failing sources contribute nothing; each failure is
    /// recorded in the run-log, never raised. `ratio_labels` drives the
    /// week-history grouping (see [`EngineConfig::ratio_labels`]).
    pub fn gather(
        date: NaiveDate,
        confirmed_sources: &[&dyn ConfirmedEntrySource],
        event_log: Option<&dyn EventLogSource>,
        history: Option<&dyn WeekHistorySource>,
        ratio_labels: &[String],
    ) -> Self {
        let mut input = Self {
            days_elapsed: Self::days_elapsed_for(date),
            ..Self::default()
        };

        for source in confirmed_sources {
            match source.entries_for(date) {
                Ok(entries) => input.calendar_entries.extend(entries),
                Err(e) => input.run_log.record(
                    RunStage::Gather,
                    format!("confirmed source '{}' unavailable: {e}", source.name()),
                ),
            }
        }

        if let Some(source) = event_log {
            match source.entries_for(date) {
                Ok(entries) => input.event_log_entries.extend(entries),
                Err(e) => input
                    .run_log
                    .record(RunStage::Gather, format!("event log unavailable: {e}")),
            }
        }

        if let Some(source) = history {
            let week_start = date
                - chrono::Duration::days(date.weekday().num_days_from_monday() as i64);
            match source.completed_between(week_start, date) {
                Ok(entries) => {
                    input.week_history = WeekHistory::from_completed(
                        entries.iter().map(|e| (e.title.as_str(), e.minutes)),
                        ratio_labels,
                    );
                }
                Err(e) => input
                    .run_log
                    .record(RunStage::Gather, format!("week history unavailable: {e}")),
            }
        }

        input
    }
}

/// The engine output: plain data, suitable for rendering or JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayPlan {
    /// Confirmed and routine slots, sorted by start, pairwise
    /// non-overlapping (tolerated keep-vs-keep overlaps excepted).
    pub timeline: Vec<TimeSlot>,
    /// All-day items, carried through unchanged.
    pub all_day: Vec<AllDayItem>,
    /// Free intervals before allocation.
    pub free_slots: Vec<FreeSlot>,
    /// Free intervals left after allocation.
    pub remaining_free: Vec<FreeSlot>,
    /// Per-label adjusted-ratio report.
    pub ratio_report: Vec<RatioAllocation>,
    /// Conflict-resolution audit trail.
    pub audit: Vec<AuditRecord>,
    /// The resolver's iteration budget ran out before convergence.
    pub resolution_budget_exhausted: bool,
    /// Non-fatal diagnostics from the whole run.
    pub run_log: RunLog,
}

/// Daily schedule synthesis engine.
///
/// Construction validates the configuration -- the only fatal input class.
/// A constructed engine always produces a complete plan.
pub struct ScheduleEngine {
    config: EngineConfig,
    matcher: Box<dyn TitleMatcher + Send + Sync>,
}

impl ScheduleEngine {
    /// Create an engine, validating the configuration.
    ///
    /// # Errors
    /// Returns a configuration error for a malformed routine pool or
    /// active-hours window.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            matcher: Box::new(NormalizedSubstringMatcher),
        })
    }

    /// Substitute a stricter duplicate matcher.
    pub fn with_matcher(mut self, matcher: Box<dyn TitleMatcher + Send + Sync>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Synthesize the day's timeline.
    pub fn plan(&self, input: DayInput) -> DayPlan {
        let config = &self.config;
        let window = (config.active_hours.start, config.active_hours.end);
        let mut run_log = input.run_log;

        // 1. Normalize.
        let normalized = normalize(&input.calendar_entries, &input.event_log_entries, &mut run_log);

        // 2. Collapse duplicates.
        let deduped = collapse_duplicates(normalized.slots, self.matcher.as_ref(), &mut run_log);

        // 3. Resolve cross-source conflicts.
        let outcome = resolve(deduped, &config.conflict_rules, window);
        if outcome.budget_exhausted {
            run_log.record(
                RunStage::Conflict,
                "resolution budget exhausted; overlaps may remain",
            );
        }

        // 4. Free intervals.
        let free_slots =
            compute_free_slots(&outcome.slots, window.0, window.1, config.min_gap_minutes);
        let free_total: u32 = free_slots.iter().map(|f| f.minutes() as u32).sum();

        // 5. Balance ratio routines against the week history. The pool for
        // ratio items is what fixed routines leave behind.
        let fixed_total: u32 = config
            .routine_pool
            .iter()
            .filter_map(|item| match item.duration() {
                RoutineDuration::Minutes(m) => Some(m as u32),
                RoutineDuration::Ratio(_) => None,
            })
            .sum();
        let pool_minutes = free_total.saturating_sub(fixed_total).min(u16::MAX as u32) as u16;

        let ratio_items: Vec<&_> = config
            .routine_pool
            .iter()
            .filter(|item| item.ratio.is_some())
            .collect();
        let ratio_report =
            balance_ratios(&ratio_items, &input.week_history, input.days_elapsed, pool_minutes);

        // 6. Allocate the resolved pool, in declaration order (the
        // allocator applies priority order internally).
        let resolved: Vec<ResolvedRoutine> = config
            .routine_pool
            .iter()
            .map(|item| {
                let minutes = match item.duration() {
                    RoutineDuration::Minutes(m) => m,
                    RoutineDuration::Ratio(_) => ratio_report
                        .iter()
                        .find(|r| r.label == item.label)
                        .map(|r| r.minutes)
                        .unwrap_or(0),
                };
                ResolvedRoutine {
                    label: item.label.clone(),
                    minutes,
                    priority: item.priority,
                    splittable: item.splittable,
                    min_block: item.min_block,
                    preferred_edge: item.preferred_edge,
                    earliest_start: item.earliest_start,
                }
            })
            .collect();
        let allocation = allocate(&free_slots, &resolved);

        // 7. Merge into the final timeline.
        let mut timeline = outcome.slots;
        timeline.extend(allocation.placed);
        timeline.sort_by(|a, b| (a.start, a.end).cmp(&(b.start, b.end)));

        DayPlan {
            timeline,
            all_day: normalized.all_day,
            free_slots,
            remaining_free: allocation.remaining,
            ratio_report,
            audit: outcome.audit,
            resolution_budget_exhausted: outcome.budget_exhausted,
            run_log,
        }
    }
}
