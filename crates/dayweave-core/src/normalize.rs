//! Entry Normalizer: heterogeneous confirmed-entry sources into one
//! common time-slot representation.
//!
//! Calendar-service entries and local event-log entries both become
//! `TimeSlot { kind: Confirmed }`, tagged with their originating source.
//! All-day items are carried separately and never participate in
//! timeline placement. Malformed entries are dropped into the run-log,
//! never aborting the batch.

use crate::model::{AllDayItem, SlotKind, TimeOfDay, TimeSlot};
use crate::runlog::{RunLog, RunStage};
use crate::sources::{CalendarEntry, EventLogEntry};

/// Source identifier assigned to slots that came from the local event log.
pub const EVENT_LOG_SOURCE_ID: &str = "event-log";

/// Normalizer output: timed confirmed slots plus the all-day list.
#[derive(Debug, Clone, Default)]
pub struct NormalizedEntries {
    pub slots: Vec<TimeSlot>,
    pub all_day: Vec<AllDayItem>,
}

/// Normalize calendar-service and event-log entries for one day.
pub fn normalize(
    calendar: &[CalendarEntry],
    event_log: &[EventLogEntry],
    run_log: &mut RunLog,
) -> NormalizedEntries {
    let mut out = NormalizedEntries::default();

    for entry in calendar {
        normalize_calendar_entry(entry, &mut out, run_log);
    }
    for entry in event_log {
        normalize_log_entry(entry, &mut out, run_log);
    }

    out
}

fn normalize_calendar_entry(
    entry: &CalendarEntry,
    out: &mut NormalizedEntries,
    run_log: &mut RunLog,
) {
    if entry.title.trim().is_empty() {
        run_log.record(
            RunStage::Normalize,
            format!("dropped untitled entry from source '{}'", entry.source_id),
        );
        return;
    }

    // Entries with no end time become all-day items rather than
    // zero-duration slots.
    let (start_dt, end_dt) = match (entry.start, entry.end) {
        (Some(s), Some(e)) if !entry.all_day => (s, e),
        _ => {
            out.all_day.push(AllDayItem {
                label: entry.title.clone(),
                source_id: Some(entry.source_id.clone()),
                origin_ref: entry.origin_ref.clone(),
                completed: entry.completed,
            });
            return;
        }
    };

    let start = TimeOfDay::from(start_dt.time());
    // An entry running past its start date is clamped to end-of-day.
    let end = if end_dt.date() > start_dt.date() {
        TimeOfDay::END_OF_DAY
    } else {
        TimeOfDay::from(end_dt.time())
    };

    match TimeSlot::try_new(entry.title.clone(), SlotKind::Confirmed, start, end) {
        Ok(slot) => {
            let mut slot = slot.with_source(entry.source_id.clone()).with_completed(entry.completed);
            slot.origin_ref = entry.origin_ref.clone();
            out.slots.push(slot);
        }
        Err(_) => {
            run_log.record(
                RunStage::Normalize,
                format!(
                    "dropped '{}' from source '{}': end ({end}) is not after start ({start})",
                    entry.title, entry.source_id
                ),
            );
        }
    }
}

fn normalize_log_entry(entry: &EventLogEntry, out: &mut NormalizedEntries, run_log: &mut RunLog) {
    let (start, end) = match (entry.all_day, entry.range) {
        (false, Some(range)) => range,
        _ => {
            out.all_day.push(AllDayItem {
                label: entry.title.clone(),
                source_id: Some(EVENT_LOG_SOURCE_ID.to_string()),
                origin_ref: None,
                completed: entry.completed,
            });
            return;
        }
    };
    match TimeSlot::try_new(entry.title.clone(), SlotKind::Confirmed, start, end) {
        Ok(slot) => out.slots.push(
            slot.with_source(EVENT_LOG_SOURCE_ID)
                .with_completed(entry.completed),
        ),
        Err(_) => run_log.record(
            RunStage::Normalize,
            format!(
                "dropped event-log entry '{}': end ({end}) is not after start ({start})",
                entry.title
            ),
        ),
    }
}
