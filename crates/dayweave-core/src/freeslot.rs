//! Free-Slot Calculator: subtracts the final confirmed slots from the
//! day's active-hours window.
//!
//! Walks a cursor from the window start, emitting a free slot for every
//! gap of at least the minimum threshold. Gaps below the threshold are
//! intentionally discarded -- they are not worth allocating against.
//! Output is sorted with no overlaps by construction.

use crate::model::{FreeSlot, TimeOfDay, TimeSlot};

/// Default minimum gap worth allocating against.
pub const DEFAULT_MIN_GAP_MINUTES: u16 = 30;

/// Compute the ordered free intervals within `[day_start, day_end)`.
pub fn compute_free_slots(
    confirmed: &[TimeSlot],
    day_start: TimeOfDay,
    day_end: TimeOfDay,
    min_gap_minutes: u16,
) -> Vec<FreeSlot> {
    let mut sorted: Vec<&TimeSlot> = confirmed.iter().collect();
    sorted.sort_by_key(|s| (s.start, s.end));

    let mut free = Vec::new();
    let mut cursor = day_start;

    for slot in sorted {
        // Ignore slots entirely outside the window or behind the cursor.
        if slot.end <= cursor {
            continue;
        }
        if slot.start >= day_end {
            break;
        }

        let clamped_start = slot.start.max(day_start);
        if cursor.minutes_until(clamped_start) >= min_gap_minutes {
            free.push(FreeSlot::new(cursor, clamped_start));
        }
        // The cursor never moves backward.
        cursor = cursor.max(slot.end.min(day_end));
    }

    if cursor.minutes_until(day_end) >= min_gap_minutes {
        free.push(FreeSlot::new(cursor, day_end));
    }

    free
}
