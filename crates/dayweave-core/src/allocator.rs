//! Routine Pool Allocator: packs the resolved routine pool into the free
//! intervals.
//!
//! Items are processed strictly in ascending priority order (declaration
//! order breaks ties); each item is carved out of an explicit arena of
//! free segments, so a later item only ever sees what earlier items left
//! behind. An unplaceable item is a normal outcome, not an error.

use serde::{Deserialize, Serialize};

use crate::model::{FreeSlot, PreferredEdge, TimeOfDay, TimeSlot};

/// A routine with its daily duration fully resolved (fixed items
/// unchanged; ratio items replaced by the balancer's minutes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedRoutine {
    pub label: String,
    pub minutes: u16,
    pub priority: u32,
    pub splittable: bool,
    pub min_block: u16,
    pub preferred_edge: Option<PreferredEdge>,
    pub earliest_start: Option<TimeOfDay>,
}

/// Allocator output: the placed routine slots and what remains free.
#[derive(Debug, Clone, Default)]
pub struct AllocationResult {
    pub placed: Vec<TimeSlot>,
    pub remaining: Vec<FreeSlot>,
}

/// Mutable arena of free segments, indexed and updated in place.
#[derive(Debug, Clone)]
struct FreeArena {
    segments: Vec<FreeSlot>,
}

impl FreeArena {
    fn new(free: &[FreeSlot]) -> Self {
        let mut segments: Vec<FreeSlot> = free.iter().copied().filter(|f| f.minutes() > 0).collect();
        segments.sort_by_key(|f| f.start);
        Self { segments }
    }

    /// Segment indices in allocation order for the given edge preference.
    fn ordered_indices(&self, edge: Option<PreferredEdge>) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.segments.len()).collect();
        if edge == Some(PreferredEdge::End) {
            indices.reverse();
        }
        indices
    }

    /// Carve `[start, end)` out of segment `index`, keeping any remainders.
    fn consume(&mut self, index: usize, start: TimeOfDay, end: TimeOfDay) {
        let segment = self.segments.remove(index);
        if segment.start < start {
            self.segments.push(FreeSlot::new(segment.start, start));
        }
        if end < segment.end {
            self.segments.push(FreeSlot::new(end, segment.end));
        }
        self.segments.sort_by_key(|f| f.start);
    }

    fn into_slots(self) -> Vec<FreeSlot> {
        self.segments
    }
}

/// Pack the routine pool into the free slots.
///
/// The returned routine slots never overlap each other or any confirmed
/// slot, since they are always carved from the free-slot arena.
pub fn allocate(free: &[FreeSlot], pool: &[ResolvedRoutine]) -> AllocationResult {
    let mut arena = FreeArena::new(free);
    let mut placed = Vec::new();

    // Stable sort: ties keep declaration order.
    let mut order: Vec<&ResolvedRoutine> = pool.iter().collect();
    order.sort_by_key(|item| item.priority);

    for item in order {
        if item.minutes == 0 {
            continue;
        }
        if item.splittable {
            allocate_splittable(&mut arena, item, &mut placed);
        } else {
            allocate_contiguous(&mut arena, item, &mut placed);
        }
    }

    AllocationResult {
        placed,
        remaining: arena.into_slots(),
    }
}

/// Eligible portion of a segment under the item's earliest-start floor.
/// An interval ending at or before the floor is skipped entirely; one
/// straddling it is clamped to start at the floor.
fn eligible_range(segment: &FreeSlot, item: &ResolvedRoutine) -> Option<(TimeOfDay, TimeOfDay)> {
    let floor = item.earliest_start.unwrap_or(TimeOfDay::MIDNIGHT);
    let start = segment.start.max(floor);
    if start >= segment.end {
        return None;
    }
    Some((start, segment.end))
}

fn place(
    item: &ResolvedRoutine,
    eligible: (TimeOfDay, TimeOfDay),
    take: u16,
) -> (TimeOfDay, TimeOfDay) {
    let (lo, hi) = eligible;
    match item.preferred_edge {
        Some(PreferredEdge::End) => {
            let start = TimeOfDay::from_minutes(hi.minutes() - take).unwrap_or(lo);
            (start, hi)
        }
        _ => {
            let end = lo.add_minutes(take).unwrap_or(hi);
            (lo, end)
        }
    }
}

fn allocate_splittable(arena: &mut FreeArena, item: &ResolvedRoutine, placed: &mut Vec<TimeSlot>) {
    let mut remaining = item.minutes;

    while remaining > 0 {
        let candidate = arena
            .ordered_indices(item.preferred_edge)
            .into_iter()
            .find_map(|idx| {
                let eligible = eligible_range(&arena.segments[idx], item)?;
                let available = eligible.0.minutes_until(eligible.1);
                let take = remaining.min(available);
                if take < item.min_block {
                    return None;
                }
                Some((idx, eligible, take))
            });

        let Some((idx, eligible, take)) = candidate else {
            break;
        };

        let (start, end) = place(item, eligible, take);
        placed.push(TimeSlot::routine(item.label.clone(), start, end));
        arena.consume(idx, start, end);
        remaining -= take;
    }

    if remaining > 0 && remaining < item.minutes {
        tracing::debug!(
            label = item.label.as_str(),
            remaining,
            "routine only partially placed"
        );
    } else if remaining == item.minutes {
        tracing::debug!(label = item.label.as_str(), "routine unplaceable today");
    }
}

fn allocate_contiguous(arena: &mut FreeArena, item: &ResolvedRoutine, placed: &mut Vec<TimeSlot>) {
    let candidate = arena
        .ordered_indices(item.preferred_edge)
        .into_iter()
        .find_map(|idx| {
            let eligible = eligible_range(&arena.segments[idx], item)?;
            let available = eligible.0.minutes_until(eligible.1);
            if available < item.minutes {
                return None;
            }
            Some((idx, eligible))
        });

    match candidate {
        Some((idx, eligible)) => {
            let (start, end) = place(item, eligible, item.minutes);
            placed.push(TimeSlot::routine(item.label.clone(), start, end));
            arena.consume(idx, start, end);
        }
        // No interval is large enough: silently skipped, simply
        // unplaceable today.
        None => tracing::debug!(label = item.label.as_str(), "routine unplaceable today"),
    }
}
