//! Property tests for the resolver, free-slot calculator, and allocator.

use proptest::prelude::*;

use dayweave_core::{
    allocate, compute_free_slots, resolve, ConflictRuleTable, FreeSlot, ResolvedRoutine,
    TimeOfDay, TimeSlot,
};

fn minutes(m: u16) -> TimeOfDay {
    TimeOfDay::from_minutes(m).unwrap()
}

fn window() -> (TimeOfDay, TimeOfDay) {
    (minutes(8 * 60), minutes(22 * 60))
}

fn delete_only_rules() -> ConflictRuleTable {
    ConflictRuleTable {
        source_priority: vec!["a".into(), "b".into(), "c".into()],
        ..Default::default()
    }
}

fn arb_slot() -> impl Strategy<Value = TimeSlot> {
    (
        0u16..1380,
        15u16..120,
        prop::sample::select(vec!["a", "b", "c"]),
    )
        .prop_map(|(start, duration, source)| {
            let end = (start + duration).min(1440);
            TimeSlot::confirmed("event", minutes(start), minutes(end), source)
        })
}

fn has_cross_source_overlap(slots: &[TimeSlot]) -> bool {
    for (i, a) in slots.iter().enumerate() {
        for b in &slots[i + 1..] {
            if a.source_id != b.source_id && a.overlaps(b) {
                return true;
            }
        }
    }
    false
}

proptest! {
    #[test]
    fn resolver_eliminates_cross_source_overlaps(
        slots in prop::collection::vec(arb_slot(), 0..12)
    ) {
        let outcome = resolve(slots, &delete_only_rules(), window());

        // Delete-only rules always converge within the budget.
        prop_assert!(!outcome.budget_exhausted);
        prop_assert!(!has_cross_source_overlap(&outcome.slots));
    }

    #[test]
    fn resolution_is_idempotent(
        slots in prop::collection::vec(arb_slot(), 0..12)
    ) {
        let first = resolve(slots, &delete_only_rules(), window());
        let second = resolve(first.slots.clone(), &delete_only_rules(), window());

        prop_assert!(second.audit.is_empty());
        prop_assert_eq!(second.slots.len(), first.slots.len());
    }

    #[test]
    fn free_slots_are_sorted_disjoint_and_clear_of_confirmed(
        slots in prop::collection::vec(arb_slot(), 0..12)
    ) {
        let (day_start, day_end) = window();
        let free = compute_free_slots(&slots, day_start, day_end, 30);

        for pair in free.windows(2) {
            prop_assert!(pair[0].end <= pair[1].start);
        }
        for f in &free {
            prop_assert!(f.start >= day_start && f.end <= day_end);
            prop_assert!(f.minutes() >= 30);
            for s in &slots {
                prop_assert!(
                    s.end <= f.start || s.start >= f.end,
                    "free slot {}-{} intersects confirmed {}-{}",
                    f.start, f.end, s.start, s.end
                );
            }
        }
    }

    #[test]
    fn allocation_conserves_free_minutes(
        slots in prop::collection::vec(arb_slot(), 0..8),
        fixed_minutes in 15u16..240,
        splittable_minutes in 15u16..240,
    ) {
        let (day_start, day_end) = window();
        let free = compute_free_slots(&slots, day_start, day_end, 30);

        let pool = vec![
            ResolvedRoutine {
                label: "fixed".into(),
                minutes: fixed_minutes,
                priority: 1,
                splittable: false,
                min_block: 15,
                preferred_edge: None,
                earliest_start: None,
            },
            ResolvedRoutine {
                label: "flex".into(),
                minutes: splittable_minutes,
                priority: 2,
                splittable: true,
                min_block: 15,
                preferred_edge: None,
                earliest_start: None,
            },
        ];

        let total = |f: &[FreeSlot]| -> u32 { f.iter().map(|x| x.minutes() as u32).sum() };
        let before = total(&free);

        let result = allocate(&free, &pool);
        let consumed: u32 = result.placed.iter().map(|s| s.duration_minutes() as u32).sum();

        prop_assert_eq!(before, total(&result.remaining) + consumed);

        // Placed routine slots never overlap each other or any confirmed slot.
        for (i, a) in result.placed.iter().enumerate() {
            for b in &result.placed[i + 1..] {
                prop_assert!(!a.overlaps(b));
            }
            for s in &slots {
                prop_assert!(!a.overlaps(s));
            }
        }
    }
}
