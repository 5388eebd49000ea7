//! End-to-end scenarios for the schedule synthesis pipeline.

use chrono::NaiveDateTime;

use dayweave_core::{
    CalendarEntry, ConflictAction, DayInput, EngineConfig, PreferredEdge, RoutinePoolItem,
    ScheduleEngine, SlotKind, TimeOfDay, TimeSlot, WeekHistory,
};

fn t(s: &str) -> TimeOfDay {
    s.parse().unwrap()
}

fn dt(time: &str) -> NaiveDateTime {
    format!("2026-08-20T{time}:00").parse().unwrap()
}

fn entry(title: &str, start: &str, end: &str, source: &str) -> CalendarEntry {
    CalendarEntry {
        title: title.to_string(),
        start: Some(dt(start)),
        end: Some(dt(end)),
        all_day: false,
        source_id: source.to_string(),
        completed: false,
        origin_ref: None,
    }
}

fn window_config(start: &str, end: &str) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.active_hours.start = t(start);
    config.active_hours.end = t(end);
    config
}

fn assert_no_timed_overlap(timeline: &[TimeSlot]) {
    for (i, a) in timeline.iter().enumerate() {
        for b in &timeline[i + 1..] {
            assert!(
                !a.overlaps(b),
                "'{}' ({}-{}) overlaps '{}' ({}-{})",
                a.label,
                a.start,
                a.end,
                b.label,
                b.start,
                b.end
            );
        }
    }
}

#[test]
fn overlapping_sources_resolve_to_single_winner_with_audit() {
    // Two confirmed entries overlap 09:30-10:00; source A outranks B and
    // B's default action is delete.
    let mut config = window_config("08:00", "22:00");
    config.conflict_rules.source_priority = vec!["source-a".into(), "source-b".into()];
    config
        .conflict_rules
        .default_actions
        .insert("source-b".into(), ConflictAction::Delete);

    let engine = ScheduleEngine::new(config).unwrap();
    let mut input = DayInput::new();
    input.calendar_entries = vec![
        entry("A standup", "09:00", "10:00", "source-a"),
        entry("B review", "09:30", "10:30", "source-b"),
    ];

    let plan = engine.plan(input);

    assert_eq!(plan.timeline.len(), 1);
    assert_eq!(plan.timeline[0].label, "A standup");
    assert_eq!(plan.timeline[0].start, t("09:00"));
    assert_eq!(plan.timeline[0].end, t("10:00"));

    assert_eq!(plan.audit.len(), 1);
    assert_eq!(plan.audit[0].loser_label, "B review");
    assert!(plan.audit[0].after.is_none());
}

#[test]
fn contiguous_routine_never_straddles_a_confirmed_slot() {
    // Active hours 08:00-22:00, one confirmed slot 12:00-13:00, and a
    // non-splittable 90-minute routine: it must land wholly before 12:00
    // or wholly after 13:00.
    let mut config = window_config("08:00", "22:00");
    config.routine_pool.push(RoutinePoolItem::fixed("deep work", 90));

    let engine = ScheduleEngine::new(config).unwrap();
    let mut input = DayInput::new();
    input.calendar_entries = vec![entry("Lunch", "12:00", "13:00", "cal")];

    let plan = engine.plan(input);

    let routine = plan
        .timeline
        .iter()
        .find(|s| s.kind == SlotKind::Routine)
        .expect("routine placed");
    assert_eq!(routine.duration_minutes(), 90);
    assert!(routine.end <= t("12:00") || routine.start >= t("13:00"));
    assert_no_timed_overlap(&plan.timeline);
}

#[test]
fn first_day_ratio_uses_declared_share_of_pool() {
    // 300-minute active window, no confirmed entries, ratio 0.2, zero
    // days elapsed: 60 minutes granted.
    let mut config = window_config("08:00", "13:00");
    config
        .routine_pool
        .push(RoutinePoolItem::ratio("reading", 0.2).with_min_block(15));

    let engine = ScheduleEngine::new(config).unwrap();
    let plan = engine.plan(DayInput::new());

    assert_eq!(plan.ratio_report.len(), 1);
    assert_eq!(plan.ratio_report[0].minutes, 60);
    let placed: u16 = plan
        .timeline
        .iter()
        .filter(|s| s.label == "reading")
        .map(|s| s.duration_minutes())
        .sum();
    assert_eq!(placed, 60);
}

#[test]
fn behind_target_routine_is_boosted_mid_week() {
    // "exercise" sits at 10% actual share against a 30% target with 3 of
    // 7 days elapsed: its adjusted ratio must exceed 0.30 and the report
    // must still sum to 1.0.
    let mut config = window_config("08:00", "22:00");
    config
        .routine_pool
        .push(RoutinePoolItem::ratio("exercise", 0.3).with_min_block(10));
    config
        .routine_pool
        .push(RoutinePoolItem::ratio("reading", 0.3).with_min_block(10));
    config
        .routine_pool
        .push(RoutinePoolItem::ratio("chores", 0.4).with_min_block(10));

    let mut history = WeekHistory::new();
    history.record("exercise", 60);
    history.record("reading", 300);
    history.record("chores", 240);

    let engine = ScheduleEngine::new(config).unwrap();
    let mut input = DayInput::new();
    input.week_history = history;
    input.days_elapsed = 3;

    let plan = engine.plan(input);

    let exercise = plan
        .ratio_report
        .iter()
        .find(|r| r.label == "exercise")
        .unwrap();
    assert!(exercise.adjusted_ratio > 0.30);
    assert!(plan.ratio_report.iter().all(|r| r.adjusted_ratio >= 0.05));

    let sum: f64 = plan.ratio_report.iter().map(|r| r.adjusted_ratio).sum();
    assert!((sum - 1.0).abs() < 1e-9);
}

#[test]
fn splittable_routine_split_honors_min_block() {
    // Free intervals of 50 and 80 minutes; a splittable 120-minute
    // routine with min_block 30 is placed as 50 + 70.
    let mut config = window_config("09:00", "12:10");
    config.routine_pool.push(
        RoutinePoolItem::fixed("study", 120)
            .with_splittable(true)
            .with_min_block(30),
    );

    let engine = ScheduleEngine::new(config).unwrap();
    let mut input = DayInput::new();
    // 09:50-10:50 is booked, leaving 09:00-09:50 (50) and 10:50-12:10 (80).
    input.calendar_entries = vec![entry("Meeting", "09:50", "10:50", "cal")];

    let plan = engine.plan(input);

    let fragments: Vec<u16> = plan
        .timeline
        .iter()
        .filter(|s| s.label == "study")
        .map(|s| s.duration_minutes())
        .collect();
    assert_eq!(fragments.iter().copied().sum::<u16>(), 120);
    assert!(fragments.iter().all(|&f| f >= 30));
    assert_no_timed_overlap(&plan.timeline);
}

#[test]
fn duplicate_event_log_entry_is_collapsed_before_resolution() {
    let mut config = window_config("08:00", "22:00");
    config.conflict_rules.source_priority = vec!["cal".into()];

    let engine = ScheduleEngine::new(config).unwrap();
    let mut input = DayInput::new().with_event_log_text(
        "- [ ] 10:00-10:45 team sync\n- [ ] 15:00-15:30 errand\n",
    );
    input.calendar_entries = vec![entry("Team Sync (weekly)", "10:00", "11:00", "cal")];

    let plan = engine.plan(input);

    // The log's "team sync" is a duplicate; the errand is not.
    let labels: Vec<&str> = plan.timeline.iter().map(|s| s.label.as_str()).collect();
    assert!(labels.contains(&"Team Sync (weekly)"));
    assert!(labels.contains(&"errand"));
    assert!(!labels.contains(&"team sync"));
    // Collapsing is not a conflict: no audit entry.
    assert!(plan.audit.is_empty());
}

#[test]
fn conservation_of_free_minutes_through_allocation() {
    let mut config = window_config("08:00", "22:00");
    config
        .routine_pool
        .push(RoutinePoolItem::fixed("exercise", 45).with_priority(1));
    config.routine_pool.push(
        RoutinePoolItem::ratio("reading", 0.5)
            .with_priority(2)
            .with_splittable(true)
            .with_min_block(20),
    );

    let engine = ScheduleEngine::new(config).unwrap();
    let mut input = DayInput::new();
    input.calendar_entries = vec![
        entry("Standup", "09:00", "09:45", "cal"),
        entry("Lunch", "12:30", "13:30", "cal"),
    ];

    let plan = engine.plan(input);

    let free_before: u32 = plan.free_slots.iter().map(|f| f.minutes() as u32).sum();
    let free_after: u32 = plan.remaining_free.iter().map(|f| f.minutes() as u32).sum();
    let consumed: u32 = plan
        .timeline
        .iter()
        .filter(|s| s.kind == SlotKind::Routine)
        .map(|s| s.duration_minutes() as u32)
        .sum();

    assert_eq!(free_before, free_after + consumed);
    assert_no_timed_overlap(&plan.timeline);
}

#[test]
fn lower_priority_routine_yields_under_scarcity() {
    // 2 hours of free time cannot hold 90 + 60 minutes; the priority-2
    // item is the one that loses out.
    let mut config = window_config("08:00", "10:00");
    config
        .routine_pool
        .push(RoutinePoolItem::fixed("secondary", 60).with_priority(2));
    config
        .routine_pool
        .push(RoutinePoolItem::fixed("primary", 90).with_priority(1));

    let engine = ScheduleEngine::new(config).unwrap();
    let plan = engine.plan(DayInput::new());

    let placed: Vec<&str> = plan.timeline.iter().map(|s| s.label.as_str()).collect();
    assert!(placed.contains(&"primary"));
    assert!(!placed.contains(&"secondary"));
}

#[test]
fn evening_routine_respects_earliest_start_and_edge() {
    let mut config = window_config("08:00", "22:00");
    config.routine_pool.push(
        RoutinePoolItem::fixed("journal", 30)
            .with_preferred_edge(PreferredEdge::End)
            .with_earliest_start(t("20:00")),
    );

    let engine = ScheduleEngine::new(config).unwrap();
    let plan = engine.plan(DayInput::new());

    let journal = plan
        .timeline
        .iter()
        .find(|s| s.label == "journal")
        .expect("placed");
    assert_eq!(journal.start, t("21:30"));
    assert_eq!(journal.end, t("22:00"));
}

#[test]
fn plan_serializes_to_json() {
    let mut config = window_config("08:00", "22:00");
    config.conflict_rules.source_priority = vec!["source-a".into(), "source-b".into()];
    config.routine_pool.push(RoutinePoolItem::ratio("reading", 0.2));

    let engine = ScheduleEngine::new(config).unwrap();
    let mut input = DayInput::new();
    input.calendar_entries = vec![
        entry("A standup", "09:00", "10:00", "source-a"),
        entry("B review", "09:30", "10:30", "source-b"),
    ];

    let plan = engine.plan(input);
    let json: serde_json::Value = serde_json::to_value(&plan).unwrap();

    assert_eq!(json["timeline"][0]["start"], "09:00");
    assert_eq!(json["timeline"][0]["kind"], "confirmed");
    assert_eq!(json["audit"][0]["loser_label"], "B review");
    assert!(json["ratio_report"][0]["minutes"].is_u64());
}

#[test]
fn all_day_items_never_enter_the_timeline() {
    let config = window_config("08:00", "22:00");
    let engine = ScheduleEngine::new(config).unwrap();

    let mut input = DayInput::new().with_event_log_text("- [ ] 終日 Trash day\n");
    input.calendar_entries = vec![CalendarEntry {
        title: "Conference".to_string(),
        start: None,
        end: None,
        all_day: true,
        source_id: "cal".to_string(),
        completed: false,
        origin_ref: None,
    }];

    let plan = engine.plan(input);

    assert!(plan.timeline.is_empty());
    assert_eq!(plan.all_day.len(), 2);
    assert_eq!(plan.free_slots.len(), 1);
}
