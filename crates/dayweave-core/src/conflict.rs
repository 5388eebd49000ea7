//! Conflict Resolver: eliminates time overlaps between confirmed slots
//! from *different* sources using a rule table.
//!
//! Same-source overlaps are left untouched (treated as intentional). The
//! winner of a pair is decided by source priority rank; the loser's action
//! comes from the first matching override, else its source default, else
//! delete. Every resolution is recorded as an immutable audit record --
//! the audit trail is part of the output, because the user must be able to
//! see what was changed.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{TimeOfDay, TimeSlot};

/// Resolution applied to the lower-priority side of an overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictAction {
    Keep,
    Delete,
    Shift,
    Shrink,
}

impl ConflictAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::Delete => "delete",
            Self::Shift => "shift",
            Self::Shrink => "shrink",
        }
    }
}

/// Parameters for the forward-shift search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftParams {
    /// Maximum minutes the loser may move from its original start.
    #[serde(default = "default_max_shift")]
    pub max_shift_minutes: u16,
    /// Search increment.
    #[serde(default = "default_step")]
    pub step_minutes: u16,
    /// Allow placement past the active-hours end, up to 24:00.
    #[serde(default)]
    pub allow_exceed_active_hours: bool,
}

fn default_max_shift() -> u16 {
    180
}

fn default_step() -> u16 {
    5
}

impl Default for ShiftParams {
    fn default() -> Self {
        Self {
            max_shift_minutes: default_max_shift(),
            step_minutes: default_step(),
            allow_exceed_active_hours: false,
        }
    }
}

/// Parameters for shrinking the loser's overlapping portion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShrinkParams {
    /// Minimum duration the loser may be trimmed down to.
    #[serde(default = "default_min_shrink")]
    pub min_minutes: u16,
}

fn default_min_shrink() -> u16 {
    15
}

impl Default for ShrinkParams {
    fn default() -> Self {
        Self {
            min_minutes: default_min_shrink(),
        }
    }
}

/// Per-label / per-source override; first match wins over source defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideRule {
    /// Case-sensitive substring of the loser's label.
    #[serde(default)]
    pub label_contains: Option<String>,
    /// Exact loser source identifier.
    #[serde(default)]
    pub source_id: Option<String>,
    pub action: ConflictAction,
    #[serde(default)]
    pub shift: Option<ShiftParams>,
    #[serde(default)]
    pub shrink: Option<ShrinkParams>,
}

impl OverrideRule {
    fn matches(&self, slot: &TimeSlot) -> bool {
        if self.label_contains.is_none() && self.source_id.is_none() {
            return false;
        }
        if let Some(needle) = &self.label_contains {
            if !slot.label.contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(source) = &self.source_id {
            if slot.source_id.as_deref() != Some(source.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Process-wide conflict rule table, loaded once per run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictRuleTable {
    /// Total order over source identifiers; index = rank, lower = higher
    /// priority. Unranked sources beat ranked ones.
    #[serde(default)]
    pub source_priority: Vec<String>,
    /// Default action per loser source.
    #[serde(default)]
    pub default_actions: HashMap<String, ConflictAction>,
    /// Ordered override list; first match wins.
    #[serde(default, rename = "override")]
    pub overrides: Vec<OverrideRule>,
    /// Global shift parameters, unless an override supplies its own.
    #[serde(default)]
    pub shift: ShiftParams,
    /// Global shrink parameters, unless an override supplies its own.
    #[serde(default)]
    pub shrink: ShrinkParams,
}

impl ConflictRuleTable {
    /// Priority rank of a source; `None` for unranked sources.
    pub fn rank(&self, source_id: Option<&str>) -> Option<usize> {
        let source_id = source_id?;
        self.source_priority.iter().position(|s| s == source_id)
    }

    /// Action and parameters for a losing slot: first matching override,
    /// else the source default, else delete.
    pub fn action_for(&self, loser: &TimeSlot) -> (ConflictAction, ShiftParams, ShrinkParams) {
        if let Some(rule) = self.overrides.iter().find(|r| r.matches(loser)) {
            return (
                rule.action,
                rule.shift.unwrap_or(self.shift),
                rule.shrink.unwrap_or(self.shrink),
            );
        }
        let action = loser
            .source_id
            .as_deref()
            .and_then(|s| self.default_actions.get(s).copied())
            .unwrap_or(ConflictAction::Delete);
        (action, self.shift, self.shrink)
    }
}

/// Warning attached to a degraded resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionWarning {
    /// No shift position found; fell back to delete.
    ShiftFailed,
    /// Remainder after trimming would be below the minimum; deleted.
    ShrinkBelowMinimum,
    /// Keep-vs-keep with no room to shift; overlap left in place.
    OverlapTolerated,
}

/// Immutable record of one resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub loser_label: String,
    pub loser_source: Option<String>,
    pub winner_label: String,
    pub winner_source: Option<String>,
    /// Action requested by the rule table (the applied effect may have
    /// degraded; see `warning`).
    pub action: ConflictAction,
    pub before: (TimeOfDay, TimeOfDay),
    /// `None` means the loser was deleted.
    pub after: Option<(TimeOfDay, TimeOfDay)>,
    #[serde(default)]
    pub warning: Option<ResolutionWarning>,
}

/// Resolver output: the non-overlapping slots plus the audit trail.
#[derive(Debug, Clone, Default)]
pub struct ConflictOutcome {
    pub slots: Vec<TimeSlot>,
    pub audit: Vec<AuditRecord>,
    /// The iteration budget (2x slot count) ran out before convergence.
    /// A distinct warning category: the rule table likely cannot converge.
    pub budget_exhausted: bool,
}

/// Resolve all cross-source overlaps in `slots`.
///
/// Repeatedly scans the time-sorted list for the first overlapping pair
/// from different sources, resolves it, re-sorts, and repeats until no
/// such pair remains or the iteration budget is exhausted.
pub fn resolve(
    mut slots: Vec<TimeSlot>,
    rules: &ConflictRuleTable,
    active_hours: (TimeOfDay, TimeOfDay),
) -> ConflictOutcome {
    let budget = slots.len().saturating_mul(2);
    let mut audit = Vec::new();
    // Keep-vs-keep pairs left in place; skipped on later scans so the
    // loop terminates.
    let mut tolerated: HashSet<(String, String)> = HashSet::new();

    for _ in 0..budget {
        slots.sort_by(|a, b| (a.start, a.end).cmp(&(b.start, b.end)));
        let Some((wi, li)) = find_conflict(&slots, rules, &tolerated) else {
            return ConflictOutcome {
                slots,
                audit,
                budget_exhausted: false,
            };
        };

        let winner = slots[wi].clone();
        let loser = slots[li].clone();
        let (action, shift_params, shrink_params) = rules.action_for(&loser);
        let before = (loser.start, loser.end);

        let mut record = AuditRecord {
            loser_label: loser.label.clone(),
            loser_source: loser.source_id.clone(),
            winner_label: winner.label.clone(),
            winner_source: winner.source_id.clone(),
            action,
            before,
            after: None,
            warning: None,
        };

        match action {
            ConflictAction::Delete => {
                slots.remove(li);
            }
            ConflictAction::Shift => {
                let end_bound = if shift_params.allow_exceed_active_hours {
                    TimeOfDay::END_OF_DAY
                } else {
                    active_hours.1
                };
                match find_shift_position(&slots, &loser, winner.end, &shift_params, end_bound) {
                    Some((start, end)) => {
                        slots[li].start = start;
                        slots[li].end = end;
                        record.after = Some((start, end));
                    }
                    None => {
                        slots.remove(li);
                        record.warning = Some(ResolutionWarning::ShiftFailed);
                    }
                }
            }
            ConflictAction::Shrink => {
                match shrink_out_of(&loser, &winner, shrink_params.min_minutes) {
                    Some((start, end)) => {
                        slots[li].start = start;
                        slots[li].end = end;
                        record.after = Some((start, end));
                    }
                    None => {
                        slots.remove(li);
                        record.warning = Some(ResolutionWarning::ShrinkBelowMinimum);
                    }
                }
            }
            ConflictAction::Keep => {
                // Keep-vs-keep: try to move the loser, allowing placement
                // up to midnight; if that fails, tolerate the overlap
                // rather than destroying either slot.
                let params = ShiftParams {
                    allow_exceed_active_hours: true,
                    ..shift_params
                };
                match find_shift_position(&slots, &loser, winner.end, &params, TimeOfDay::END_OF_DAY)
                {
                    Some((start, end)) => {
                        slots[li].start = start;
                        slots[li].end = end;
                        record.after = Some((start, end));
                    }
                    None => {
                        tolerated.insert(pair_key(&winner.id, &loser.id));
                        record.after = Some(before);
                        record.warning = Some(ResolutionWarning::OverlapTolerated);
                    }
                }
            }
        }

        audit.push(record);
    }

    slots.sort_by(|a, b| (a.start, a.end).cmp(&(b.start, b.end)));
    let budget_exhausted = find_conflict(&slots, rules, &tolerated).is_some();
    if budget_exhausted {
        tracing::warn!(
            budget,
            "conflict resolution budget exhausted before convergence"
        );
    }
    ConflictOutcome {
        slots,
        audit,
        budget_exhausted,
    }
}

/// Destructive reconciliation variant used across source tables: only
/// delete-the-lower-priority-loser is applied, no shift/shrink.
pub fn reconcile_sources(
    mut slots: Vec<TimeSlot>,
    source_priority: &[String],
) -> (Vec<TimeSlot>, Vec<AuditRecord>) {
    let rules = ConflictRuleTable {
        source_priority: source_priority.to_vec(),
        ..Default::default()
    };
    let mut audit = Vec::new();

    loop {
        slots.sort_by(|a, b| (a.start, a.end).cmp(&(b.start, b.end)));
        let Some((wi, li)) = find_conflict(&slots, &rules, &HashSet::new()) else {
            return (slots, audit);
        };
        let winner = &slots[wi];
        let loser = &slots[li];
        audit.push(AuditRecord {
            loser_label: loser.label.clone(),
            loser_source: loser.source_id.clone(),
            winner_label: winner.label.clone(),
            winner_source: winner.source_id.clone(),
            action: ConflictAction::Delete,
            before: (loser.start, loser.end),
            after: None,
            warning: None,
        });
        slots.remove(li);
    }
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// First cross-source overlapping pair in the time-sorted list, as
/// (winner index, loser index).
fn find_conflict(
    slots: &[TimeSlot],
    rules: &ConflictRuleTable,
    tolerated: &HashSet<(String, String)>,
) -> Option<(usize, usize)> {
    for i in 0..slots.len() {
        for j in (i + 1)..slots.len() {
            if slots[j].start >= slots[i].end {
                break;
            }
            if slots[i].source_id == slots[j].source_id {
                continue;
            }
            if !slots[i].overlaps(&slots[j]) {
                continue;
            }
            if tolerated.contains(&pair_key(&slots[i].id, &slots[j].id)) {
                continue;
            }
            return Some(pick_winner(slots, rules, i, j));
        }
    }
    None
}

/// Decide the winner of an overlapping pair by source priority rank.
/// A slot with no ranked source always wins against one with a ranked
/// source; between two unranked sources the earlier start wins, ties
/// broken by longer duration.
fn pick_winner(
    slots: &[TimeSlot],
    rules: &ConflictRuleTable,
    i: usize,
    j: usize,
) -> (usize, usize) {
    let ri = rules.rank(slots[i].source_id.as_deref());
    let rj = rules.rank(slots[j].source_id.as_deref());
    match (ri, rj) {
        (None, Some(_)) => (i, j),
        (Some(_), None) => (j, i),
        (Some(a), Some(b)) => {
            if a <= b {
                (i, j)
            } else {
                (j, i)
            }
        }
        (None, None) => {
            // i starts no later than j (sorted scan); i wins unless they
            // start together and j runs longer.
            if slots[i].start == slots[j].start
                && slots[j].duration_minutes() > slots[i].duration_minutes()
            {
                (j, i)
            } else {
                (i, j)
            }
        }
    }
}

/// Search forward from `from` in `step` increments for the first position
/// where the loser's original duration fits without creating a new
/// overlap with anything else.
fn find_shift_position(
    slots: &[TimeSlot],
    loser: &TimeSlot,
    from: TimeOfDay,
    params: &ShiftParams,
    end_bound: TimeOfDay,
) -> Option<(TimeOfDay, TimeOfDay)> {
    let duration = loser.duration_minutes();
    let step = params.step_minutes.max(1);
    let max_start = loser
        .start
        .minutes()
        .saturating_add(params.max_shift_minutes);

    let mut pos = from.minutes();
    while pos <= max_start && pos as u32 + duration as u32 <= end_bound.minutes() as u32 {
        let start = TimeOfDay::from_minutes(pos)?;
        let end = TimeOfDay::from_minutes(pos + duration)?;
        let collides = slots
            .iter()
            .any(|other| other.id != loser.id && other.start < end && other.end > start);
        if !collides {
            return Some((start, end));
        }
        pos = pos.checked_add(step)?;
    }
    None
}

/// Trim only the overlapping portion of the loser, from whichever side
/// overlaps the winner. `None` if the remainder would fall below
/// `min_minutes`.
fn shrink_out_of(
    loser: &TimeSlot,
    winner: &TimeSlot,
    min_minutes: u16,
) -> Option<(TimeOfDay, TimeOfDay)> {
    let (start, end) = if loser.start >= winner.start {
        // Overlap at the loser's front: move its start to the winner's end.
        (winner.end, loser.end)
    } else {
        // Overlap at the loser's tail: pull its end back to the winner's start.
        (loser.start, winner.start)
    };
    if end <= start || start.minutes_until(end) < min_minutes {
        return None;
    }
    Some((start, end))
}
