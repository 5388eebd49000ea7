//! Duplicate Collapser: removes local event-log slots that describe the
//! same real-world event as a higher-trust calendar-service slot.
//!
//! Runs before conflict resolution, because duplicates are two records of
//! the same event -- not a conflict between independent events -- and must
//! not both survive. Matching is intentionally permissive (normalized
//! substring either way, gated on time overlap); the matcher is a trait so
//! stricter matching can be substituted without touching the resolver.

use unicode_normalization::UnicodeNormalization;

use crate::model::TimeSlot;
use crate::normalize::EVENT_LOG_SOURCE_ID;
use crate::runlog::{RunLog, RunStage};

/// Decides whether two free-text titles refer to the same event.
pub trait TitleMatcher {
    fn matches(&self, a: &str, b: &str) -> bool;
}

/// Default matcher: NFKD-normalized, case/diacritics/spacing/bracket
/// insensitive substring match in either direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedSubstringMatcher;

impl NormalizedSubstringMatcher {
    /// Normalize a title for comparison.
    pub fn normalize_title(title: &str) -> String {
        const BRACKETS: &[char] = &[
            '(', ')', '[', ']', '{', '}', '<', '>', '【', '】', '（', '）', '「', '」', '『', '』',
            '《', '》', '"', '\'',
        ];
        title
            .nfkd()
            .filter(|c| !('\u{0300}'..='\u{036f}').contains(c)) // combining diacritics
            .flat_map(char::to_lowercase)
            .filter(|c| !c.is_whitespace() && !BRACKETS.contains(c))
            .collect()
    }
}

impl TitleMatcher for NormalizedSubstringMatcher {
    fn matches(&self, a: &str, b: &str) -> bool {
        let a = Self::normalize_title(a);
        let b = Self::normalize_title(b);
        if a.is_empty() || b.is_empty() {
            return false;
        }
        a.contains(&b) || b.contains(&a)
    }
}

/// Drop event-log slots that duplicate a calendar-service slot.
///
/// A local slot is a duplicate when some non-local slot overlaps it in
/// time and the matcher accepts the title pair. The calendar-service
/// version is authoritative and survives. Original ordering is preserved.
pub fn collapse_duplicates(
    slots: Vec<TimeSlot>,
    matcher: &dyn TitleMatcher,
    run_log: &mut RunLog,
) -> Vec<TimeSlot> {
    let service: Vec<TimeSlot> = slots
        .iter()
        .filter(|s| s.source_id.as_deref() != Some(EVENT_LOG_SOURCE_ID))
        .cloned()
        .collect();

    slots
        .into_iter()
        .filter(|slot| {
            if slot.source_id.as_deref() != Some(EVENT_LOG_SOURCE_ID) {
                return true;
            }
            let duplicate_of = service
                .iter()
                .find(|s| s.overlaps(slot) && matcher.matches(&s.label, &slot.label));
            match duplicate_of {
                Some(original) => {
                    run_log.record(
                        RunStage::Dedupe,
                        format!(
                            "collapsed event-log entry '{}' into '{}' from source '{}'",
                            slot.label,
                            original.label,
                            original.source_id.as_deref().unwrap_or("?"),
                        ),
                    );
                    false
                }
                None => true,
            }
        })
        .collect()
}
