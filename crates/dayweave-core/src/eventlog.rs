//! Parser for the line-oriented local event-log format.
//!
//! One checklist line per entry, with indented continuation lines folded
//! into the previous entry's description:
//!
//! ```text
//! - [ ] 09:00-10:30 Reading club
//!     at the library
//! - [x] 13:00-13:45 Dentist
//! - [ ] 終日 Trash day
//! ```
//!
//! A malformed checklist line is dropped and reported as a parse issue;
//! it never aborts the batch.

use serde::{Deserialize, Serialize};

use crate::model::TimeOfDay;
use crate::sources::EventLogEntry;

/// Marker for all-day checklist entries.
pub const ALL_DAY_MARKER: &str = "終日";

/// A dropped line and the reason it could not be parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseIssue {
    pub line_number: usize,
    pub line: String,
    pub reason: String,
}

/// Parse event-log text into entries plus the issues for dropped lines.
///
/// Non-checklist top-level lines are ignored (the log format allows
/// headers and prose between entries).
pub fn parse_event_log(text: &str) -> (Vec<EventLogEntry>, Vec<ParseIssue>) {
    let mut entries: Vec<EventLogEntry> = Vec::new();
    let mut issues = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_number = idx + 1;
        if raw.trim().is_empty() {
            continue;
        }

        // Indented lines continue the previous entry's description.
        if raw.starts_with(' ') || raw.starts_with('\t') {
            if let Some(entry) = entries.last_mut() {
                let text = raw.trim();
                match &mut entry.description {
                    Some(desc) => {
                        desc.push('\n');
                        desc.push_str(text);
                    }
                    None => entry.description = Some(text.to_string()),
                }
            }
            continue;
        }

        let Some((completed, rest)) = parse_checkbox(raw) else {
            continue;
        };

        match parse_entry_body(rest, completed) {
            Ok(entry) => entries.push(entry),
            Err(reason) => issues.push(ParseIssue {
                line_number,
                line: raw.to_string(),
                reason,
            }),
        }
    }

    (entries, issues)
}

/// Strip the `- [ ] ` / `- [x] ` checkbox prefix; `None` for non-checklist lines.
fn parse_checkbox(line: &str) -> Option<(bool, &str)> {
    let rest = line.strip_prefix("- [")?;
    let (mark, rest) = rest.split_at(rest.char_indices().nth(1).map(|(i, _)| i)?);
    let rest = rest.strip_prefix("] ")?;
    match mark {
        " " => Some((false, rest)),
        "x" | "X" => Some((true, rest)),
        _ => None,
    }
}

fn parse_entry_body(body: &str, completed: bool) -> Result<EventLogEntry, String> {
    let body = body.trim();

    if let Some(title) = body.strip_prefix(ALL_DAY_MARKER) {
        let title = title.trim();
        if title.is_empty() {
            return Err("all-day entry has no title".into());
        }
        return Ok(EventLogEntry {
            title: title.to_string(),
            range: None,
            all_day: true,
            description: None,
            completed,
        });
    }

    let (token, title) = body
        .split_once(' ')
        .ok_or_else(|| "missing title after time range".to_string())?;
    let title = title.trim();
    if title.is_empty() {
        return Err("missing title after time range".into());
    }

    // Accept both ASCII hyphen and the wave dash commonly used in the logs.
    let normalized = token.replace('〜', "-").replace('~', "-");
    let (start_s, end_s) = normalized
        .split_once('-')
        .ok_or_else(|| format!("'{token}' is not a HH:MM-HH:MM range"))?;

    let start: TimeOfDay = start_s
        .parse()
        .map_err(|_| format!("invalid start time '{start_s}'"))?;
    let end: TimeOfDay = end_s
        .parse()
        .map_err(|_| format!("invalid end time '{end_s}'"))?;
    if end <= start {
        return Err(format!("end {end} is not after start {start}"));
    }

    Ok(EventLogEntry {
        title: title.to_string(),
        range: Some((start, end)),
        all_day: false,
        description: None,
        completed,
    })
}
