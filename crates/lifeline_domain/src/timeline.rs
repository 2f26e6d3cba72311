use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::entry::{minutes_since_midnight, Entry, EntryStatus};
use crate::ledger::resolve_status;
use crate::matcher::matches;

/// One row of a day's timeline: a base entry on a concrete date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub entry: Entry,
    pub occurrence_date: NaiveDate,
    pub resolved_status: EntryStatus,
    /// Canonical start time; for times-per-day rules this is the listed time.
    pub time: NaiveTime,
}

impl Occurrence {
    pub fn minutes_since_midnight(&self) -> u32 {
        minutes_since_midnight(self.time)
    }
}

/// Builds the ordered timeline for `date`.
///
/// Entries whose time cannot be read are left out with a warning so one bad
/// record never hides the rest of the day. Rows are ordered by time of day;
/// rows sharing a time keep their input order.
pub fn project(entries: &[Entry], date: NaiveDate) -> Vec<Occurrence> {
    let mut rows = Vec::new();

    for entry in entries.iter().filter(|entry| matches(entry, date)) {
        let status = resolve_status(entry, date);

        if let Some(times) = entry.recurrence.as_ref().and_then(|rule| rule.daily_times()) {
            rows.extend(times.iter().map(|time| Occurrence {
                entry: entry.clone(),
                occurrence_date: date,
                resolved_status: status,
                time: *time,
            }));
            continue;
        }

        match entry.time_of_day() {
            Ok(time) => rows.push(Occurrence {
                entry: entry.clone(),
                occurrence_date: date,
                resolved_status: status,
                time,
            }),
            Err(err) => {
                warn!(entry_id = %entry.id, %err, "skipping entry with unreadable time");
            }
        }
    }

    rows.sort_by_key(Occurrence::minutes_since_midnight);
    debug!(%date, occurrences = rows.len(), "projected timeline");
    rows
}

/// Timelines for `days` consecutive dates starting at `start`; empty days are omitted.
pub fn project_span(entries: &[Entry], start: NaiveDate, days: u32) -> BTreeMap<NaiveDate, Vec<Occurrence>> {
    (0..i64::from(days))
        .filter_map(|offset| start.checked_add_signed(Duration::days(offset)))
        .map(|date| (date, project(entries, date)))
        .filter(|(_, rows)| !rows.is_empty())
        .collect()
}
