use chrono::NaiveDate;

use crate::entry::{Entry, EntryStatus};
use crate::error::InvalidOccurrenceError;
use crate::matcher::matches;

/// Status that applies to the occurrence of `entry` on `date`.
///
/// Callers are expected to have confirmed the occurrence with
/// [`matches`] first; for one-off entries the base status is returned as is.
pub fn resolve_status(entry: &Entry, date: NaiveDate) -> EntryStatus {
    if !entry.is_recurring() {
        return entry.status;
    }
    entry
        .status_by_date
        .as_ref()
        .and_then(|overrides| overrides.get(&date))
        .copied()
        .unwrap_or_else(|| default_status(entry))
}

/// Pending status for a recurring occurrence nobody has acted on yet.
pub fn default_status(entry: &Entry) -> EntryStatus {
    if entry.kind.tracks_daily_status() {
        EntryStatus::Upcoming
    } else {
        entry.status
    }
}

/// Returns a copy of `entry` with the status of one occurrence replaced.
///
/// Recurring entries get a single `status_by_date` key written; one-off
/// entries get their base status replaced. Dates that are not occurrences are
/// refused without touching anything.
pub fn record_status(
    entry: &Entry,
    date: NaiveDate,
    status: EntryStatus,
) -> Result<Entry, InvalidOccurrenceError> {
    if !matches(entry, date) {
        return Err(InvalidOccurrenceError {
            entry_id: entry.id.clone(),
            date,
        });
    }

    let mut updated = entry.clone();
    if updated.is_recurring() {
        updated
            .status_by_date
            .get_or_insert_with(Default::default)
            .insert(date, status);
    } else {
        updated.status = status;
    }
    Ok(updated)
}
