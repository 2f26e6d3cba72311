use chrono::{Datelike, NaiveDate};

use crate::entry::Entry;
use crate::recurrence::RecurrenceRule;

/// Whether `entry` has an occurrence on `candidate`.
///
/// The anchor date always matches, nothing before it ever does, and every
/// rule is evaluated relative to the entry's own anchor rather than a global
/// epoch.
pub fn matches(entry: &Entry, candidate: NaiveDate) -> bool {
    if candidate == entry.date {
        return true;
    }
    if candidate < entry.date {
        return false;
    }
    let Some(rule) = &entry.recurrence else {
        return false;
    };
    rule_matches(rule, entry.date, candidate)
}

fn rule_matches(rule: &RecurrenceRule, anchor: NaiveDate, candidate: NaiveDate) -> bool {
    let elapsed = (candidate - anchor).num_days();
    match rule {
        RecurrenceRule::Daily | RecurrenceRule::TimesPerDay(_) => true,
        RecurrenceRule::Weekly => elapsed % 7 == 0,
        RecurrenceRule::IntervalDays(days) => elapsed % i64::from(days.get()) == 0,
        RecurrenceRule::SpecificWeekdays(set) => set.contains(candidate.weekday()),
    }
}

/// Occurrence dates of `entry` within `from..=to`, ascending.
pub fn occurrence_dates(entry: &Entry, from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = NaiveDate> + '_ {
    let start = from.max(entry.date);
    start
        .iter_days()
        .take_while(move |date| *date <= to)
        .filter(move |date| matches(entry, *date))
}
