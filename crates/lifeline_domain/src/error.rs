use chrono::NaiveDate;
use thiserror::Error;

use crate::entry::EntryId;

/// Raised when a recurrence payload cannot be turned into a rule.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidRuleError {
    #[error("interval must be at least one day, got {0}")]
    NonPositiveInterval(i64),
    #[error("interval of {0} days is too long")]
    IntervalOutOfRange(i64),
    #[error("weekday index {0} is outside 0..=6")]
    WeekdayOutOfRange(i64),
    #[error("weekday set is empty")]
    EmptyWeekdays,
    #[error("times-per-day rule needs at least one time")]
    EmptyTimes,
    #[error("unparsable time of day `{0}`")]
    InvalidTime(String),
    #[error("unknown recurrence kind `{0}`")]
    UnknownKind(String),
    #[error("unknown interval unit `{0}`")]
    UnknownUnit(String),
    #[error("malformed recurrence payload: {0}")]
    Malformed(String),
}

/// A status write aimed at a date the entry does not occur on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{date} is not an occurrence of entry {entry_id}")]
pub struct InvalidOccurrenceError {
    pub entry_id: EntryId,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("unparsable time of day `{0}`")]
    InvalidTime(String),
    #[error("unparsable calendar date `{0}`")]
    InvalidDate(String),
    #[error("no entry with id {0}")]
    UnknownEntry(EntryId),
    #[error(transparent)]
    Rule(#[from] InvalidRuleError),
    #[error(transparent)]
    Occurrence(#[from] InvalidOccurrenceError),
}
