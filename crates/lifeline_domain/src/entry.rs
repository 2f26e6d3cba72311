use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EntryError;
use crate::recurrence::RecurrenceRule;

/// Opaque identifier assigned once at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Medication,
    Appointment,
    Lab,
    Generic,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Medication => "medication",
            Self::Appointment => "appointment",
            Self::Lab => "lab",
            Self::Generic => "generic",
        }
    }

    /// Medications and appointments carry a day-by-day taken/completed workflow.
    pub fn tracks_daily_status(&self) -> bool {
        matches!(self, Self::Medication | Self::Appointment)
    }

    /// Status written when the user ticks an occurrence off.
    pub fn completion_status(&self) -> EntryStatus {
        match self {
            Self::Medication => EntryStatus::Taken,
            _ => EntryStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Completed,
    #[default]
    Upcoming,
    Missed,
    Taken,
    Returned,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Upcoming => "upcoming",
            Self::Missed => "missed",
            Self::Taken => "taken",
            Self::Returned => "returned",
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed | Self::Taken)
    }
}

/// Type-specific fields carried through the engine untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntryDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_range: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: EntryId,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
    pub time: String,
    #[serde(default)]
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrenceRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_by_date: Option<BTreeMap<NaiveDate, EntryStatus>>,
    #[serde(flatten)]
    pub details: EntryDetails,
}

impl Entry {
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// Display time canonicalized to a wall-clock value.
    pub fn time_of_day(&self) -> Result<NaiveTime, EntryError> {
        parse_time_of_day(&self.time)
    }
}

/// An entry as authored, before the store assigns an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraft {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
    pub time: String,
    #[serde(default)]
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrenceRule>,
    #[serde(flatten)]
    pub details: EntryDetails,
}

impl EntryDraft {
    pub fn new(kind: EntryKind, title: impl Into<String>, date: NaiveDate, time: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            description: String::new(),
            date,
            time: time.into(),
            status: EntryStatus::default(),
            recurrence: None,
            details: EntryDetails::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_status(mut self, status: EntryStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_recurrence(mut self, rule: RecurrenceRule) -> Self {
        self.recurrence = Some(rule);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.details.provider = Some(provider.into());
        self
    }

    pub fn into_entry(self, id: EntryId) -> Entry {
        Entry {
            id,
            kind: self.kind,
            title: self.title,
            description: self.description,
            date: self.date,
            time: self.time,
            status: self.status,
            recurrence: self.recurrence,
            status_by_date: None,
            details: self.details,
        }
    }
}

/// Accepts the `08:00 AM` display format as well as 24-hour `HH:MM`.
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, EntryError> {
    let trimmed = raw.trim();
    ["%I:%M %p", "%I:%M%p", "%H:%M", "%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| EntryError::InvalidTime(raw.to_string()))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, EntryError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| EntryError::InvalidDate(raw.to_string()))
}

pub fn minutes_since_midnight(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_display_and_twenty_four_hour_times() {
        let evening = NaiveTime::from_hms_opt(18, 0, 0).unwrap();
        assert_eq!(parse_time_of_day("06:00 PM").unwrap(), evening);
        assert_eq!(parse_time_of_day("6:00 pm").unwrap(), evening);
        assert_eq!(parse_time_of_day("18:00").unwrap(), evening);
        assert_eq!(
            parse_time_of_day("12:15 AM").unwrap(),
            NaiveTime::from_hms_opt(0, 15, 0).unwrap()
        );
        assert_eq!(
            parse_time_of_day("12:15 PM").unwrap(),
            NaiveTime::from_hms_opt(12, 15, 0).unwrap()
        );
    }

    #[test]
    fn rejects_garbage_times() {
        assert!(matches!(
            parse_time_of_day("soon"),
            Err(EntryError::InvalidTime(raw)) if raw == "soon"
        ));
        assert!(parse_time_of_day("25:00").is_err());
    }

    #[test]
    fn minutes_since_midnight_orders_across_meridiem() {
        let morning = parse_time_of_day("11:59 AM").unwrap();
        let noon = parse_time_of_day("12:00 PM").unwrap();
        assert_eq!(minutes_since_midnight(morning), 719);
        assert_eq!(minutes_since_midnight(noon), 720);
    }

    #[test]
    fn entry_json_uses_original_field_names() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut entry = EntryDraft::new(EntryKind::Lab, "Glucose", date, "07:30 AM")
            .with_provider("City Hospital Lab")
            .into_entry(EntryId::from("lab-1"));
        entry.details.lab_value = Some("105".into());

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "lab");
        assert_eq!(value["date"], "2024-01-01");
        assert_eq!(value["status"], "upcoming");
        assert_eq!(value["provider"], "City Hospital Lab");
        assert_eq!(value["labValue"], "105");
        assert!(value.get("statusByDate").is_none());

        let back: Entry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn recurring_entry_round_trips_with_recorded_statuses() {
        let anchor = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let mut entry = EntryDraft::new(EntryKind::Medication, "Metformin 500mg", anchor, "06:00 PM")
            .with_provider("Dr. Smith (Endocrinologist)")
            .with_recurrence(RecurrenceRule::specific_weekdays([1, 3, 5]).unwrap())
            .into_entry(EntryId::from("metformin"));
        let mut overrides = BTreeMap::new();
        overrides.insert(NaiveDate::from_ymd_opt(2024, 2, 2).unwrap(), EntryStatus::Taken);
        overrides.insert(NaiveDate::from_ymd_opt(2024, 2, 5).unwrap(), EntryStatus::Missed);
        entry.status_by_date = Some(overrides);

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["recurrence"], r#"{"days":[1,3,5],"type":"weekdays"}"#);
        assert_eq!(value["statusByDate"]["2024-02-02"], "taken");
        assert_eq!(value["statusByDate"]["2024-02-05"], "missed");
        assert_eq!(value["provider"], "Dr. Smith (Endocrinologist)");

        let text = serde_json::to_string(&entry).unwrap();
        let back: Entry = serde_json::from_str(&text).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn completion_status_depends_on_kind() {
        assert_eq!(EntryKind::Medication.completion_status(), EntryStatus::Taken);
        assert_eq!(EntryKind::Appointment.completion_status(), EntryStatus::Completed);
        assert!(EntryStatus::Taken.is_complete());
        assert!(!EntryStatus::Missed.is_complete());
    }
}
