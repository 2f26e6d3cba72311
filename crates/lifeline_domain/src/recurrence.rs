use std::fmt;
use std::num::NonZeroU32;

use chrono::{NaiveTime, Weekday};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::entry::parse_time_of_day;
use crate::error::InvalidRuleError;

/// How a base entry repeats after its anchor date.
///
/// Rules round-trip through a storage payload: `daily` and `weekly` are bare
/// keywords, every other shape is a JSON record discriminated by `type`.
/// Construction normalizes the shape so equal rules always produce the same
/// payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecurrenceRule {
    Daily,
    Weekly,
    IntervalDays(NonZeroU32),
    SpecificWeekdays(WeekdaySet),
    TimesPerDay(DailyTimes),
}

/// Weekdays indexed 0 (Sunday) through 6 (Saturday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    const ALL: u8 = 0b0111_1111;

    pub fn from_indices<I>(days: I) -> Result<Self, InvalidRuleError>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut mask = 0u8;
        for day in days {
            if !(0..=6).contains(&day) {
                return Err(InvalidRuleError::WeekdayOutOfRange(day));
            }
            mask |= 1 << day;
        }
        if mask == 0 {
            return Err(InvalidRuleError::EmptyWeekdays);
        }
        Ok(Self(mask))
    }

    pub fn is_every_day(&self) -> bool {
        self.0 == Self::ALL
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        self.0 & (1 << weekday.num_days_from_sunday()) != 0
    }

    pub fn indices(&self) -> impl Iterator<Item = u8> + '_ {
        (0u8..7).filter(move |day| self.0 & (1 << *day) != 0)
    }
}

/// Sorted, de-duplicated times of day shared by one occurrence date.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DailyTimes(Vec<NaiveTime>);

impl DailyTimes {
    pub fn new(mut times: Vec<NaiveTime>) -> Result<Self, InvalidRuleError> {
        if times.is_empty() {
            return Err(InvalidRuleError::EmptyTimes);
        }
        times.sort();
        times.dedup();
        Ok(Self(times))
    }

    pub fn parse<'a, I>(raw: I) -> Result<Self, InvalidRuleError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let times = raw
            .into_iter()
            .map(|value| {
                parse_time_of_day(value).map_err(|_| InvalidRuleError::InvalidTime(value.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(times)
    }

    pub fn as_slice(&self) -> &[NaiveTime] {
        &self.0
    }
}

impl RecurrenceRule {
    /// Every `days` days from the anchor. One and seven collapse to
    /// [`Self::Daily`] and [`Self::Weekly`], which match the same dates.
    pub fn interval_days(days: i64) -> Result<Self, InvalidRuleError> {
        if days <= 0 {
            return Err(InvalidRuleError::NonPositiveInterval(days));
        }
        let days = u32::try_from(days)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or(InvalidRuleError::IntervalOutOfRange(days))?;
        Ok(Self::IntervalDays(days).canonical())
    }

    /// Occurs on the listed weekdays; all seven collapse to [`Self::Daily`].
    pub fn specific_weekdays<I>(days: I) -> Result<Self, InvalidRuleError>
    where
        I: IntoIterator<Item = i64>,
    {
        WeekdaySet::from_indices(days).map(|set| Self::SpecificWeekdays(set).canonical())
    }

    /// The simplest rule matching exactly the same dates as `self`.
    pub fn canonical(self) -> Self {
        match self {
            Self::IntervalDays(days) if days.get() == 1 => Self::Daily,
            Self::IntervalDays(days) if days.get() == 7 => Self::Weekly,
            Self::SpecificWeekdays(set) if set.is_every_day() => Self::Daily,
            other => other,
        }
    }

    pub fn times_per_day<'a, I>(times: I) -> Result<Self, InvalidRuleError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        DailyTimes::parse(times).map(Self::TimesPerDay)
    }

    /// Extra times of day the rule expands an occurrence into, if any.
    pub fn daily_times(&self) -> Option<&[NaiveTime]> {
        match self {
            Self::TimesPerDay(times) => Some(times.as_slice()),
            _ => None,
        }
    }

    pub fn parse_payload(payload: &str) -> Result<Self, InvalidRuleError> {
        let trimmed = payload.trim();
        if trimmed.eq_ignore_ascii_case("daily") {
            return Ok(Self::Daily);
        }
        if trimmed.eq_ignore_ascii_case("weekly") {
            return Ok(Self::Weekly);
        }
        if !trimmed.starts_with('{') {
            return Err(InvalidRuleError::UnknownKind(trimmed.to_string()));
        }
        let value: Value = serde_json::from_str(trimmed)
            .map_err(|err| InvalidRuleError::Malformed(err.to_string()))?;
        Self::from_record(&value)
    }

    fn from_record(value: &Value) -> Result<Self, InvalidRuleError> {
        let record = value
            .as_object()
            .ok_or_else(|| InvalidRuleError::Malformed("expected an object".into()))?;
        let kind = record
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| InvalidRuleError::Malformed("missing `type` discriminator".into()))?;

        match kind {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "interval" => {
                let amount = record
                    .get("value")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| InvalidRuleError::Malformed("interval needs an integer `value`".into()))?;
                let unit = record.get("unit").and_then(Value::as_str).unwrap_or("days");
                let multiplier = match unit.to_ascii_lowercase().as_str() {
                    "day" | "days" => 1,
                    "week" | "weeks" => 7,
                    _ => return Err(InvalidRuleError::UnknownUnit(unit.to_string())),
                };
                Self::interval_days(amount.saturating_mul(multiplier))
            }
            "weekdays" => {
                let days = record
                    .get("days")
                    .and_then(Value::as_array)
                    .ok_or_else(|| InvalidRuleError::Malformed("weekdays needs a `days` array".into()))?;
                let indices = days
                    .iter()
                    .map(|day| {
                        day.as_i64()
                            .ok_or_else(|| InvalidRuleError::Malformed(format!("weekday `{day}` is not an integer")))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Self::specific_weekdays(indices)
            }
            "times_per_day" => {
                let times = record
                    .get("times")
                    .and_then(Value::as_array)
                    .ok_or_else(|| InvalidRuleError::Malformed("times_per_day needs a `times` array".into()))?;
                let raw = times
                    .iter()
                    .map(|time| {
                        time.as_str()
                            .ok_or_else(|| InvalidRuleError::InvalidTime(time.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Self::times_per_day(raw)
            }
            other => Err(InvalidRuleError::UnknownKind(other.to_string())),
        }
    }

    /// Canonical storage form of the rule.
    pub fn to_payload(&self) -> String {
        match self.clone().canonical() {
            Self::Daily => "daily".to_string(),
            Self::Weekly => "weekly".to_string(),
            Self::IntervalDays(days) => {
                json!({ "type": "interval", "value": days.get(), "unit": "days" }).to_string()
            }
            Self::SpecificWeekdays(set) => {
                let days: Vec<u8> = set.indices().collect();
                json!({ "type": "weekdays", "days": days }).to_string()
            }
            Self::TimesPerDay(times) => {
                let times: Vec<String> = times
                    .as_slice()
                    .iter()
                    .map(|time| time.format("%H:%M").to_string())
                    .collect();
                json!({ "type": "times_per_day", "times": times }).to_string()
            }
        }
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
        match self {
            Self::Daily => f.write_str("daily"),
            Self::Weekly => f.write_str("weekly"),
            Self::IntervalDays(days) => write!(f, "every {days} days"),
            Self::SpecificWeekdays(set) => {
                let names: Vec<&str> = set.indices().map(|day| NAMES[day as usize]).collect();
                write!(f, "on {}", names.join(", "))
            }
            Self::TimesPerDay(times) => {
                let times: Vec<String> = times
                    .as_slice()
                    .iter()
                    .map(|time| time.format("%H:%M").to_string())
                    .collect();
                write!(f, "daily at {}", times.join(", "))
            }
        }
    }
}

impl Serialize for RecurrenceRule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_payload())
    }
}

impl<'de> Deserialize<'de> for RecurrenceRule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let payload = String::deserialize(deserializer)?;
        Self::parse_payload(&payload).map_err(de::Error::custom)
    }
}
