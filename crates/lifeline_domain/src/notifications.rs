use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::entry::EntryId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReminderEvent {
    pub entry_id: EntryId,
    pub title: String,
    pub minutes_until: i64,
    pub starts_at: NaiveDateTime,
}

impl ReminderEvent {
    /// Toast-style text, e.g. `Reminder: time for Metformin` / `in 10 minutes.`
    pub fn headline(&self) -> String {
        format!("Reminder: time for {}", self.title)
    }

    pub fn body(&self) -> String {
        format!("in {} minutes.", self.minutes_until)
    }
}

/// Platform-specific notification adapters will implement this trait.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, event: &ReminderEvent);
    fn clear_for_entry(&self, entry_id: &EntryId);
}
