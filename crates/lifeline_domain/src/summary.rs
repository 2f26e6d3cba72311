use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entry::{Entry, EntryId, EntryKind, EntryStatus};

const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MissedDose {
    pub entry_id: EntryId,
    pub title: String,
    pub date: NaiveDate,
    pub time: String,
}

/// Aggregate view over the whole entry collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub medications: usize,
    pub lab_results: usize,
    pub appointments: usize,
    pub generic: usize,
    pub medications_taken: usize,
    pub missed_medications: Vec<MissedDose>,
    pub recent: Vec<EntryId>,
}

impl Summary {
    /// Counts recorded medication outcomes per occurrence: the base status of
    /// one-off entries and every per-date override of recurring ones.
    /// `entries` is expected newest first, as the store keeps them.
    pub fn from_entries(entries: &[Entry]) -> Self {
        let mut summary = Self::default();

        for entry in entries {
            match entry.kind {
                EntryKind::Medication => summary.medications += 1,
                EntryKind::Lab => summary.lab_results += 1,
                EntryKind::Appointment => summary.appointments += 1,
                EntryKind::Generic => summary.generic += 1,
            }
            if entry.kind != EntryKind::Medication {
                continue;
            }
            for (date, status) in recorded_statuses(entry) {
                match status {
                    EntryStatus::Taken => summary.medications_taken += 1,
                    EntryStatus::Missed => summary.missed_medications.push(MissedDose {
                        entry_id: entry.id.clone(),
                        title: entry.title.clone(),
                        date,
                        time: entry.time.clone(),
                    }),
                    _ => {}
                }
            }
        }

        summary.recent = entries
            .iter()
            .take(RECENT_LIMIT)
            .map(|entry| entry.id.clone())
            .collect();
        summary
    }

    pub fn missed_count(&self) -> usize {
        self.missed_medications.len()
    }
}

fn recorded_statuses(entry: &Entry) -> Vec<(NaiveDate, EntryStatus)> {
    if !entry.is_recurring() {
        return vec![(entry.date, entry.status)];
    }
    entry
        .status_by_date
        .iter()
        .flatten()
        .map(|(date, status)| (*date, *status))
        .collect()
}
