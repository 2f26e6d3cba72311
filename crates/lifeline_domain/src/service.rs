use std::collections::BTreeMap;

use anyhow::Result;
use chrono::NaiveDate;
use parking_lot::RwLock;
use tracing::{debug, instrument, warn};

use crate::{
    entry::{Entry, EntryDraft, EntryId, EntryStatus},
    error::EntryError,
    import::{self, ImportReport},
    ledger,
    notifications::{NotificationSink, ReminderEvent},
    reminders::{Clock, ReminderScanner, SystemClock, DEFAULT_THRESHOLD_MINUTES},
    summary::Summary,
    timeline::{self, Occurrence},
};

/// In-memory entry store with last-write-wins updates per id.
///
/// Every read hands out a snapshot; the engine functions never see the lock.
pub struct EntryService {
    entries: RwLock<Vec<Entry>>,
    clock: Box<dyn Clock>,
    scanner: ReminderScanner,
    notification_sink: Option<Box<dyn NotificationSink>>,
}

pub struct EntryServiceBuilder {
    seed: Vec<EntryDraft>,
    clock: Option<Box<dyn Clock>>,
    threshold_minutes: i64,
    notification_sink: Option<Box<dyn NotificationSink>>,
}

impl Default for EntryServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryServiceBuilder {
    pub fn new() -> Self {
        Self {
            seed: Vec::new(),
            clock: None,
            threshold_minutes: DEFAULT_THRESHOLD_MINUTES,
            notification_sink: None,
        }
    }

    pub fn add_entry(mut self, draft: EntryDraft) -> Self {
        self.seed.push(draft);
        self
    }

    pub fn add_entries(mut self, drafts: impl IntoIterator<Item = EntryDraft>) -> Self {
        self.seed.extend(drafts);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_reminder_threshold(mut self, minutes: i64) -> Self {
        self.threshold_minutes = minutes;
        self
    }

    pub fn with_notification_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.notification_sink = Some(sink);
        self
    }

    pub fn build(self) -> EntryService {
        let service = EntryService {
            entries: RwLock::new(Vec::new()),
            clock: self.clock.unwrap_or_else(|| Box::new(SystemClock)),
            scanner: ReminderScanner::new(self.threshold_minutes),
            notification_sink: self.notification_sink,
        };
        service.bulk_add(self.seed);
        service
    }
}

impl EntryService {
    pub fn builder() -> EntryServiceBuilder {
        EntryServiceBuilder::new()
    }

    /// Snapshot of every entry, newest first.
    pub fn entries(&self) -> Vec<Entry> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn get_entry(&self, id: &EntryId) -> Result<Entry, EntryError> {
        self.entries
            .read()
            .iter()
            .find(|entry| &entry.id == id)
            .cloned()
            .ok_or_else(|| EntryError::UnknownEntry(id.clone()))
    }

    #[instrument(skip(self, draft), fields(title = %draft.title))]
    pub fn add_entry(&self, draft: EntryDraft) -> EntryId {
        let id = EntryId::generate();
        let entry = draft.into_entry(id.clone());
        self.entries.write().insert(0, entry);
        debug!(entry_id = %id, "entry added");
        id
    }

    /// Adds a batch ahead of existing entries, keeping the batch's order.
    pub fn bulk_add(&self, drafts: impl IntoIterator<Item = EntryDraft>) -> Vec<EntryId> {
        let fresh: Vec<Entry> = drafts
            .into_iter()
            .map(|draft| draft.into_entry(EntryId::generate()))
            .collect();
        let ids = fresh.iter().map(|entry| entry.id.clone()).collect();
        let mut entries = self.entries.write();
        entries.splice(0..0, fresh);
        ids
    }

    /// Replaces an entry's authored fields wholesale, recurrence included.
    /// The id and the recorded per-date statuses are kept.
    #[instrument(skip(self, draft))]
    pub fn update_entry(&self, id: &EntryId, draft: EntryDraft) -> Result<Entry, EntryError> {
        let mut entries = self.entries.write();
        let slot = entries
            .iter_mut()
            .find(|entry| &entry.id == id)
            .ok_or_else(|| EntryError::UnknownEntry(id.clone()))?;
        let status_by_date = slot.status_by_date.take();
        let mut replacement = draft.into_entry(id.clone());
        replacement.status_by_date = status_by_date;
        *slot = replacement.clone();
        Ok(replacement)
    }

    #[instrument(skip(self))]
    pub fn remove_entry(&self, id: &EntryId) -> Result<Entry, EntryError> {
        let removed = {
            let mut entries = self.entries.write();
            let index = entries
                .iter()
                .position(|entry| &entry.id == id)
                .ok_or_else(|| EntryError::UnknownEntry(id.clone()))?;
            entries.remove(index)
        };
        if let Some(sink) = &self.notification_sink {
            sink.clear_for_entry(id);
        }
        Ok(removed)
    }

    pub fn clear_all(&self) {
        let removed = std::mem::take(&mut *self.entries.write());
        if let Some(sink) = &self.notification_sink {
            for entry in &removed {
                sink.clear_for_entry(&entry.id);
            }
        }
    }

    /// Records the status of one occurrence; refused for non-occurrence dates.
    #[instrument(skip(self))]
    pub fn set_status(&self, id: &EntryId, date: NaiveDate, status: EntryStatus) -> Result<Entry, EntryError> {
        let mut entries = self.entries.write();
        let slot = entries
            .iter_mut()
            .find(|entry| &entry.id == id)
            .ok_or_else(|| EntryError::UnknownEntry(id.clone()))?;
        let updated = ledger::record_status(slot, date, status).inspect_err(|err| {
            warn!(%err, "refusing status write");
        })?;
        *slot = updated.clone();
        Ok(updated)
    }

    /// Checkbox behaviour: complete a pending occurrence, reopen a completed one.
    pub fn toggle_completion(&self, id: &EntryId, date: NaiveDate) -> Result<Entry, EntryError> {
        let entry = self.get_entry(id)?;
        let next = if ledger::resolve_status(&entry, date).is_complete() {
            EntryStatus::Upcoming
        } else {
            entry.kind.completion_status()
        };
        self.set_status(id, date, next)
    }

    pub fn day(&self, date: NaiveDate) -> Vec<Occurrence> {
        timeline::project(&self.entries.read(), date)
    }

    pub fn today(&self) -> Vec<Occurrence> {
        self.day(self.clock.now().date())
    }

    pub fn span(&self, start: NaiveDate, days: u32) -> BTreeMap<NaiveDate, Vec<Occurrence>> {
        timeline::project_span(&self.entries.read(), start, days)
    }

    pub fn summary(&self) -> Summary {
        Summary::from_entries(&self.entries.read())
    }

    /// Imports every valid draft in `payload`, newest batch first.
    pub fn import_json(&self, payload: &str) -> Result<ImportReport> {
        let report = import::import_entries(payload)?;
        self.bulk_add(report.accepted.iter().cloned());
        Ok(report)
    }

    /// One reminder sweep at the clock's current time.
    pub fn run_reminder_tick(&self) -> Option<Vec<ReminderEvent>> {
        let snapshot = self.entries();
        let now = self.clock.now();
        self.scanner
            .tick(&snapshot, now, self.notification_sink.as_deref())
    }

    pub fn scanner(&self) -> &ReminderScanner {
        &self.scanner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryKind;
    use crate::recurrence::RecurrenceRule;
    use crate::reminders::FixedClock;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[derive(Default)]
    struct SharedSink {
        emitted: Arc<Mutex<Vec<ReminderEvent>>>,
        cleared: Arc<Mutex<Vec<EntryId>>>,
    }

    impl NotificationSink for SharedSink {
        fn emit(&self, event: &ReminderEvent) {
            self.emitted.lock().push(event.clone());
        }

        fn clear_for_entry(&self, entry_id: &EntryId) {
            self.cleared.lock().push(entry_id.clone());
        }
    }

    #[test]
    fn newest_entries_come_first() {
        let service = EntryService::builder().build();
        let first = service.add_entry(EntryDraft::new(EntryKind::Lab, "first", date(2024, 1, 1), "09:00"));
        let batch = service.bulk_add(vec![
            EntryDraft::new(EntryKind::Lab, "second", date(2024, 1, 1), "09:00"),
            EntryDraft::new(EntryKind::Lab, "third", date(2024, 1, 1), "09:00"),
        ]);
        let order: Vec<EntryId> = service.entries().into_iter().map(|entry| entry.id).collect();
        assert_eq!(order, vec![batch[0].clone(), batch[1].clone(), first]);
    }

    #[test]
    fn update_replaces_rule_and_keeps_recorded_statuses() {
        let service = EntryService::builder().build();
        let id = service.add_entry(
            EntryDraft::new(EntryKind::Medication, "Vitamin D", date(2024, 1, 1), "09:00")
                .with_recurrence(RecurrenceRule::Daily),
        );
        service.set_status(&id, date(2024, 1, 3), EntryStatus::Taken).unwrap();

        let updated = service
            .update_entry(
                &id,
                EntryDraft::new(EntryKind::Medication, "Vitamin D3", date(2024, 1, 1), "09:00")
                    .with_recurrence(RecurrenceRule::Weekly),
            )
            .unwrap();
        assert_eq!(updated.id, id);
        assert_eq!(updated.recurrence, Some(RecurrenceRule::Weekly));
        assert_eq!(
            updated.status_by_date.as_ref().and_then(|map| map.get(&date(2024, 1, 3))),
            Some(&EntryStatus::Taken)
        );
        assert!(service.day(date(2024, 1, 2)).is_empty());
    }

    #[test]
    fn rejected_status_write_leaves_store_untouched() {
        let service = EntryService::builder().build();
        let id = service.add_entry(
            EntryDraft::new(EntryKind::Medication, "Weekly", date(2024, 1, 1), "09:00")
                .with_recurrence(RecurrenceRule::Weekly),
        );
        let before = service.get_entry(&id).unwrap();
        let err = service.set_status(&id, date(2024, 1, 2), EntryStatus::Taken).unwrap_err();
        assert!(matches!(err, EntryError::Occurrence(_)));
        assert_eq!(service.get_entry(&id).unwrap(), before);

        let unknown = service.set_status(&EntryId::from("nope"), date(2024, 1, 1), EntryStatus::Taken);
        assert!(matches!(unknown, Err(EntryError::UnknownEntry(_))));
    }

    #[test]
    fn toggle_flips_between_pending_and_complete() {
        let service = EntryService::builder().build();
        let id = service.add_entry(
            EntryDraft::new(EntryKind::Appointment, "Physio", date(2024, 1, 1), "15:00")
                .with_recurrence(RecurrenceRule::Weekly),
        );
        let done = service.toggle_completion(&id, date(2024, 1, 8)).unwrap();
        assert_eq!(ledger::resolve_status(&done, date(2024, 1, 8)), EntryStatus::Completed);
        let reopened = service.toggle_completion(&id, date(2024, 1, 8)).unwrap();
        assert_eq!(ledger::resolve_status(&reopened, date(2024, 1, 8)), EntryStatus::Upcoming);
    }

    #[test]
    fn removing_an_entry_drops_its_occurrences_and_clears_notifications() {
        let sink = SharedSink::default();
        let cleared = Arc::clone(&sink.cleared);
        let service = EntryService::builder().with_notification_sink(Box::new(sink)).build();
        let id = service.add_entry(
            EntryDraft::new(EntryKind::Medication, "Daily", date(2024, 1, 1), "09:00")
                .with_recurrence(RecurrenceRule::Daily),
        );
        assert_eq!(service.span(date(2024, 1, 1), 10).len(), 10);

        service.remove_entry(&id).unwrap();
        assert!(service.span(date(2024, 1, 1), 10).is_empty());
        assert_eq!(*cleared.lock(), vec![id.clone()]);
        assert!(service.remove_entry(&id).is_err());
    }

    #[test]
    fn reminder_tick_uses_injected_clock() {
        let sink = SharedSink::default();
        let emitted = Arc::clone(&sink.emitted);
        let service = EntryService::builder()
            .with_clock(Box::new(FixedClock::new(date(2024, 6, 3).and_hms_opt(7, 50, 0).unwrap())))
            .with_notification_sink(Box::new(sink))
            .add_entry(EntryDraft::new(EntryKind::Medication, "Lisinopril", date(2024, 6, 3), "08:00 AM"))
            .build();

        assert_eq!(service.today().len(), 1);
        assert_eq!(service.run_reminder_tick().unwrap().len(), 1);
        assert!(service.run_reminder_tick().unwrap().is_empty());
        assert_eq!(emitted.lock()[0].title, "Lisinopril");

        let id = service.entries()[0].id.clone();
        assert!(service.scanner().reminded().contains(&id));
    }

    #[test]
    fn builder_threshold_reaches_the_scanner() {
        let service = EntryService::builder()
            .with_clock(Box::new(FixedClock::new(date(2024, 6, 3).and_hms_opt(7, 30, 0).unwrap())))
            .with_reminder_threshold(45)
            .add_entry(EntryDraft::new(EntryKind::Appointment, "Dentist", date(2024, 6, 3), "08:00 AM"))
            .build();

        assert_eq!(service.scanner().threshold_minutes(), 45);
        let events = service.run_reminder_tick().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].minutes_until, 30);
    }

    #[test]
    fn import_adds_only_valid_drafts() {
        let service = EntryService::builder().build();
        let report = service
            .import_json(
                r#"{"entries":[
                    {"type":"lab","title":"A1C","date":"2024-01-02","time":"10:00"},
                    {"type":"lab","title":"Broken","date":"yesterday","time":"10:00"}
                ]}"#,
            )
            .unwrap();
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(service.len(), 1);
        assert_eq!(service.summary().lab_results, 1);
    }
}
