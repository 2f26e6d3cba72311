use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::entry::{Entry, EntryId, EntryStatus};
use crate::notifications::{NotificationSink, ReminderEvent};
use crate::timeline::project;

pub const DEFAULT_THRESHOLD_MINUTES: i64 = 15;

/// Source of "now" for reminder scans.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

/// Entries already reminded about on one calendar day.
///
/// The set belongs to a single day and is emptied as soon as a scan runs on a
/// different day, so recurring entries remind again after midnight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemindedSet {
    day: Option<NaiveDate>,
    entries: HashSet<EntryId>,
}

impl RemindedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn day(&self) -> Option<NaiveDate> {
        self.day
    }

    pub fn contains(&self, entry_id: &EntryId) -> bool {
        self.entries.contains(entry_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn rolled_to(mut self, day: NaiveDate) -> Self {
        if self.day != Some(day) {
            if !self.entries.is_empty() {
                debug!(previous = ?self.day, %day, "resetting reminded set for new day");
            }
            self.entries.clear();
            self.day = Some(day);
        }
        self
    }
}

/// [`scan_with_threshold`] with the default fifteen minute window.
pub fn scan_for_reminders(
    entries: &[Entry],
    now: NaiveDateTime,
    reminded: &RemindedSet,
) -> (Vec<ReminderEvent>, RemindedSet) {
    scan_with_threshold(entries, now, reminded, DEFAULT_THRESHOLD_MINUTES)
}

/// Finds today's pending medication and appointment occurrences starting
/// within `(0, threshold_minutes]` of `now` that have not been reminded yet.
pub fn scan_with_threshold(
    entries: &[Entry],
    now: NaiveDateTime,
    reminded: &RemindedSet,
    threshold_minutes: i64,
) -> (Vec<ReminderEvent>, RemindedSet) {
    let today = now.date();
    let mut reminded = reminded.clone().rolled_to(today);
    let mut events = Vec::new();

    for occurrence in project(entries, today) {
        let entry = &occurrence.entry;
        if !entry.kind.tracks_daily_status() || occurrence.resolved_status != EntryStatus::Upcoming {
            continue;
        }
        if reminded.contains(&entry.id) {
            continue;
        }

        let starts_at = today.and_time(occurrence.time);
        let minutes_until = (starts_at - now).num_minutes();
        if minutes_until > 0 && minutes_until <= threshold_minutes {
            events.push(ReminderEvent {
                entry_id: entry.id.clone(),
                title: entry.title.clone(),
                minutes_until,
                starts_at,
            });
            reminded.entries.insert(entry.id.clone());
        }
    }

    (events, reminded)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    Idle,
    Scanning,
}

/// Long-lived owner of the reminded set for timer-driven scans.
#[derive(Debug)]
pub struct ReminderScanner {
    threshold_minutes: i64,
    scanning: AtomicBool,
    reminded: Mutex<RemindedSet>,
}

/// Returns the scanner to idle when a sweep ends, including by unwinding.
struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for ReminderScanner {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_MINUTES)
    }
}

impl ReminderScanner {
    pub fn new(threshold_minutes: i64) -> Self {
        Self {
            threshold_minutes,
            scanning: AtomicBool::new(false),
            reminded: Mutex::new(RemindedSet::new()),
        }
    }

    pub fn threshold_minutes(&self) -> i64 {
        self.threshold_minutes
    }

    pub fn state(&self) -> ScannerState {
        if self.scanning.load(Ordering::Acquire) {
            ScannerState::Scanning
        } else {
            ScannerState::Idle
        }
    }

    pub fn reminded(&self) -> RemindedSet {
        self.reminded.lock().clone()
    }

    /// Runs one sweep and hands every event to `sink`.
    ///
    /// Returns `None` without scanning when another sweep is still in
    /// progress; overlapping ticks are dropped rather than queued.
    pub fn tick(
        &self,
        entries: &[Entry],
        now: NaiveDateTime,
        sink: Option<&dyn NotificationSink>,
    ) -> Option<Vec<ReminderEvent>> {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(%now, "reminder scan already running, skipping tick");
            return None;
        }
        let _guard = ScanGuard(&self.scanning);

        let events = {
            let mut reminded = self.reminded.lock();
            let (events, updated) = scan_with_threshold(entries, now, &reminded, self.threshold_minutes);
            *reminded = updated;
            events
        };

        for event in &events {
            info!(entry_id = %event.entry_id, minutes_until = event.minutes_until, "reminder due");
            if let Some(sink) = sink {
                sink.emit(event);
            }
        }
        Some(events)
    }
}
