pub mod entry;
pub mod error;
pub mod import;
pub mod ledger;
pub mod matcher;
pub mod notifications;
pub mod recurrence;
pub mod reminders;
pub mod service;
pub mod summary;
pub mod timeline;

pub use crate::entry::{Entry, EntryDraft, EntryId, EntryKind, EntryStatus};
pub use crate::error::{EntryError, InvalidOccurrenceError, InvalidRuleError};
pub use crate::ledger::{record_status, resolve_status};
pub use crate::matcher::matches;
pub use crate::recurrence::RecurrenceRule;
pub use crate::reminders::{scan_for_reminders, RemindedSet, ReminderScanner};
pub use crate::service::{EntryService, EntryServiceBuilder};
pub use crate::timeline::{project, Occurrence};
