use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::entry::{parse_date, parse_time_of_day, EntryDetails, EntryDraft, EntryKind, EntryStatus};
use crate::error::EntryError;
use crate::recurrence::RecurrenceRule;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedDraft {
    pub index: usize,
    pub reason: String,
}

/// Outcome of an import: drafts ready for the store and the ones refused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub accepted: Vec<EntryDraft>,
    pub rejected: Vec<RejectedDraft>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDraft {
    #[serde(rename = "type")]
    kind: EntryKind,
    title: String,
    #[serde(default)]
    description: String,
    date: String,
    time: String,
    #[serde(default)]
    status: Option<EntryStatus>,
    #[serde(default)]
    recurrence: Option<Value>,
    #[serde(flatten)]
    details: EntryDetails,
}

impl RawDraft {
    fn validate(self) -> Result<EntryDraft, EntryError> {
        let date = parse_date(&self.date)?;
        parse_time_of_day(&self.time)?;
        let recurrence = match self.recurrence {
            None | Some(Value::Null) => None,
            Some(Value::String(payload)) => Some(RecurrenceRule::parse_payload(&payload)?),
            Some(record) => Some(RecurrenceRule::parse_payload(&record.to_string())?),
        };
        Ok(EntryDraft {
            kind: self.kind,
            title: self.title,
            description: self.description,
            date,
            time: self.time,
            status: self.status.unwrap_or_default(),
            recurrence,
            details: self.details,
        })
    }
}

/// Parses `{ "entries": [...] }` (or a bare array) of entry drafts.
///
/// A malformed document fails as a whole; a malformed draft is only
/// reported in [`ImportReport::rejected`].
pub fn import_entries(payload: &str) -> Result<ImportReport> {
    let document: Value = serde_json::from_str(payload).context("import payload is not valid JSON")?;
    let items = match document {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("entries") {
            Some(Value::Array(items)) => items,
            _ => bail!("import payload has no `entries` array"),
        },
        _ => bail!("import payload must be an object or an array"),
    };

    let mut report = ImportReport::default();
    for (index, item) in items.into_iter().enumerate() {
        let outcome = serde_json::from_value::<RawDraft>(item)
            .map_err(|err| err.to_string())
            .and_then(|raw| raw.validate().map_err(|err| err.to_string()));
        match outcome {
            Ok(draft) => report.accepted.push(draft),
            Err(reason) => {
                warn!(index, %reason, "skipping imported entry");
                report.rejected.push(RejectedDraft { index, reason });
            }
        }
    }

    info!(
        accepted = report.accepted.len(),
        rejected = report.rejected.len(),
        "parsed import payload"
    );
    Ok(report)
}

pub fn read_entries_file(path: impl AsRef<Path>) -> Result<ImportReport> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    import_entries(&raw).with_context(|| format!("importing {}", path.display()))
}
