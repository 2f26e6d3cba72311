use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use lifeline_domain::{
    import,
    notifications::{NotificationSink, ReminderEvent},
    reminders::DEFAULT_THRESHOLD_MINUTES,
    EntryDraft, EntryId, EntryKind, EntryService, EntryStatus,
};
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub(crate) reminder_threshold_minutes: i64,
    pub(crate) check_interval: Duration,
    pub(crate) import_path: Option<PathBuf>,
    pub(crate) agenda_span_days: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reminder_threshold_minutes: DEFAULT_THRESHOLD_MINUTES,
            check_interval: Duration::from_secs(60),
            import_path: None,
            agenda_span_days: 7,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_vars(|key| std::env::var(key).ok()))
    }

    pub(crate) fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = lookup("LIFELINE_REMINDER_THRESHOLD_MINUTES") {
            if let Ok(minutes) = value.trim().parse::<i64>() {
                if minutes > 0 {
                    config.reminder_threshold_minutes = minutes;
                }
            }
        }
        if let Some(value) = lookup("LIFELINE_CHECK_INTERVAL_SECS") {
            if let Ok(secs) = value.trim().parse::<u64>() {
                if secs > 0 {
                    config.check_interval = Duration::from_secs(secs);
                }
            }
        }
        if let Some(value) = lookup("LIFELINE_IMPORT_PATH") {
            if !value.trim().is_empty() {
                config.import_path = Some(PathBuf::from(value.trim()));
            }
        }
        if let Some(value) = lookup("LIFELINE_AGENDA_SPAN_DAYS") {
            if let Ok(days) = value.trim().parse::<u32>() {
                if days > 0 {
                    config.agenda_span_days = days;
                }
            }
        }
        config
    }
}

/// Delivers reminders to the log until a platform adapter exists.
struct LogSink;

impl NotificationSink for LogSink {
    fn emit(&self, event: &ReminderEvent) {
        info!(entry_id = %event.entry_id, "{} ({})", event.headline(), event.body());
    }

    fn clear_for_entry(&self, entry_id: &EntryId) {
        info!(%entry_id, "cleared pending reminders");
    }
}

/// Sample day shown on first launch.
pub fn demo_entries(today: NaiveDate) -> Vec<EntryDraft> {
    vec![
        EntryDraft::new(EntryKind::Medication, "Morning Medication - Lisinopril 10mg", today, "08:00 AM")
            .with_description("Blood pressure medication prescribed by Dr. Johnson")
            .with_status(EntryStatus::Taken)
            .with_provider("Dr. Johnson (Primary Care)"),
        EntryDraft::new(EntryKind::Medication, "Evening Medication - Metformin 500mg", today, "06:00 PM")
            .with_description("Diabetes medication prescribed by Dr. Smith")
            .with_status(EntryStatus::Missed)
            .with_provider("Dr. Smith (Endocrinologist)"),
        EntryDraft::new(EntryKind::Lab, "Returned Lab Result", today, "07:30 AM")
            .with_description("Fasting glucose: 105 mg/dL (normal range)")
            .with_status(EntryStatus::Returned)
            .with_provider("City Hospital Lab"),
        EntryDraft::new(EntryKind::Appointment, "Cardiology Follow-up", today, "10:00 AM")
            .with_description("Quarterly check-up with cardiologist")
            .with_provider("Dr. Williams (Cardiology)"),
    ]
}

pub(crate) fn build_service(config: &AppConfig) -> Result<EntryService> {
    let service = EntryService::builder()
        .with_reminder_threshold(config.reminder_threshold_minutes)
        .with_notification_sink(Box::new(LogSink))
        .build();

    match &config.import_path {
        Some(path) => {
            let report = import::read_entries_file(path)
                .with_context(|| format!("loading entries from {}", path.display()))?;
            for rejected in &report.rejected {
                warn!(index = rejected.index, reason = %rejected.reason, "entry not imported");
            }
            service.bulk_add(report.accepted);
        }
        None => {
            service.bulk_add(demo_entries(Local::now().date_naive()));
        }
    }
    Ok(service)
}

fn log_agenda(service: &EntryService, config: &AppConfig) {
    let start = Local::now().date_naive();
    for (date, rows) in service.span(start, config.agenda_span_days) {
        info!(%date, occurrences = rows.len(), "agenda day");
        for row in rows {
            info!(
                time = %row.time.format("%H:%M"),
                kind = row.entry.kind.as_str(),
                status = row.resolved_status.as_str(),
                "{}",
                row.entry.title
            );
        }
    }
    let summary = service.summary();
    info!(
        medications = summary.medications,
        taken = summary.medications_taken,
        missed = summary.missed_count(),
        labs = summary.lab_results,
        appointments = summary.appointments,
        "summary"
    );
}

pub fn run(config: AppConfig) -> Result<()> {
    info!(?config, "starting reminder loop");
    let service = build_service(&config)?;
    log_agenda(&service, &config);

    loop {
        if service.run_reminder_tick().is_none() {
            warn!("previous reminder scan still running");
        }
        thread::sleep(config.check_interval);
    }
}
