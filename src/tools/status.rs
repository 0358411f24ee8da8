//! Status tool and usage instructions

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::build_info::BuildInfo;
use crate::db::Database;
use crate::notify::MemoryNotifier;

/// Instructions returned by the reminder_instructions tool
pub const REMINDER_INSTRUCTIONS: &str = r#"MedAlerta reminder workflow:

1. Create a patient with add_patient (once per person).
2. add_medication with patient_id, name, dose and a reminder time.
   Times are flexible on input ("8:30", "08:30", "8:30 PM") and stored
   as 24-hour HH:MM. Saving schedules two daily alerts: the primary at
   the configured time and a follow-up 5 minutes later.
3. When an alert is acted on, call acknowledge_alert with the payload
   from the notification (medication_id, is_followup, notification_id)
   and the action identifier: "confirmar" logs a confirmed dose,
   "posponer" re-alerts once in 5 minutes, anything else counts as an
   implicit confirmation. Acting on a primary cancels its follow-up.
4. Editing a medication's time reschedules both alerts; deleting a
   medication cancels them. Use pending_alerts to inspect what is
   scheduled.
5. record_dose adds manual entries (e.g. caregiver corrections,
   status "missed"). dose_history and dose_stats read the log; the log
   itself is append-only.
6. Caregivers: add_caregiver + assign_patient, then caregiver_login
   for a session token used by caregiver_patients and
   patient_adherence. Sessions expire after 30 minutes."#;

/// Response for medalerta_status
#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub build: BuildInfo,
    pub database_path: PathBuf,
    pub patients: i64,
    pub medications: i64,
    pub dose_events: i64,
    pub caregivers: i64,
    pub pending_alerts: usize,
}

/// Collect service status: build info plus row counts and the pending
/// alert count from the in-process notifier.
pub fn service_status(
    db: &Database,
    notifier: &MemoryNotifier,
    database_path: &Path,
) -> Result<ServiceStatus, String> {
    let (patients, medications, dose_events, caregivers) = db
        .with_conn(|conn| {
            let count = |table: &str| -> crate::db::DbResult<i64> {
                Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?)
            };
            Ok((
                count("patients")?,
                count("medications")?,
                count("dose_log")?,
                count("caregivers")?,
            ))
        })
        .map_err(|e| e.to_string())?;

    Ok(ServiceStatus {
        build: BuildInfo::current(),
        database_path: database_path.to_path_buf(),
        patients,
        medications,
        dose_events,
        caregivers,
        pending_alerts: notifier.pending_count(),
    })
}
