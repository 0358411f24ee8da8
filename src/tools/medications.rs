//! Medication tools
//!
//! Saving a medication and scheduling its alerts are one user action:
//! save persists first, then alerts are scheduled and the resulting
//! handles written back. An unparseable
//! reminder time blocks the save; a scheduling failure does not (the
//! medication is kept with null handles).

use serde::Serialize;

use crate::db::Database;
use crate::models::{Medication, MedicationCreate, MedicationUpdate};
use crate::notify::{ReminderScheduler, ScheduledAlerts};
use crate::schedule::parse_time_str;

/// Input for add_medication
#[derive(Debug, Clone)]
pub struct SaveMedicationData {
    pub patient_id: i64,
    pub name: String,
    pub dose: String,
    /// Flexible input: "8:30", "08:30", "8:30 PM"
    pub time: String,
}

/// Response for add/update_medication
#[derive(Debug, Serialize)]
pub struct SaveMedicationResponse {
    pub id: i64,
    pub patient_id: i64,
    pub name: String,
    pub dose: String,
    pub scheduled_time: String,
    pub primary_notification_id: Option<String>,
    pub followup_notification_id: Option<String>,
    pub alerts_scheduled: bool,
}

impl From<Medication> for SaveMedicationResponse {
    fn from(med: Medication) -> Self {
        let alerts_scheduled = med.primary_notification_id.is_some();
        Self {
            id: med.id,
            patient_id: med.patient_id,
            name: med.name,
            dose: med.dose,
            scheduled_time: med.scheduled_time,
            primary_notification_id: med.primary_notification_id,
            followup_notification_id: med.followup_notification_id,
            alerts_scheduled,
        }
    }
}

/// Medication summary for listing
#[derive(Debug, Serialize)]
pub struct MedicationSummary {
    pub id: i64,
    pub name: String,
    pub dose: String,
    pub scheduled_time: String,
    pub has_alerts: bool,
}

/// Response for list_medications
#[derive(Debug, Serialize)]
pub struct ListMedicationsResponse {
    pub patient_id: i64,
    pub medications: Vec<MedicationSummary>,
    pub total: usize,
}

/// Response for delete_medication
#[derive(Debug, Serialize)]
pub struct DeleteMedicationResponse {
    pub id: i64,
    pub deleted: bool,
    pub alerts_cancelled: usize,
}

/// Create a medication and schedule its alert pair
pub async fn add_medication(
    db: &Database,
    scheduler: &ReminderScheduler,
    data: SaveMedicationData,
) -> Result<SaveMedicationResponse, String> {
    // Invalid time blocks the save; nothing is scheduled
    let tod = parse_time_str(&data.time).map_err(|e| format!("Invalid reminder time: {}", e))?;

    let med = db
        .with_conn(|conn| {
            Medication::create(
                conn,
                &MedicationCreate {
                    patient_id: data.patient_id,
                    name: data.name.clone(),
                    dose: data.dose.clone(),
                    scheduled_time: tod.to_string(),
                },
            )
        })
        .map_err(|e| e.to_string())?;

    let alerts = schedule_or_warn(scheduler, &med).await;
    persist_alerts(db, med.id, &alerts)?;

    let med = fetch(db, med.id)?;
    Ok(med.into())
}

/// Get one medication with its handles
pub fn get_medication(db: &Database, id: i64) -> Result<Option<SaveMedicationResponse>, String> {
    let med = db
        .with_conn(|conn| Medication::get_by_id(conn, id))
        .map_err(|e| e.to_string())?;
    Ok(med.map(Into::into))
}

/// List a patient's medications, earliest reminder first
pub fn list_medications(db: &Database, patient_id: i64) -> Result<ListMedicationsResponse, String> {
    let meds = db
        .with_conn(|conn| Medication::list_for_patient(conn, patient_id))
        .map_err(|e| e.to_string())?;

    let medications: Vec<MedicationSummary> = meds
        .iter()
        .map(|m| MedicationSummary {
            id: m.id,
            name: m.name.clone(),
            dose: m.dose.clone(),
            scheduled_time: m.scheduled_time.clone(),
            has_alerts: m.primary_notification_id.is_some(),
        })
        .collect();

    Ok(ListMedicationsResponse {
        patient_id,
        total: medications.len(),
        medications,
    })
}

/// Update a medication and reschedule its alerts. The old handles are
/// cancelled before any new alert is issued, so there is never a window
/// with two live primaries.
pub async fn update_medication(
    db: &Database,
    scheduler: &ReminderScheduler,
    id: i64,
    name: Option<String>,
    dose: Option<String>,
    time: Option<String>,
) -> Result<SaveMedicationResponse, String> {
    let existing = fetch(db, id)?;

    let scheduled_time = match time {
        Some(raw) => Some(
            parse_time_str(&raw)
                .map_err(|e| format!("Invalid reminder time: {}", e))?
                .to_string(),
        ),
        None => None,
    };

    let med = db
        .with_conn(|conn| {
            Medication::update(
                conn,
                id,
                &MedicationUpdate {
                    name,
                    dose,
                    scheduled_time,
                },
            )
        })
        .map_err(|e| e.to_string())?;

    let alerts = match scheduler
        .reschedule_dose(
            &med,
            existing.primary_notification_id.as_deref(),
            existing.followup_notification_id.as_deref(),
        )
        .await
    {
        Ok(alerts) => alerts,
        Err(e) => {
            tracing::warn!(medication_id = id, error = %e, "rescheduling failed");
            ScheduledAlerts::none()
        }
    };
    persist_alerts(db, id, &alerts)?;

    let med = fetch(db, id)?;
    Ok(med.into())
}

/// Delete a medication together with both of its alerts. Cancellation
/// happens first; a deleted medication must never leave an orphaned
/// alert behind.
pub async fn delete_medication(
    db: &Database,
    scheduler: &ReminderScheduler,
    id: i64,
) -> Result<DeleteMedicationResponse, String> {
    let med = fetch(db, id)?;

    let alerts_cancelled = [&med.primary_notification_id, &med.followup_notification_id]
        .iter()
        .filter(|h| h.is_some())
        .count();
    scheduler
        .cancel_dose(
            med.primary_notification_id.as_deref(),
            med.followup_notification_id.as_deref(),
        )
        .await;

    let deleted = db
        .with_conn(|conn| Medication::delete(conn, id))
        .map_err(|e| e.to_string())?;

    Ok(DeleteMedicationResponse {
        id,
        deleted,
        alerts_cancelled,
    })
}

async fn schedule_or_warn(scheduler: &ReminderScheduler, med: &Medication) -> ScheduledAlerts {
    match scheduler.schedule_dose(med).await {
        Ok(alerts) => alerts,
        Err(e) => {
            tracing::warn!(medication_id = med.id, error = %e, "alert scheduling failed");
            ScheduledAlerts::none()
        }
    }
}

fn persist_alerts(db: &Database, id: i64, alerts: &ScheduledAlerts) -> Result<(), String> {
    db.with_conn(|conn| {
        Medication::set_notification_ids(
            conn,
            id,
            alerts.primary.as_deref(),
            alerts.followup.as_deref(),
        )
    })
    .map_err(|e| e.to_string())
}

fn fetch(db: &Database, id: i64) -> Result<Medication, String> {
    db.with_conn(|conn| Medication::get_by_id(conn, id))
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Medication not found: {}", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::models::Patient;
    use crate::notify::scheduler::tests::RecordingNotifier;
    use crate::notify::Trigger;
    use std::sync::Arc;

    struct Fixture {
        db: Database,
        notifier: Arc<RecordingNotifier>,
        scheduler: ReminderScheduler,
        patient_id: i64,
    }

    fn fixture() -> Fixture {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| run_migrations(conn)).unwrap();
        let patient_id = db
            .with_conn(|conn| Ok(Patient::create(conn, "Ana", None)?.id))
            .unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let scheduler = ReminderScheduler::new(notifier.clone());
        Fixture {
            db,
            notifier,
            scheduler,
            patient_id,
        }
    }

    fn save_data(fix: &Fixture, time: &str) -> SaveMedicationData {
        SaveMedicationData {
            patient_id: fix.patient_id,
            name: "Ibuprofeno".into(),
            dose: "400mg".into(),
            time: time.into(),
        }
    }

    #[tokio::test]
    async fn test_add_schedules_and_persists_handles() {
        let fix = fixture();
        let resp = add_medication(&fix.db, &fix.scheduler, save_data(&fix, "8:30 AM"))
            .await
            .unwrap();

        assert_eq!(resp.scheduled_time, "08:30");
        assert!(resp.alerts_scheduled);
        assert!(resp.primary_notification_id.is_some());
        assert!(resp.followup_notification_id.is_some());

        let requests = fix.notifier.scheduled_requests();
        assert_eq!(requests[0].trigger, Trigger::Daily { hour: 8, minute: 30 });
        assert_eq!(requests[1].trigger, Trigger::Daily { hour: 8, minute: 35 });
    }

    #[tokio::test]
    async fn test_invalid_time_blocks_save() {
        let fix = fixture();
        let err = add_medication(&fix.db, &fix.scheduler, save_data(&fix, "soon"))
            .await
            .unwrap_err();
        assert!(err.contains("Invalid reminder time"));

        // Nothing was persisted or scheduled
        let listed = list_medications(&fix.db, fix.patient_id).unwrap();
        assert_eq!(listed.total, 0);
        assert!(fix.notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_reschedules_with_new_time() {
        let fix = fixture();
        let saved = add_medication(&fix.db, &fix.scheduler, save_data(&fix, "08:00"))
            .await
            .unwrap();
        let old_primary = saved.primary_notification_id.clone().unwrap();

        let updated = update_medication(
            &fix.db,
            &fix.scheduler,
            saved.id,
            None,
            None,
            Some("9:15 PM".into()),
        )
        .await
        .unwrap();

        assert_eq!(updated.scheduled_time, "21:15");
        assert_ne!(updated.primary_notification_id.unwrap(), old_primary);

        // Latest two schedule calls carry the new time
        let requests = fix.notifier.scheduled_requests();
        let last = &requests[requests.len() - 2..];
        assert_eq!(last[0].trigger, Trigger::Daily { hour: 21, minute: 15 });
        assert_eq!(last[1].trigger, Trigger::Daily { hour: 21, minute: 20 });
    }

    #[tokio::test]
    async fn test_delete_cancels_both_alerts() {
        let fix = fixture();
        let saved = add_medication(&fix.db, &fix.scheduler, save_data(&fix, "08:00"))
            .await
            .unwrap();

        let resp = delete_medication(&fix.db, &fix.scheduler, saved.id)
            .await
            .unwrap();
        assert!(resp.deleted);
        assert_eq!(resp.alerts_cancelled, 2);
        assert!(get_medication(&fix.db, saved.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_with_null_handles_is_clean() {
        let fix = fixture();
        // Permission denied: saved with null handles
        let notifier = Arc::new(RecordingNotifier::denying_permission());
        let scheduler = ReminderScheduler::new(notifier.clone());
        let saved = add_medication(&fix.db, &scheduler, save_data(&fix, "08:00"))
            .await
            .unwrap();
        assert!(!saved.alerts_scheduled);

        let resp = delete_medication(&fix.db, &scheduler, saved.id).await.unwrap();
        assert!(resp.deleted);
        assert_eq!(resp.alerts_cancelled, 0);
        assert!(notifier.calls().is_empty());
    }
}
