//! Dose log tools
//!
//! Manual dose recording (caregiver corrections, simulations) and the
//! read-side history/statistics views.

use chrono::Utc;
use serde::Serialize;

use crate::db::Database;
use crate::models::{DoseEvent, DoseSource, DoseStats, DoseStatus};
use crate::remote::DoseLogSink;

/// Response for record_dose
#[derive(Debug, Serialize)]
pub struct RecordDoseResponse {
    pub id: i64,
    pub medication_id: i64,
    pub status: DoseStatus,
    pub source: DoseSource,
    pub logged_at: String,
    pub forwarded_to_remote: bool,
}

/// Response for dose_history
#[derive(Debug, Serialize)]
pub struct DoseHistoryResponse {
    pub events: Vec<DoseEvent>,
    pub total: usize,
}

/// Response for dose_stats
#[derive(Debug, Serialize)]
pub struct DoseStatsResponse {
    pub patient_id: i64,
    pub stats: DoseStats,
}

/// Append a dose event and forward it to the remote log. The append is
/// authoritative; a remote failure is logged and reported in the
/// response, never an error.
pub async fn record_dose(
    db: &Database,
    sink: &dyn DoseLogSink,
    medication_id: i64,
    status: DoseStatus,
    source: DoseSource,
    note: Option<String>,
) -> Result<RecordDoseResponse, String> {
    let event = db
        .with_conn(|conn| DoseEvent::append(conn, medication_id, status, source, note.as_deref()))
        .map_err(|e| e.to_string())?;

    let forwarded = match sink.log_dose(medication_id, status).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(medication_id, error = %e, "remote dose log failed");
            false
        }
    };

    Ok(RecordDoseResponse {
        id: event.id,
        medication_id: event.medication_id,
        status: event.status,
        source: event.source,
        logged_at: event.logged_at,
        forwarded_to_remote: forwarded,
    })
}

/// History for one medication, newest first
pub fn medication_history(db: &Database, medication_id: i64) -> Result<DoseHistoryResponse, String> {
    let events = db
        .with_conn(|conn| DoseEvent::list_for_medication(conn, medication_id))
        .map_err(|e| e.to_string())?;
    Ok(DoseHistoryResponse {
        total: events.len(),
        events,
    })
}

/// History across a patient's medications, newest first
pub fn patient_history(db: &Database, patient_id: i64) -> Result<DoseHistoryResponse, String> {
    let events = db
        .with_conn(|conn| DoseEvent::list_for_patient(conn, patient_id))
        .map_err(|e| e.to_string())?;
    Ok(DoseHistoryResponse {
        total: events.len(),
        events,
    })
}

/// Full-scan statistics for a patient
pub fn dose_stats(db: &Database, patient_id: i64) -> Result<DoseStatsResponse, String> {
    let events = db
        .with_conn(|conn| DoseEvent::list_for_patient(conn, patient_id))
        .map_err(|e| e.to_string())?;
    // Timestamps come from SQLite's datetime('now'), which is UTC
    let stats = DoseStats::compute(&events, Utc::now().naive_utc());
    Ok(DoseStatsResponse { patient_id, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::models::{Medication, MedicationCreate, Patient};
    use crate::remote::NullDoseLog;

    fn db_with_medication() -> (Database, i64, i64) {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| run_migrations(conn)).unwrap();
        let (patient_id, medication_id) = db
            .with_conn(|conn| {
                let patient = Patient::create(conn, "Ana", None)?;
                let med = Medication::create(
                    conn,
                    &MedicationCreate {
                        patient_id: patient.id,
                        name: "Ibuprofeno".into(),
                        dose: "400mg".into(),
                        scheduled_time: "08:00".into(),
                    },
                )?;
                Ok((patient.id, med.id))
            })
            .unwrap();
        (db, patient_id, medication_id)
    }

    #[tokio::test]
    async fn test_record_and_read_back() {
        let (db, patient_id, medication_id) = db_with_medication();

        let resp = record_dose(
            &db,
            &NullDoseLog,
            medication_id,
            DoseStatus::Missed,
            DoseSource::Caregiver,
            Some("slept through".into()),
        )
        .await
        .unwrap();
        assert!(resp.forwarded_to_remote);
        assert_eq!(resp.status, DoseStatus::Missed);

        let history = medication_history(&db, medication_id).unwrap();
        assert_eq!(history.total, 1);
        assert_eq!(history.events[0].note.as_deref(), Some("slept through"));

        let stats = dose_stats(&db, patient_id).unwrap();
        assert_eq!(stats.stats.total, 1);
        assert_eq!(stats.stats.missed, 1);
        assert_eq!(stats.stats.adherence_percent, Some(0.0));
    }

    #[tokio::test]
    async fn test_patient_history_spans_medications() {
        let (db, patient_id, medication_id) = db_with_medication();
        let second_med = db
            .with_conn(|conn| {
                Medication::create(
                    conn,
                    &MedicationCreate {
                        patient_id,
                        name: "Metformina".into(),
                        dose: "850mg".into(),
                        scheduled_time: "21:00".into(),
                    },
                )
            })
            .unwrap();

        for id in [medication_id, second_med.id] {
            record_dose(&db, &NullDoseLog, id, DoseStatus::Confirmed, DoseSource::Patient, None)
                .await
                .unwrap();
        }

        let history = patient_history(&db, patient_id).unwrap();
        assert_eq!(history.total, 2);
    }
}
