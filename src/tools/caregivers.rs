//! Caregiver tools
//!
//! Caregiver accounts, login, and the token-gated adherence views.
//! Tokens come from the session store; every read re-validates the
//! token and the caregiver-patient assignment.

use chrono::{Duration, Utc};
use serde::Serialize;

use crate::db::Database;
use crate::models::{Caregiver, DoseEvent, DoseStats, DoseStatus, Medication, Patient};
use crate::session::{Session, SessionStore, SESSION_TTL_MIN};

/// Response for add_caregiver
#[derive(Debug, Serialize)]
pub struct AddCaregiverResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// Response for caregiver_login
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub caregiver_id: i64,
    pub expires_at: String,
}

/// Response for caregiver_patients
#[derive(Debug, Serialize)]
pub struct CaregiverPatientsResponse {
    pub caregiver_id: i64,
    pub patients: Vec<Patient>,
}

/// Per-medication adherence line
#[derive(Debug, Serialize)]
pub struct MedicationAdherence {
    pub medication_id: i64,
    pub name: String,
    pub scheduled_time: String,
    pub confirmed: usize,
    pub missed: usize,
}

/// Response for patient_adherence
#[derive(Debug, Serialize)]
pub struct AdherenceResponse {
    pub patient_id: i64,
    pub patient_name: String,
    pub stats: DoseStats,
    pub medications: Vec<MedicationAdherence>,
}

pub fn add_caregiver(
    db: &Database,
    name: String,
    email: String,
    access_code: String,
) -> Result<AddCaregiverResponse, String> {
    let caregiver = db
        .with_conn(|conn| Caregiver::create(conn, &name, &email, &access_code))
        .map_err(|e| e.to_string())?;
    Ok(AddCaregiverResponse {
        id: caregiver.id,
        name: caregiver.name,
        email: caregiver.email,
    })
}

pub fn assign_patient(db: &Database, caregiver_id: i64, patient_id: i64) -> Result<(), String> {
    db.with_conn(|conn| Caregiver::assign_patient(conn, caregiver_id, patient_id))
        .map_err(|e| e.to_string())
}

/// Verify an access code and open a session. The error does not say
/// whether the email or the code was wrong.
pub fn caregiver_login(
    db: &Database,
    sessions: &dyn SessionStore,
    email: String,
    access_code: String,
) -> Result<LoginResponse, String> {
    let caregiver = db
        .with_conn(|conn| Caregiver::authenticate(conn, &email, &access_code))
        .map_err(|e| e.to_string())?
        .ok_or("Invalid email or access code")?;

    let session = sessions
        .create(
            caregiver.id,
            Duration::minutes(SESSION_TTL_MIN),
            Utc::now().naive_utc(),
        )
        .map_err(|e| e.to_string())?;

    Ok(LoginResponse {
        token: session.token,
        caregiver_id: session.caregiver_id,
        expires_at: session.expires_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    })
}

pub fn caregiver_logout(sessions: &dyn SessionStore, token: &str) -> Result<(), String> {
    sessions.remove(token).map_err(|e| e.to_string())
}

fn require_session(sessions: &dyn SessionStore, token: &str) -> Result<Session, String> {
    sessions
        .get(token, Utc::now().naive_utc())
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "Session expired or unknown; log in again".to_string())
}

/// Patients assigned to the session's caregiver
pub fn caregiver_patients(
    db: &Database,
    sessions: &dyn SessionStore,
    token: &str,
) -> Result<CaregiverPatientsResponse, String> {
    let session = require_session(sessions, token)?;
    let patients = db
        .with_conn(|conn| Caregiver::assigned_patients(conn, session.caregiver_id))
        .map_err(|e| e.to_string())?;
    Ok(CaregiverPatientsResponse {
        caregiver_id: session.caregiver_id,
        patients,
    })
}

/// Adherence summary for one assigned patient
pub fn patient_adherence(
    db: &Database,
    sessions: &dyn SessionStore,
    token: &str,
    patient_id: i64,
) -> Result<AdherenceResponse, String> {
    let session = require_session(sessions, token)?;

    let allowed = db
        .with_conn(|conn| Caregiver::can_view_patient(conn, session.caregiver_id, patient_id))
        .map_err(|e| e.to_string())?;
    if !allowed {
        return Err("Patient is not assigned to this caregiver".to_string());
    }

    let (patient, medications, events) = db
        .with_conn(|conn| {
            let patient = Patient::get_by_id(conn, patient_id)?;
            let medications = Medication::list_for_patient(conn, patient_id)?;
            let events = DoseEvent::list_for_patient(conn, patient_id)?;
            Ok((patient, medications, events))
        })
        .map_err(|e| e.to_string())?;
    let patient = patient.ok_or_else(|| format!("Patient not found: {}", patient_id))?;

    let stats = DoseStats::compute(&events, Utc::now().naive_utc());

    let medications = medications
        .into_iter()
        .map(|med| {
            let confirmed = events
                .iter()
                .filter(|e| e.medication_id == med.id && e.status == DoseStatus::Confirmed)
                .count();
            let missed = events
                .iter()
                .filter(|e| e.medication_id == med.id && e.status == DoseStatus::Missed)
                .count();
            MedicationAdherence {
                medication_id: med.id,
                name: med.name,
                scheduled_time: med.scheduled_time,
                confirmed,
                missed,
            }
        })
        .collect();

    Ok(AdherenceResponse {
        patient_id,
        patient_name: patient.name,
        stats,
        medications,
    })
}
