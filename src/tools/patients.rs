//! Patient tools

use serde::Serialize;

use crate::db::Database;
use crate::models::Patient;

/// Response for add_patient
#[derive(Debug, Serialize)]
pub struct AddPatientResponse {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
}

/// Response for list_patients
#[derive(Debug, Serialize)]
pub struct ListPatientsResponse {
    pub patients: Vec<Patient>,
    pub total: usize,
}

pub fn add_patient(
    db: &Database,
    name: String,
    email: Option<String>,
) -> Result<AddPatientResponse, String> {
    let patient = db
        .with_conn(|conn| Patient::create(conn, &name, email.as_deref()))
        .map_err(|e| e.to_string())?;
    Ok(AddPatientResponse {
        id: patient.id,
        name: patient.name,
        email: patient.email,
    })
}

pub fn list_patients(db: &Database) -> Result<ListPatientsResponse, String> {
    let patients = db
        .with_conn(Patient::list)
        .map_err(|e| e.to_string())?;
    Ok(ListPatientsResponse {
        total: patients.len(),
        patients,
    })
}
