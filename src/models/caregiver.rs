//! Caregiver model
//!
//! Caregivers are a loosely-authenticated secondary role: they log in
//! with an access code and may only read adherence data for patients
//! assigned to them. Access codes are stored as hex SHA-256 digests.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::db::{DbError, DbResult};

use super::Patient;

/// A caregiver account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caregiver {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub access_code_hash: String,
    pub created_at: String,
}

/// Hex SHA-256 of an access code
pub fn hash_access_code(code: &str) -> String {
    let digest = Sha256::digest(code.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

impl Caregiver {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            access_code_hash: row.get("access_code_hash")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Create a caregiver with the given plain access code
    pub fn create(conn: &Connection, name: &str, email: &str, access_code: &str) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO caregivers (name, email, access_code_hash) VALUES (?1, ?2, ?3)",
            params![name, email, hash_access_code(access_code)],
        )?;
        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::MissingRow)
    }

    /// Get a caregiver by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM caregivers WHERE id = ?1")?;
        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(caregiver) => Ok(Some(caregiver)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up by email and verify the access code. Returns None on
    /// unknown email or wrong code; callers cannot tell which.
    pub fn authenticate(conn: &Connection, email: &str, access_code: &str) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM caregivers WHERE email = ?1")?;
        let result = stmt.query_row([email], Self::from_row);
        let caregiver = match result {
            Ok(c) => c,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if caregiver.access_code_hash == hash_access_code(access_code) {
            Ok(Some(caregiver))
        } else {
            Ok(None)
        }
    }

    /// Assign a patient to this caregiver (idempotent)
    pub fn assign_patient(conn: &Connection, caregiver_id: i64, patient_id: i64) -> DbResult<()> {
        conn.execute(
            r#"
            INSERT INTO caregiver_patients (caregiver_id, patient_id)
            VALUES (?1, ?2)
            ON CONFLICT(caregiver_id, patient_id) DO NOTHING
            "#,
            params![caregiver_id, patient_id],
        )?;
        Ok(())
    }

    /// Patients assigned to this caregiver
    pub fn assigned_patients(conn: &Connection, caregiver_id: i64) -> DbResult<Vec<Patient>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT p.* FROM patients p
            JOIN caregiver_patients cp ON cp.patient_id = p.id
            WHERE cp.caregiver_id = ?1
            ORDER BY p.name
            "#,
        )?;
        let patients = stmt
            .query_map([caregiver_id], |row| {
                Ok(Patient {
                    id: row.get("id")?,
                    name: row.get("name")?,
                    email: row.get("email")?,
                    created_at: row.get("created_at")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(patients)
    }

    /// Whether a patient is assigned to this caregiver
    pub fn can_view_patient(conn: &Connection, caregiver_id: i64, patient_id: i64) -> DbResult<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM caregiver_patients WHERE caregiver_id = ?1 AND patient_id = ?2",
            params![caregiver_id, patient_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn test_authenticate() {
        let conn = test_conn();
        Caregiver::create(&conn, "Luisa", "luisa@example.com", "1234").unwrap();

        let ok = Caregiver::authenticate(&conn, "luisa@example.com", "1234").unwrap();
        assert!(ok.is_some());

        let wrong_code = Caregiver::authenticate(&conn, "luisa@example.com", "9999").unwrap();
        assert!(wrong_code.is_none());

        let unknown = Caregiver::authenticate(&conn, "nobody@example.com", "1234").unwrap();
        assert!(unknown.is_none());
    }

    #[test]
    fn test_assignment_and_visibility() {
        let conn = test_conn();
        let caregiver = Caregiver::create(&conn, "Luisa", "luisa@example.com", "1234").unwrap();
        let ana = Patient::create(&conn, "Ana", None).unwrap();
        let carlos = Patient::create(&conn, "Carlos", None).unwrap();

        Caregiver::assign_patient(&conn, caregiver.id, ana.id).unwrap();
        // Idempotent
        Caregiver::assign_patient(&conn, caregiver.id, ana.id).unwrap();

        let patients = Caregiver::assigned_patients(&conn, caregiver.id).unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].name, "Ana");

        assert!(Caregiver::can_view_patient(&conn, caregiver.id, ana.id).unwrap());
        assert!(!Caregiver::can_view_patient(&conn, caregiver.id, carlos.id).unwrap());
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let h = hash_access_code("1234");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_access_code("1234"));
        assert_ne!(h, hash_access_code("12345"));
    }
}
