//! Patient model
//!
//! Medication owners. Kept minimal: the reminder core only needs an id
//! to scope medications and adherence views.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

/// A patient record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub created_at: String,
}

impl Patient {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Create a new patient
    pub fn create(conn: &Connection, name: &str, email: Option<&str>) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO patients (name, email) VALUES (?1, ?2)",
            params![name, email],
        )?;
        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::MissingRow)
    }

    /// Get a patient by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM patients WHERE id = ?1")?;
        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(patient) => Ok(Some(patient)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List all patients by name
    pub fn list(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM patients ORDER BY name")?;
        let patients = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(patients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;

    #[test]
    fn test_create_list() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        Patient::create(&conn, "Carlos", Some("carlos@example.com")).unwrap();
        Patient::create(&conn, "Ana", None).unwrap();

        let patients = Patient::list(&conn).unwrap();
        assert_eq!(patients.len(), 2);
        assert_eq!(patients[0].name, "Ana");
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        Patient::create(&conn, "Carlos", Some("c@example.com")).unwrap();
        assert!(Patient::create(&conn, "Otro", Some("c@example.com")).is_err());
    }
}
