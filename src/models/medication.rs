//! Medication model
//!
//! A medication with one daily reminder time, plus the opaque handles of
//! its scheduled alerts. The handles are nullable: notification
//! permission may be denied, or scheduling may fail, and the record is
//! kept either way.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

/// A medication record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    pub id: i64,
    pub patient_id: i64,
    pub name: String,
    pub dose: String,
    /// Normalized 24-hour "HH:MM"
    pub scheduled_time: String,
    pub primary_notification_id: Option<String>,
    pub followup_notification_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for creating a new medication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationCreate {
    pub patient_id: i64,
    pub name: String,
    pub dose: String,
    pub scheduled_time: String,
}

/// Data for updating a medication
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedicationUpdate {
    pub name: Option<String>,
    pub dose: Option<String>,
    pub scheduled_time: Option<String>,
}

impl Medication {
    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            patient_id: row.get("patient_id")?,
            name: row.get("name")?,
            dose: row.get("dose")?,
            scheduled_time: row.get("scheduled_time")?,
            primary_notification_id: row.get("primary_notification_id")?,
            followup_notification_id: row.get("followup_notification_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Create a new medication (no alerts scheduled yet)
    pub fn create(conn: &Connection, data: &MedicationCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO medications (patient_id, name, dose, scheduled_time)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![data.patient_id, data.name, data.dose, data.scheduled_time],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::MissingRow)
    }

    /// Get a medication by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM medications WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(med) => Ok(Some(med)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List medications for a patient, earliest reminder first
    pub fn list_for_patient(conn: &Connection, patient_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM medications WHERE patient_id = ?1 ORDER BY scheduled_time, name",
        )?;
        let meds = stmt
            .query_map([patient_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(meds)
    }

    /// Update name/dose/time fields. Notification handles are updated
    /// separately by the scheduler, after the old alerts are cancelled.
    pub fn update(conn: &Connection, id: i64, data: &MedicationUpdate) -> DbResult<Self> {
        let existing = Self::get_by_id(conn, id)?.ok_or(DbError::MissingRow)?;

        conn.execute(
            r#"
            UPDATE medications
            SET name = ?1, dose = ?2, scheduled_time = ?3, updated_at = datetime('now')
            WHERE id = ?4
            "#,
            params![
                data.name.as_ref().unwrap_or(&existing.name),
                data.dose.as_ref().unwrap_or(&existing.dose),
                data.scheduled_time.as_ref().unwrap_or(&existing.scheduled_time),
                id,
            ],
        )?;

        Self::get_by_id(conn, id)?.ok_or(DbError::MissingRow)
    }

    /// Persist the notification handles for this medication. Both are
    /// written together so the pair can never straddle two states.
    pub fn set_notification_ids(
        conn: &Connection,
        id: i64,
        primary: Option<&str>,
        followup: Option<&str>,
    ) -> DbResult<()> {
        let updated = conn.execute(
            r#"
            UPDATE medications
            SET primary_notification_id = ?1,
                followup_notification_id = ?2,
                updated_at = datetime('now')
            WHERE id = ?3
            "#,
            params![primary, followup, id],
        )?;
        if updated == 0 {
            return Err(DbError::MissingRow);
        }
        Ok(())
    }

    /// Delete a medication row. Callers must cancel both notification
    /// handles first; an orphaned alert is a defect.
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let deleted = conn.execute("DELETE FROM medications WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }
}
