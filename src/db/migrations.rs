//! Database migrations
//!
//! Schema creation and migration logic.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Migration v1: Initial schema
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- PATIENTS
        -- Medication owners; caregivers view their adherence
        -- ============================================
        CREATE TABLE patients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT UNIQUE,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- ============================================
        -- MEDICATIONS
        -- One daily reminder time per medication, plus the
        -- opaque handles of its scheduled alerts
        -- ============================================
        CREATE TABLE medications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            patient_id INTEGER NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            dose TEXT NOT NULL,
            scheduled_time TEXT NOT NULL,          -- normalized 24h "HH:MM"
            primary_notification_id TEXT,          -- null when permission denied
            followup_notification_id TEXT,         -- or scheduling failed
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_medications_patient ON medications(patient_id);

        -- ============================================
        -- DOSE LOG
        -- Append-only; medication_id is a weak reference so
        -- history survives medication deletion
        -- ============================================
        CREATE TABLE dose_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            medication_id INTEGER NOT NULL,
            logged_at TEXT NOT NULL DEFAULT (datetime('now')),
            status TEXT NOT NULL CHECK(status IN ('confirmed', 'missed', 'postponed')),
            source TEXT NOT NULL CHECK(source IN ('patient', 'caregiver', 'simulated')) DEFAULT 'patient',
            note TEXT
        );

        CREATE INDEX idx_dose_log_medication ON dose_log(medication_id);
        CREATE INDEX idx_dose_log_logged_at ON dose_log(logged_at);

        -- ============================================
        -- CAREGIVERS
        -- ============================================
        CREATE TABLE caregivers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            access_code_hash TEXT NOT NULL,        -- hex SHA-256
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE caregiver_patients (
            caregiver_id INTEGER NOT NULL REFERENCES caregivers(id) ON DELETE CASCADE,
            patient_id INTEGER NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
            assigned_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (caregiver_id, patient_id)
        );

        -- ============================================
        -- SESSIONS
        -- Backing table for the SQLite session store
        -- ============================================
        CREATE TABLE sessions (
            token TEXT PRIMARY KEY,
            caregiver_id INTEGER NOT NULL REFERENCES caregivers(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            expires_at TEXT NOT NULL
        );

        CREATE INDEX idx_sessions_expires ON sessions(expires_at);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run_clean() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_dose_log_rejects_unknown_status() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO dose_log (medication_id, status) VALUES (1, 'taken')",
            [],
        );
        assert!(result.is_err());
    }
}
