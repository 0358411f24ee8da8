//! Dose event model
//!
//! Append-only log of dose outcomes. Rows are never updated or deleted;
//! `medication_id` is a weak reference (lookup only), so history
//! outlives medication deletion. All statistics are full scan + filter
//! at read time, which is fine at tens-to-hundreds of rows per patient.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

/// Outcome of one dose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseStatus {
    Confirmed,
    Missed,
    Postponed,
}

impl DoseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseStatus::Confirmed => "confirmed",
            DoseStatus::Missed => "missed",
            DoseStatus::Postponed => "postponed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "confirmed" => Some(DoseStatus::Confirmed),
            "missed" => Some(DoseStatus::Missed),
            "postponed" => Some(DoseStatus::Postponed),
            _ => None,
        }
    }
}

/// Who recorded the dose event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseSource {
    Patient,
    Caregiver,
    Simulated,
}

impl DoseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseSource::Patient => "patient",
            DoseSource::Caregiver => "caregiver",
            DoseSource::Simulated => "simulated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "patient" => Some(DoseSource::Patient),
            "caregiver" => Some(DoseSource::Caregiver),
            "simulated" => Some(DoseSource::Simulated),
            _ => None,
        }
    }
}

/// One recorded dose outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoseEvent {
    pub id: i64,
    pub medication_id: i64,
    pub logged_at: String,
    pub status: DoseStatus,
    pub source: DoseSource,
    pub note: Option<String>,
}

/// Read-side aggregate over a patient's dose events
#[derive(Debug, Clone, Serialize)]
pub struct DoseStats {
    pub total: usize,
    pub confirmed: usize,
    pub missed: usize,
    pub today: usize,
    pub this_week: usize,
    /// confirmed / (confirmed + missed), percent; None with no data
    pub adherence_percent: Option<f64>,
    pub most_recent: Option<DoseEvent>,
}

impl DoseEvent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status_raw: String = row.get("status")?;
        let source_raw: String = row.get("source")?;
        Ok(Self {
            id: row.get("id")?,
            medication_id: row.get("medication_id")?,
            logged_at: row.get("logged_at")?,
            // CHECK constraints keep these in range
            status: DoseStatus::from_str(&status_raw).unwrap_or(DoseStatus::Missed),
            source: DoseSource::from_str(&source_raw).unwrap_or(DoseSource::Patient),
            note: row.get("note")?,
        })
    }

    /// Append a dose event. There is deliberately no update or delete.
    pub fn append(
        conn: &Connection,
        medication_id: i64,
        status: DoseStatus,
        source: DoseSource,
        note: Option<&str>,
    ) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO dose_log (medication_id, status, source, note)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![medication_id, status.as_str(), source.as_str(), note],
        )?;

        let id = conn.last_insert_rowid();
        let mut stmt = conn.prepare("SELECT * FROM dose_log WHERE id = ?1")?;
        stmt.query_row([id], Self::from_row)
            .map_err(DbError::Sqlite)
    }

    /// All events for one medication, newest first
    pub fn list_for_medication(conn: &Connection, medication_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM dose_log WHERE medication_id = ?1 ORDER BY logged_at DESC, id DESC",
        )?;
        let events = stmt
            .query_map([medication_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// All events for a patient's current medications, newest first
    pub fn list_for_patient(conn: &Connection, patient_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT d.* FROM dose_log d
            JOIN medications m ON m.id = d.medication_id
            WHERE m.patient_id = ?1
            ORDER BY d.logged_at DESC, d.id DESC
            "#,
        )?;
        let events = stmt
            .query_map([patient_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Timestamp as parsed from SQLite's `datetime('now')` format
    pub fn logged_at_naive(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.logged_at, "%Y-%m-%d %H:%M:%S").ok()
    }
}

impl DoseStats {
    /// Compute statistics over a set of events, relative to `now`.
    ///
    /// Expects events newest-first, as the list queries return them.
    pub fn compute(events: &[DoseEvent], now: NaiveDateTime) -> Self {
        let today = now.date();
        let week_start = today - chrono::Duration::days(6);

        let mut confirmed = 0;
        let mut missed = 0;
        let mut today_count = 0;
        let mut week_count = 0;

        for event in events {
            match event.status {
                DoseStatus::Confirmed => confirmed += 1,
                DoseStatus::Missed => missed += 1,
                DoseStatus::Postponed => {}
            }
            if let Some(ts) = event.logged_at_naive() {
                let date = ts.date();
                if date == today {
                    today_count += 1;
                }
                if date >= week_start && date <= today {
                    week_count += 1;
                }
            }
        }

        let attended_total = confirmed + missed;
        let adherence_percent = if attended_total > 0 {
            Some(confirmed as f64 * 100.0 / attended_total as f64)
        } else {
            None
        };

        Self {
            total: events.len(),
            confirmed,
            missed,
            today: today_count,
            this_week: week_count,
            adherence_percent,
            most_recent: events.first().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use chrono::NaiveDate;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn event(status: DoseStatus, logged_at: &str) -> DoseEvent {
        DoseEvent {
            id: 0,
            medication_id: 1,
            logged_at: logged_at.to_string(),
            status,
            source: DoseSource::Patient,
            note: None,
        }
    }

    #[test]
    fn test_append_and_list() {
        let conn = test_conn();
        let first = DoseEvent::append(&conn, 42, DoseStatus::Confirmed, DoseSource::Patient, None)
            .unwrap();
        DoseEvent::append(
            &conn,
            42,
            DoseStatus::Missed,
            DoseSource::Caregiver,
            Some("asleep"),
        )
        .unwrap();
        DoseEvent::append(&conn, 99, DoseStatus::Confirmed, DoseSource::Patient, None).unwrap();

        assert_eq!(first.medication_id, 42);
        assert_eq!(first.status, DoseStatus::Confirmed);

        let events = DoseEvent::list_for_medication(&conn, 42).unwrap();
        assert_eq!(events.len(), 2);
        // Newest first
        assert_eq!(events[0].status, DoseStatus::Missed);
        assert_eq!(events[0].note.as_deref(), Some("asleep"));
    }

    #[test]
    fn test_stats_counts_and_adherence() {
        let now = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let events = vec![
            event(DoseStatus::Confirmed, "2025-03-10 08:01:00"),
            event(DoseStatus::Missed, "2025-03-09 08:00:00"),
            event(DoseStatus::Confirmed, "2025-03-06 08:02:00"),
            event(DoseStatus::Postponed, "2025-03-01 08:00:00"),
            event(DoseStatus::Confirmed, "2025-02-20 08:00:00"),
        ];

        let stats = DoseStats::compute(&events, now);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.confirmed, 3);
        assert_eq!(stats.missed, 1);
        assert_eq!(stats.today, 1);
        assert_eq!(stats.this_week, 3);
        assert_eq!(stats.adherence_percent, Some(75.0));
        assert_eq!(
            stats.most_recent.unwrap().logged_at,
            "2025-03-10 08:01:00"
        );
    }

    #[test]
    fn test_stats_empty() {
        let now = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let stats = DoseStats::compute(&[], now);
        assert_eq!(stats.total, 0);
        assert!(stats.adherence_percent.is_none());
        assert!(stats.most_recent.is_none());
    }

    #[test]
    fn test_postponed_excluded_from_adherence() {
        let now = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let events = vec![event(DoseStatus::Postponed, "2025-03-09 08:00:00")];
        let stats = DoseStats::compute(&events, now);
        assert!(stats.adherence_percent.is_none());
    }
}
