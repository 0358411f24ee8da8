//! SQLite session store
//!
//! Persists sessions in the main database so caregiver logins survive a
//! server restart. Timestamps use the same `datetime('now')` text
//! format as the rest of the schema, which compares correctly as
//! strings.

use chrono::{Duration, NaiveDateTime};
use rusqlite::params;

use crate::db::Database;

use super::{generate_token, Session, SessionError, SessionStore};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Database-backed store over the `sessions` table
pub struct SqliteSessionStore {
    database: Database,
}

impl SqliteSessionStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

impl SessionStore for SqliteSessionStore {
    fn create(
        &self,
        caregiver_id: i64,
        ttl: Duration,
        now: NaiveDateTime,
    ) -> Result<Session, SessionError> {
        let session = Session {
            token: generate_token(),
            caregiver_id,
            expires_at: now + ttl,
        };

        self.database.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (token, caregiver_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    session.token,
                    session.caregiver_id,
                    now.format(TS_FORMAT).to_string(),
                    session.expires_at.format(TS_FORMAT).to_string(),
                ],
            )?;
            Ok(())
        })?;

        Ok(session)
    }

    fn get(&self, token: &str, now: NaiveDateTime) -> Result<Option<Session>, SessionError> {
        let now_str = now.format(TS_FORMAT).to_string();
        let session = self.database.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT token, caregiver_id, expires_at FROM sessions
                 WHERE token = ?1 AND expires_at > ?2",
            )?;
            let result = stmt.query_row(params![token, now_str], |row| {
                let expires_raw: String = row.get("expires_at")?;
                Ok((row.get::<_, String>("token")?, row.get::<_, i64>("caregiver_id")?, expires_raw))
            });
            match result {
                Ok(row) => Ok(Some(row)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })?;

        Ok(session.and_then(|(token, caregiver_id, expires_raw)| {
            NaiveDateTime::parse_from_str(&expires_raw, TS_FORMAT)
                .ok()
                .map(|expires_at| Session {
                    token,
                    caregiver_id,
                    expires_at,
                })
        }))
    }

    fn remove(&self, token: &str) -> Result<(), SessionError> {
        self.database.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE token = ?1", [token])?;
            Ok(())
        })?;
        Ok(())
    }

    fn sweep_expired(&self, now: NaiveDateTime) -> Result<usize, SessionError> {
        let now_str = now.format(TS_FORMAT).to_string();
        let swept = self.database.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [&now_str])?;
            Ok(deleted)
        })?;
        Ok(swept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::models::Caregiver;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn store_with_caregiver() -> (SqliteSessionStore, i64) {
        let database = Database::in_memory().unwrap();
        database.with_conn(|conn| run_migrations(conn)).unwrap();
        let caregiver_id = database
            .with_conn(|conn| Ok(Caregiver::create(conn, "Luisa", "l@example.com", "1234")?.id))
            .unwrap();
        (SqliteSessionStore::new(database), caregiver_id)
    }

    #[test]
    fn test_roundtrip_and_expiry() {
        let (store, caregiver_id) = store_with_caregiver();
        let session = store
            .create(caregiver_id, Duration::minutes(30), at(12, 0))
            .unwrap();

        let found = store.get(&session.token, at(12, 15)).unwrap().unwrap();
        assert_eq!(found.caregiver_id, caregiver_id);
        assert_eq!(found.expires_at, at(12, 30));

        assert!(store.get(&session.token, at(12, 30)).unwrap().is_none());
    }

    #[test]
    fn test_sweep() {
        let (store, caregiver_id) = store_with_caregiver();
        store
            .create(caregiver_id, Duration::minutes(5), at(12, 0))
            .unwrap();
        store
            .create(caregiver_id, Duration::minutes(60), at(12, 0))
            .unwrap();

        assert_eq!(store.sweep_expired(at(12, 10)).unwrap(), 1);
        assert_eq!(store.sweep_expired(at(12, 10)).unwrap(), 0);
    }

    #[test]
    fn test_remove_unknown_token() {
        let (store, _) = store_with_caregiver();
        store.remove("does-not-exist").unwrap();
    }
}
