//! In-memory session store

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Duration, NaiveDateTime};

use super::{generate_token, Session, SessionError, SessionStore};

/// HashMap-backed store; sessions vanish on restart
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
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
        self.sessions
            .lock()
            .unwrap()
            .insert(session.token.clone(), session.clone());
        Ok(session)
    }

    fn get(&self, token: &str, now: NaiveDateTime) -> Result<Option<Session>, SessionError> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions
            .get(token)
            .filter(|s| s.expires_at > now)
            .cloned())
    }

    fn remove(&self, token: &str) -> Result<(), SessionError> {
        self.sessions.lock().unwrap().remove(token);
        Ok(())
    }

    fn sweep_expired(&self, now: NaiveDateTime) -> Result<usize, SessionError> {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        Ok(before - sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_create_get_remove() {
        let store = MemorySessionStore::new();
        let session = store.create(7, Duration::minutes(30), at(12, 0)).unwrap();

        let found = store.get(&session.token, at(12, 10)).unwrap().unwrap();
        assert_eq!(found.caregiver_id, 7);

        store.remove(&session.token).unwrap();
        assert!(store.get(&session.token, at(12, 10)).unwrap().is_none());
        // Removing again is a no-op
        store.remove(&session.token).unwrap();
    }

    #[test]
    fn test_expired_session_is_a_miss() {
        let store = MemorySessionStore::new();
        let session = store.create(7, Duration::minutes(30), at(12, 0)).unwrap();

        assert!(store.get(&session.token, at(12, 30)).unwrap().is_none());
        assert!(store.get(&session.token, at(12, 29)).unwrap().is_some());
    }

    #[test]
    fn test_sweep_drops_only_expired() {
        let store = MemorySessionStore::new();
        store.create(1, Duration::minutes(5), at(12, 0)).unwrap();
        store.create(2, Duration::minutes(60), at(12, 0)).unwrap();

        let swept = store.sweep_expired(at(12, 10)).unwrap();
        assert_eq!(swept, 1);
        assert_eq!(store.sweep_expired(at(12, 10)).unwrap(), 0);
    }
}
