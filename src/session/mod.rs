//! Caregiver sessions
//!
//! A [`SessionStore`] trait with an in-memory backend for tests and a
//! SQLite backend for production, plus an expiry sweep the server runs
//! on a fixed tick. `now` is always passed in so expiry is testable
//! without sleeping.

mod memory;
mod sqlite;

use chrono::{Duration, NaiveDateTime};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::db::DbError;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

/// Session lifetime
pub const SESSION_TTL_MIN: i64 = 30;

/// How often the server sweeps expired sessions
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// Session store errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Db(#[from] DbError),
}

/// An authenticated caregiver session
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub caregiver_id: i64,
    pub expires_at: NaiveDateTime,
}

/// Pluggable session storage
pub trait SessionStore: Send + Sync {
    /// Create a session for a caregiver, valid for `ttl` from `now`
    fn create(
        &self,
        caregiver_id: i64,
        ttl: Duration,
        now: NaiveDateTime,
    ) -> Result<Session, SessionError>;

    /// Look up a live session; expired tokens are misses
    fn get(&self, token: &str, now: NaiveDateTime) -> Result<Option<Session>, SessionError>;

    /// Drop a session (logout); unknown tokens are no-ops
    fn remove(&self, token: &str) -> Result<(), SessionError>;

    /// Delete all expired sessions, returning how many were dropped
    fn sweep_expired(&self, now: NaiveDateTime) -> Result<usize, SessionError>;
}

/// Random 32-character alphanumeric session token
pub(crate) fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
