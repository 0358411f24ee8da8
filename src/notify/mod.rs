//! Notification scheduling and acknowledgment
//!
//! The platform notification service is only a collaborator here,
//! reached through the [`Notifier`] trait: schedule an alert (daily
//! repeat or one-shot), cancel by handle, dismiss a delivered alert.
//! Handles are opaque strings. Cancellation is idempotent by contract:
//! cancelling an unknown or already-fired handle is success.

pub mod ack;
pub mod memory;
pub mod scheduler;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schedule::ParseError;

pub use ack::{AckAction, AckHandler, AckOutcome, DeliveredAlert};
pub use memory::MemoryNotifier;
pub use scheduler::{ReminderScheduler, ScheduledAlerts};

/// Opaque handle to a scheduled notification
pub type NotificationId = String;

/// Notification collaborator errors
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("scheduling failed: {0}")]
    Scheduling(String),

    #[error("notification service call timed out")]
    Timeout,

    #[error(transparent)]
    InvalidTime(#[from] ParseError),
}

/// Data carried inside every reminder alert, returned verbatim with the
/// user's response. `is_followup` is what pairs a follow-up with its
/// primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub medication_id: i64,
    pub name: String,
    #[serde(default)]
    pub is_followup: bool,
}

/// When an alert fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// Repeats every day at the given wall-clock time
    Daily { hour: u32, minute: u32 },
    /// Fires once at the given instant
    OneShot { at: NaiveDateTime },
}

/// A request to schedule one alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRequest {
    pub title: String,
    pub body: String,
    pub sound: bool,
    pub payload: AlertPayload,
    pub trigger: Trigger,
}

/// Platform notification collaborator.
///
/// Implementations must make `cancel` idempotent and must not block
/// indefinitely; the scheduler additionally wraps every call in a
/// timeout.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Whether the user has granted notification permission. When this
    /// is false the scheduler skips scheduling entirely.
    async fn permission_granted(&self) -> bool;

    /// Schedule an alert, returning its handle
    async fn schedule(&self, request: AlertRequest) -> Result<NotificationId, NotifyError>;

    /// Cancel a scheduled alert. Unknown or already-fired handles are
    /// treated as already absent.
    async fn cancel(&self, id: &str) -> Result<(), NotifyError>;

    /// Dismiss a delivered alert from the notification tray
    async fn dismiss(&self, id: &str) -> Result<(), NotifyError>;
}
