//! Acknowledgment handling
//!
//! State transition for a delivered reminder. The wire action
//! identifier is decided into a closed [`AckAction`] once at the
//! boundary and matched exhaustively after that; tapping the
//! notification body with no explicit button is the `Implicit` action
//! and is treated as a confirmation.
//!
//! The pairing invariant: acting on a primary alert cancels its pending
//! follow-up so the patient is never alerted twice for one dose. Acting
//! on the follow-up itself cancels nothing.
//!
//! Only the dose-event append can fail the transition, and even then
//! only after the delivered notification has been dismissed and the
//! paired follow-up cancelled. Dismissal, follow-up cancellation,
//! postponed scheduling, and the remote audit write are all logged and
//! swallowed; the user-visible state always resolves.

use std::sync::Arc;

use chrono::Local;
use serde::Serialize;

use crate::db::{Database, DbError};
use crate::models::{DoseEvent, DoseSource, DoseStatus, Medication};
use crate::remote::DoseLogSink;
use crate::schedule::postpone_target;

use super::scheduler::ReminderScheduler;
use super::{AlertPayload, NotificationId};

/// User response to a delivered alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AckAction {
    Confirm,
    Postpone,
    Implicit,
}

impl AckAction {
    /// Decide the action from the wire identifier. Anything other than
    /// the two known button identifiers means the notification body was
    /// tapped.
    pub fn from_action_identifier(identifier: Option<&str>) -> Self {
        match identifier {
            Some("confirmar") => AckAction::Confirm,
            Some("posponer") => AckAction::Postpone,
            _ => AckAction::Implicit,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AckAction::Confirm => "confirm",
            AckAction::Postpone => "postpone",
            AckAction::Implicit => "implicit",
        }
    }
}

/// A delivered alert as reported by the notification collaborator
#[derive(Debug, Clone)]
pub struct DeliveredAlert {
    pub notification_id: NotificationId,
    pub payload: AlertPayload,
}

/// What the acknowledgment did
#[derive(Debug, Clone, Serialize)]
pub struct AckOutcome {
    pub action: AckAction,
    pub medication_id: i64,
    pub dose_event_id: Option<i64>,
    pub followup_cancelled: bool,
    pub postponed_notification_id: Option<NotificationId>,
}

/// Acknowledgment handler over the store, scheduler, and remote log
pub struct AckHandler {
    database: Database,
    scheduler: Arc<ReminderScheduler>,
    sink: Arc<dyn DoseLogSink>,
}

impl AckHandler {
    pub fn new(
        database: Database,
        scheduler: Arc<ReminderScheduler>,
        sink: Arc<dyn DoseLogSink>,
    ) -> Self {
        Self {
            database,
            scheduler,
            sink,
        }
    }

    /// Apply a user response to a delivered alert.
    pub async fn acknowledge(
        &self,
        delivered: DeliveredAlert,
        action: AckAction,
    ) -> Result<AckOutcome, DbError> {
        let medication_id = delivered.payload.medication_id;

        match action {
            // An implicit tap is interpreted as "I saw it and am
            // dealing with it" and logged as a confirmed dose, same as
            // the explicit button.
            AckAction::Confirm | AckAction::Implicit => {
                let appended = self.database.with_conn(|conn| {
                    DoseEvent::append(
                        conn,
                        medication_id,
                        DoseStatus::Confirmed,
                        DoseSource::Patient,
                        None,
                    )
                });
                if let Err(e) = &appended {
                    tracing::error!(medication_id, error = %e, "dose event append failed");
                }

                if let Err(e) = self.sink.log_dose(medication_id, DoseStatus::Confirmed).await {
                    tracing::warn!(medication_id, error = %e, "remote dose log failed");
                }

                self.scheduler.dismiss(&delivered.notification_id).await;
                let followup_cancelled = self.cancel_paired_followup(&delivered).await;

                // Surfaced only after the notification side is resolved
                let event = appended?;

                Ok(AckOutcome {
                    action,
                    medication_id,
                    dose_event_id: Some(event.id),
                    followup_cancelled,
                    postponed_notification_id: None,
                })
            }

            AckAction::Postpone => {
                self.scheduler.dismiss(&delivered.notification_id).await;

                let at = postpone_target(Local::now().naive_local());
                let postponed = self
                    .scheduler
                    .schedule_postponed(delivered.payload.clone(), at)
                    .await;

                // The one-shot supersedes the follow-up
                let followup_cancelled = self.cancel_paired_followup(&delivered).await;

                Ok(AckOutcome {
                    action,
                    medication_id,
                    dose_event_id: None,
                    followup_cancelled,
                    postponed_notification_id: postponed,
                })
            }
        }
    }

    /// Cancel the follow-up paired with a delivered primary. Returns
    /// whether a cancel was issued. Follow-ups pair with nobody.
    async fn cancel_paired_followup(&self, delivered: &DeliveredAlert) -> bool {
        if delivered.payload.is_followup {
            return false;
        }

        let followup_id = self
            .database
            .with_conn(|conn| Medication::get_by_id(conn, delivered.payload.medication_id))
            .ok()
            .flatten()
            .and_then(|med| med.followup_notification_id);

        match followup_id {
            Some(id) => {
                self.scheduler.cancel_dose(None, Some(&id)).await;
                true
            }
            None => false,
        }
    }
}
