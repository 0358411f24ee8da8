//! Reminder scheduler
//!
//! Turns a medication's saved reminder time into a pair of scheduled
//! alerts on the notification collaborator: the primary at the
//! configured time and a follow-up 5 minutes later. Teardown is
//! symmetric and never raises; rescheduling always cancels the old
//! handles before issuing new ones so two live primaries can never
//! coexist for one medication.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::Medication;
use crate::schedule::{followup_time, parse_time_str, TimeOfDay};

use super::{AlertPayload, AlertRequest, NotificationId, Notifier, NotifyError, Trigger};

/// Upper bound on any single collaborator call; a hung notification
/// service must not stall the user action.
const CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Handles returned by `schedule_dose`. Either may be None: both when
/// permission is denied, the follow-up alone when its scheduling failed
/// and the reminder degraded to primary-only.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScheduledAlerts {
    pub primary: Option<NotificationId>,
    pub followup: Option<NotificationId>,
}

impl ScheduledAlerts {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Scheduler over a [`Notifier`] collaborator
pub struct ReminderScheduler {
    notifier: Arc<dyn Notifier>,
    call_timeout: Duration,
}

impl ReminderScheduler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            call_timeout: CALL_TIMEOUT,
        }
    }

    #[cfg(test)]
    fn with_call_timeout(notifier: Arc<dyn Notifier>, call_timeout: Duration) -> Self {
        Self {
            notifier,
            call_timeout,
        }
    }

    async fn call<T, F>(&self, fut: F) -> Result<T, NotifyError>
    where
        F: Future<Output = Result<T, NotifyError>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout),
        }
    }

    /// Schedule the primary + follow-up alert pair for a medication.
    ///
    /// Permission denied: no calls are made and both handles come back
    /// None. Primary failure is an error for the caller (who persists
    /// the medication with null handles). Follow-up failure degrades to
    /// a primary-only reminder; the primary is never rolled back.
    pub async fn schedule_dose(&self, med: &Medication) -> Result<ScheduledAlerts, NotifyError> {
        if !self.notifier.permission_granted().await {
            tracing::warn!(
                medication_id = med.id,
                "notification permission denied, saving without alerts"
            );
            return Ok(ScheduledAlerts::none());
        }

        let tod = parse_time_str(&med.scheduled_time)?;

        let primary = self
            .call(self.notifier.schedule(primary_request(med, tod)))
            .await?;

        let followup = match self
            .call(self.notifier.schedule(followup_request(med, followup_time(tod))))
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(
                    medication_id = med.id,
                    error = %e,
                    "follow-up scheduling failed, keeping primary only"
                );
                None
            }
        };

        Ok(ScheduledAlerts {
            primary: Some(primary),
            followup,
        })
    }

    /// Cancel both handles of a dose reminder. Unknown, already-fired,
    /// or null handles are no-ops; errors are logged and swallowed so
    /// teardown always completes.
    pub async fn cancel_dose(&self, primary: Option<&str>, followup: Option<&str>) {
        for id in [primary, followup].into_iter().flatten() {
            if let Err(e) = self.call(self.notifier.cancel(id)).await {
                tracing::warn!(id, error = %e, "alert cancellation failed");
            }
        }
    }

    /// Cancel the old alert pair, then schedule fresh ones. The cancel
    /// completes strictly before the new schedule calls are issued.
    pub async fn reschedule_dose(
        &self,
        med: &Medication,
        old_primary: Option<&str>,
        old_followup: Option<&str>,
    ) -> Result<ScheduledAlerts, NotifyError> {
        self.cancel_dose(old_primary, old_followup).await;
        self.schedule_dose(med).await
    }

    /// Schedule the one-shot alert for a postponed dose. Failure is
    /// logged and non-fatal.
    pub async fn schedule_postponed(
        &self,
        payload: AlertPayload,
        at: NaiveDateTime,
    ) -> Option<NotificationId> {
        let request = AlertRequest {
            title: "Recordatorio de Medicamento".to_string(),
            body: format!("Toma tu dosis de {}", payload.name),
            sound: true,
            payload,
            trigger: Trigger::OneShot { at },
        };
        match self.call(self.notifier.schedule(request)).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, "postponed alert scheduling failed");
                None
            }
        }
    }

    /// Dismiss a delivered alert; failure never blocks the caller
    pub async fn dismiss(&self, id: &str) {
        if let Err(e) = self.call(self.notifier.dismiss(id)).await {
            tracing::warn!(id, error = %e, "alert dismissal failed");
        }
    }
}

fn primary_request(med: &Medication, tod: TimeOfDay) -> AlertRequest {
    AlertRequest {
        title: "¡Hora de tu Medicamento!".to_string(),
        body: format!("Toma tu {} - Dosis: {}", med.name, med.dose),
        sound: true,
        payload: AlertPayload {
            medication_id: med.id,
            name: med.name.clone(),
            is_followup: false,
        },
        trigger: Trigger::Daily {
            hour: tod.hour,
            minute: tod.minute,
        },
    }
}

fn followup_request(med: &Medication, tod: TimeOfDay) -> AlertRequest {
    AlertRequest {
        title: "Recordatorio: Medicamento Pendiente".to_string(),
        body: format!("No has confirmado la toma de {}. ¿La tomaste?", med.name),
        sound: true,
        payload: AlertPayload {
            medication_id: med.id,
            name: med.name.clone(),
            is_followup: true,
        },
        trigger: Trigger::Daily {
            hour: tod.hour,
            minute: tod.minute,
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::notify::NotifyError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Recorded collaborator call, in order of arrival
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Recorded {
        Schedule(AlertRequest),
        Cancel(String),
        Dismiss(String),
    }

    /// Recording mock with selectable failure modes
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub calls: Mutex<Vec<Recorded>>,
        next_id: Mutex<u64>,
        pub deny_permission: bool,
        pub fail_followup: bool,
        pub fail_all_scheduling: bool,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        /// Mock whose permission check reports denied
        pub fn denying_permission() -> Self {
            Self {
                deny_permission: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<Recorded> {
            self.calls.lock().unwrap().clone()
        }

        pub fn scheduled_requests(&self) -> Vec<AlertRequest> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Recorded::Schedule(r) => Some(r),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn permission_granted(&self) -> bool {
            !self.deny_permission
        }

        async fn schedule(&self, request: AlertRequest) -> Result<NotificationId, NotifyError> {
            if self.fail_all_scheduling
                || (self.fail_followup && request.payload.is_followup)
            {
                return Err(NotifyError::Scheduling("backend unavailable".into()));
            }
            self.calls
                .lock()
                .unwrap()
                .push(Recorded::Schedule(request));
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            Ok(format!("mock-{}", *next))
        }

        async fn cancel(&self, id: &str) -> Result<(), NotifyError> {
            self.calls
                .lock()
                .unwrap()
                .push(Recorded::Cancel(id.to_string()));
            Ok(())
        }

        async fn dismiss(&self, id: &str) -> Result<(), NotifyError> {
            self.calls
                .lock()
                .unwrap()
                .push(Recorded::Dismiss(id.to_string()));
            Ok(())
        }
    }

    pub fn medication(id: i64, name: &str, dose: &str, time: &str) -> Medication {
        Medication {
            id,
            patient_id: 1,
            name: name.to_string(),
            dose: dose.to_string(),
            scheduled_time: time.to_string(),
            primary_notification_id: None,
            followup_notification_id: None,
            created_at: "2025-03-10 00:00:00".to_string(),
            updated_at: "2025-03-10 00:00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn test_schedule_dose_creates_pair() {
        let notifier = Arc::new(RecordingNotifier::new());
        let scheduler = ReminderScheduler::new(notifier.clone());
        let med = medication(42, "Ibuprofeno", "400mg", "08:00");

        let ids = scheduler.schedule_dose(&med).await.unwrap();
        assert!(ids.primary.is_some());
        assert!(ids.followup.is_some());

        let requests = notifier.scheduled_requests();
        assert_eq!(requests.len(), 2);

        assert!(!requests[0].payload.is_followup);
        assert_eq!(requests[0].payload.medication_id, 42);
        assert_eq!(requests[0].trigger, Trigger::Daily { hour: 8, minute: 0 });

        assert!(requests[1].payload.is_followup);
        assert_eq!(requests[1].trigger, Trigger::Daily { hour: 8, minute: 5 });
    }

    #[tokio::test]
    async fn test_followup_failure_keeps_primary() {
        let notifier = Arc::new(RecordingNotifier {
            fail_followup: true,
            ..Default::default()
        });
        let scheduler = ReminderScheduler::new(notifier.clone());
        let med = medication(7, "Metformina", "850mg", "21:30");

        let ids = scheduler.schedule_dose(&med).await.unwrap();
        assert!(ids.primary.is_some());
        assert!(ids.followup.is_none());
        assert_eq!(notifier.scheduled_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_permission_denied_skips_scheduling() {
        let notifier = Arc::new(RecordingNotifier {
            deny_permission: true,
            ..Default::default()
        });
        let scheduler = ReminderScheduler::new(notifier.clone());
        let med = medication(7, "Metformina", "850mg", "21:30");

        let ids = scheduler.schedule_dose(&med).await.unwrap();
        assert!(ids.primary.is_none());
        assert!(ids.followup.is_none());
        assert!(notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn test_primary_failure_is_an_error() {
        let notifier = Arc::new(RecordingNotifier {
            fail_all_scheduling: true,
            ..Default::default()
        });
        let scheduler = ReminderScheduler::new(notifier);
        let med = medication(7, "Metformina", "850mg", "21:30");

        assert!(scheduler.schedule_dose(&med).await.is_err());
    }

    #[tokio::test]
    async fn test_reschedule_cancels_before_scheduling() {
        let notifier = Arc::new(RecordingNotifier::new());
        let scheduler = ReminderScheduler::new(notifier.clone());
        let med = medication(42, "Ibuprofeno", "400mg", "19:00");

        scheduler
            .reschedule_dose(&med, Some("old-primary"), Some("old-followup"))
            .await
            .unwrap();

        let calls = notifier.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0], Recorded::Cancel("old-primary".to_string()));
        assert_eq!(calls[1], Recorded::Cancel("old-followup".to_string()));
        assert!(matches!(calls[2], Recorded::Schedule(_)));
        assert!(matches!(calls[3], Recorded::Schedule(_)));
    }

    #[tokio::test]
    async fn test_cancel_dose_skips_null_handles() {
        let notifier = Arc::new(RecordingNotifier::new());
        let scheduler = ReminderScheduler::new(notifier.clone());

        scheduler.cancel_dose(Some("only-primary"), None).await;
        scheduler.cancel_dose(None, None).await;

        assert_eq!(
            notifier.calls(),
            vec![Recorded::Cancel("only-primary".to_string())]
        );
    }

    /// Backend whose schedule call never returns in time
    struct StalledNotifier;

    #[async_trait]
    impl Notifier for StalledNotifier {
        async fn permission_granted(&self) -> bool {
            true
        }

        async fn schedule(&self, _request: AlertRequest) -> Result<NotificationId, NotifyError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("never".to_string())
        }

        async fn cancel(&self, _id: &str) -> Result<(), NotifyError> {
            Ok(())
        }

        async fn dismiss(&self, _id: &str) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stalled_backend_times_out() {
        let scheduler = ReminderScheduler::with_call_timeout(
            Arc::new(StalledNotifier),
            Duration::from_millis(10),
        );
        let med = medication(1, "Ibuprofeno", "400mg", "08:00");

        let err = scheduler.schedule_dose(&med).await.unwrap_err();
        assert!(matches!(err, NotifyError::Timeout));
    }

    #[tokio::test]
    async fn test_followup_wraps_past_midnight() {
        let notifier = Arc::new(RecordingNotifier::new());
        let scheduler = ReminderScheduler::new(notifier.clone());
        let med = medication(3, "Melatonina", "5mg", "23:58");

        scheduler.schedule_dose(&med).await.unwrap();

        let requests = notifier.scheduled_requests();
        assert_eq!(requests[1].trigger, Trigger::Daily { hour: 0, minute: 3 });
    }
}
