//! In-process notification backend
//!
//! Default backend for a headless install: keeps pending alerts in a
//! map and logs schedule/cancel activity through `tracing`. Also the
//! reference implementation of the idempotent-cancel contract.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{AlertRequest, NotificationId, Notifier, NotifyError};

#[derive(Default)]
struct State {
    next_id: u64,
    pending: HashMap<NotificationId, AlertRequest>,
}

/// In-memory [`Notifier`]
pub struct MemoryNotifier {
    state: Mutex<State>,
    permission: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::with_permission(true)
    }

    /// Backend with an explicit permission state
    pub fn with_permission(permission: bool) -> Self {
        Self {
            state: Mutex::new(State::default()),
            permission,
        }
    }

    /// Snapshot of pending alerts, most recently scheduled last
    pub fn pending(&self) -> Vec<(NotificationId, AlertRequest)> {
        let state = self.state.lock().unwrap();
        let mut alerts: Vec<_> = state
            .pending
            .iter()
            .map(|(id, req)| (id.clone(), req.clone()))
            .collect();
        alerts.sort_by(|a, b| a.0.cmp(&b.0));
        alerts
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }
}

impl Default for MemoryNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn permission_granted(&self) -> bool {
        self.permission
    }

    async fn schedule(&self, request: AlertRequest) -> Result<NotificationId, NotifyError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        // Zero-padded so pending() sorts in scheduling order
        let id = format!("alert-{:06}", state.next_id);
        tracing::info!(
            id = %id,
            medication_id = request.payload.medication_id,
            is_followup = request.payload.is_followup,
            trigger = ?request.trigger,
            "scheduled alert"
        );
        state.pending.insert(id.clone(), request);
        Ok(id)
    }

    async fn cancel(&self, id: &str) -> Result<(), NotifyError> {
        let mut state = self.state.lock().unwrap();
        match state.pending.remove(id) {
            Some(_) => tracing::info!(id, "cancelled alert"),
            None => tracing::debug!(id, "cancel of unknown alert, ignoring"),
        }
        Ok(())
    }

    async fn dismiss(&self, id: &str) -> Result<(), NotifyError> {
        tracing::info!(id, "dismissed alert");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{AlertPayload, Trigger};

    fn request(medication_id: i64, is_followup: bool) -> AlertRequest {
        AlertRequest {
            title: "t".into(),
            body: "b".into(),
            sound: true,
            payload: AlertPayload {
                medication_id,
                name: "med".into(),
                is_followup,
            },
            trigger: Trigger::Daily { hour: 8, minute: 0 },
        }
    }

    #[tokio::test]
    async fn test_schedule_and_cancel() {
        let notifier = MemoryNotifier::new();
        let id = notifier.schedule(request(1, false)).await.unwrap();
        assert_eq!(notifier.pending_count(), 1);

        notifier.cancel(&id).await.unwrap();
        assert_eq!(notifier.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_unknown_is_ok() {
        let notifier = MemoryNotifier::new();
        notifier.cancel("alert-999999").await.unwrap();
        // And twice for an id that did exist
        let id = notifier.schedule(request(1, false)).await.unwrap();
        notifier.cancel(&id).await.unwrap();
        notifier.cancel(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_pending_in_scheduling_order() {
        let notifier = MemoryNotifier::new();
        notifier.schedule(request(1, false)).await.unwrap();
        notifier.schedule(request(1, true)).await.unwrap();

        let pending = notifier.pending();
        assert_eq!(pending.len(), 2);
        assert!(!pending[0].1.payload.is_followup);
        assert!(pending[1].1.payload.is_followup);
    }
}
