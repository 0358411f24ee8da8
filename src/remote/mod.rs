//! Remote dose-log client
//!
//! The companion API keeps an adherence audit trail; every confirmed or
//! missed dose is forwarded to `POST /api/log-dose` as
//! `{"idMedica": <id>, "estado": "atendida"|"no_atendida"}`. Forwarding
//! is best effort: callers log failures and move on, the local state
//! transition never waits on the audit trail.

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

use crate::models::DoseStatus;

/// Remote API errors
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("dose-log request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("dose-log endpoint returned status {0}")]
    Status(u16),
}

/// Wire value for a dose status; postponed doses are not forwarded.
pub fn wire_estado(status: DoseStatus) -> Option<&'static str> {
    match status {
        DoseStatus::Confirmed => Some("atendida"),
        DoseStatus::Missed => Some("no_atendida"),
        DoseStatus::Postponed => None,
    }
}

/// Destination for dose-log forwarding
#[async_trait]
pub trait DoseLogSink: Send + Sync {
    async fn log_dose(&self, medication_id: i64, status: DoseStatus) -> Result<(), RemoteError>;
}

/// HTTP sink against the companion API
pub struct HttpDoseLog {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDoseLog {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl DoseLogSink for HttpDoseLog {
    async fn log_dose(&self, medication_id: i64, status: DoseStatus) -> Result<(), RemoteError> {
        let Some(estado) = wire_estado(status) else {
            return Ok(());
        };

        let url = format!("{}/api/log-dose", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&json!({ "idMedica": medication_id, "estado": estado }))
            .send()
            .await?;

        let code = response.status();
        if !code.is_success() {
            return Err(RemoteError::Status(code.as_u16()));
        }
        tracing::debug!(medication_id, estado, "dose forwarded to remote log");
        Ok(())
    }
}

/// No-op sink used when no remote API is configured
pub struct NullDoseLog;

#[async_trait]
impl DoseLogSink for NullDoseLog {
    async fn log_dose(&self, medication_id: i64, status: DoseStatus) -> Result<(), RemoteError> {
        tracing::debug!(medication_id, status = status.as_str(), "remote dose log disabled");
        Ok(())
    }
}
