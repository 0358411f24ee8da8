//! MedAlerta MCP Server Implementation
//!
//! Exposes the reminder engine as MCP tools over stdio: medication CRUD
//! wired to the alert scheduler, alert acknowledgment, the dose log,
//! and the caregiver adherence views.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::models::{DoseSource, DoseStatus};
use crate::notify::{
    AckAction, AckHandler, AlertPayload, AlertRequest, DeliveredAlert, MemoryNotifier, Notifier,
    ReminderScheduler, Trigger,
};
use crate::remote::DoseLogSink;
use crate::schedule::{next_occurrence, TimeOfDay};
use crate::session::SessionStore;
use crate::tools::medications::SaveMedicationData;
use crate::tools::{caregivers, doses, medications, patients, status};

/// MedAlerta MCP Service
#[derive(Clone)]
pub struct MedAlertaService {
    database: Database,
    database_path: PathBuf,
    notifier: Arc<MemoryNotifier>,
    scheduler: Arc<ReminderScheduler>,
    ack: Arc<AckHandler>,
    sink: Arc<dyn DoseLogSink>,
    sessions: Arc<dyn SessionStore>,
    tool_router: ToolRouter<MedAlertaService>,
}

impl MedAlertaService {
    pub fn new(
        database_path: PathBuf,
        database: Database,
        notifier: Arc<MemoryNotifier>,
        sink: Arc<dyn DoseLogSink>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let scheduler = Arc::new(ReminderScheduler::new(notifier.clone() as Arc<dyn Notifier>));
        let ack = Arc::new(AckHandler::new(
            database.clone(),
            scheduler.clone(),
            sink.clone(),
        ));
        Self {
            database,
            database_path,
            notifier,
            scheduler,
            ack,
            sink,
            sessions,
            tool_router: Self::tool_router(),
        }
    }
}

fn to_json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

// ============================================================================
// Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddPatientParams {
    /// Patient display name
    pub name: String,
    /// Optional email, unique per patient
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddMedicationParams {
    /// Owning patient ID
    pub patient_id: i64,
    /// Medication name (e.g., "Ibuprofeno")
    pub name: String,
    /// Dose as free text (e.g., "400mg")
    pub dose: String,
    /// Daily reminder time: "08:30", "8:30" or "8:30 AM"
    pub time: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetMedicationParams {
    /// Medication ID
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListMedicationsParams {
    /// Patient ID
    pub patient_id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateMedicationParams {
    /// Medication ID
    pub id: i64,
    /// New name (optional)
    pub name: Option<String>,
    /// New dose (optional)
    pub dose: Option<String>,
    /// New reminder time (optional); both alerts are rescheduled
    pub time: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteMedicationParams {
    /// Medication ID; its scheduled alerts are cancelled with it
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AcknowledgeAlertParams {
    /// Handle of the delivered notification
    pub notification_id: String,
    /// Medication the alert was for (from the alert payload)
    pub medication_id: i64,
    /// Whether the delivered alert was the follow-up (from the payload)
    #[serde(default)]
    pub is_followup: bool,
    /// Medication name from the payload (optional; looked up if absent)
    pub name: Option<String>,
    /// Action identifier: "confirmar", "posponer", or omitted for a
    /// plain tap on the notification body
    pub action: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RecordDoseParams {
    /// Medication ID
    pub medication_id: i64,
    /// Dose outcome: confirmed, missed, or postponed
    pub status: String,
    /// Who recorded it: patient, caregiver, or simulated (default patient)
    pub source: Option<String>,
    /// Optional note
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DoseHistoryParams {
    /// Medication ID (provide either medication_id OR patient_id)
    pub medication_id: Option<i64>,
    /// Patient ID (provide either medication_id OR patient_id)
    pub patient_id: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DoseStatsParams {
    /// Patient ID
    pub patient_id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddCaregiverParams {
    /// Caregiver display name
    pub name: String,
    /// Login email, unique
    pub email: String,
    /// Plain access code; only its hash is stored
    pub access_code: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AssignPatientParams {
    /// Caregiver ID
    pub caregiver_id: i64,
    /// Patient ID to assign
    pub patient_id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CaregiverLoginParams {
    /// Caregiver email
    pub email: String,
    /// Access code
    pub access_code: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SessionTokenParams {
    /// Session token from caregiver_login
    pub token: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PatientAdherenceParams {
    /// Session token from caregiver_login
    pub token: String,
    /// Patient ID (must be assigned to the caregiver)
    pub patient_id: i64,
}

// ============================================================================
// Local Response Structs
// ============================================================================

#[derive(Debug, Serialize)]
struct PendingAlertEntry {
    id: String,
    next_fire_at: Option<chrono::NaiveDateTime>,
    request: AlertRequest,
}

#[derive(Debug, Serialize)]
struct PendingAlertsResponse {
    alerts: Vec<PendingAlertEntry>,
    total: usize,
}

#[derive(Debug, Serialize)]
struct AssignPatientResponse {
    caregiver_id: i64,
    patient_id: i64,
    assigned: bool,
}

#[derive(Debug, Serialize)]
struct LogoutResponse {
    logged_out: bool,
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl MedAlertaService {
    // --- Status ---

    #[tool(description = "Get the current status of the MedAlerta service including build info, database row counts, and pending alert count")]
    fn medalerta_status(&self) -> Result<CallToolResult, McpError> {
        let result = status::service_status(&self.database, &self.notifier, &self.database_path)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json_result(&result)
    }

    #[tool(description = "Get step-by-step instructions for the reminder workflow. Call this when starting a session or when unsure how to use the reminder tools.")]
    fn reminder_instructions(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(
            status::REMINDER_INSTRUCTIONS,
        )]))
    }

    // --- Patients ---

    #[tool(description = "Create a patient (the owner of medications and dose history)")]
    fn add_patient(&self, Parameters(p): Parameters<AddPatientParams>) -> Result<CallToolResult, McpError> {
        let result = patients::add_patient(&self.database, p.name, p.email)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json_result(&result)
    }

    #[tool(description = "List all patients")]
    fn list_patients(&self) -> Result<CallToolResult, McpError> {
        let result = patients::list_patients(&self.database)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json_result(&result)
    }

    // --- Medications ---

    #[tool(description = "Create a medication and schedule its daily reminder alerts (primary at the given time plus a follow-up 5 minutes later). An invalid time blocks the save.")]
    async fn add_medication(&self, Parameters(p): Parameters<AddMedicationParams>) -> Result<CallToolResult, McpError> {
        let data = SaveMedicationData {
            patient_id: p.patient_id,
            name: p.name,
            dose: p.dose,
            time: p.time,
        };
        let result = medications::add_medication(&self.database, &self.scheduler, data)
            .await
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json_result(&result)
    }

    #[tool(description = "Get one medication including its notification handles")]
    fn get_medication(&self, Parameters(p): Parameters<GetMedicationParams>) -> Result<CallToolResult, McpError> {
        let result = medications::get_medication(&self.database, p.id)
            .map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(med) => serde_json::to_string_pretty(&med),
            None => Ok(format!(r#"{{"error": "Medication not found", "id": {}}}"#, p.id)),
        }
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "List a patient's medications, earliest reminder first")]
    fn list_medications(&self, Parameters(p): Parameters<ListMedicationsParams>) -> Result<CallToolResult, McpError> {
        let result = medications::list_medications(&self.database, p.patient_id)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json_result(&result)
    }

    #[tool(description = "Update a medication. If the reminder time changes, the old alerts are cancelled before new ones are scheduled.")]
    async fn update_medication(&self, Parameters(p): Parameters<UpdateMedicationParams>) -> Result<CallToolResult, McpError> {
        let result = medications::update_medication(
            &self.database,
            &self.scheduler,
            p.id,
            p.name,
            p.dose,
            p.time,
        )
        .await
        .map_err(|e| McpError::internal_error(e, None))?;
        to_json_result(&result)
    }

    #[tool(description = "Delete a medication and cancel both of its scheduled alerts")]
    async fn delete_medication(&self, Parameters(p): Parameters<DeleteMedicationParams>) -> Result<CallToolResult, McpError> {
        let result = medications::delete_medication(&self.database, &self.scheduler, p.id)
            .await
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json_result(&result)
    }

    // --- Alerts ---

    #[tool(description = "Apply the user's response to a delivered alert. Action 'confirmar' logs a confirmed dose, 'posponer' schedules a one-shot re-alert in 5 minutes, anything else is an implicit confirmation. Acting on a primary alert cancels its paired follow-up.")]
    async fn acknowledge_alert(&self, Parameters(p): Parameters<AcknowledgeAlertParams>) -> Result<CallToolResult, McpError> {
        let name = match p.name {
            Some(name) => name,
            None => self
                .database
                .with_conn(|conn| crate::models::Medication::get_by_id(conn, p.medication_id))
                .map_err(|e| McpError::internal_error(e.to_string(), None))?
                .map(|m| m.name)
                .unwrap_or_else(|| "medicamento".to_string()),
        };

        let delivered = DeliveredAlert {
            notification_id: p.notification_id,
            payload: AlertPayload {
                medication_id: p.medication_id,
                name,
                is_followup: p.is_followup,
            },
        };
        let action = AckAction::from_action_identifier(p.action.as_deref());

        let outcome = self
            .ack
            .acknowledge(delivered, action)
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        to_json_result(&outcome)
    }

    #[tool(description = "List the alerts currently pending on the in-process notification backend, each with its next fire instant")]
    fn pending_alerts(&self) -> Result<CallToolResult, McpError> {
        let now = chrono::Local::now().naive_local();
        let alerts: Vec<PendingAlertEntry> = self
            .notifier
            .pending()
            .into_iter()
            .map(|(id, request)| {
                let next_fire_at = match request.trigger {
                    Trigger::Daily { hour, minute } => TimeOfDay::new(hour, minute)
                        .ok()
                        .map(|tod| next_occurrence(tod, now)),
                    Trigger::OneShot { at } => Some(at),
                };
                PendingAlertEntry {
                    id,
                    next_fire_at,
                    request,
                }
            })
            .collect();
        to_json_result(&PendingAlertsResponse {
            total: alerts.len(),
            alerts,
        })
    }

    // --- Dose log ---

    #[tool(description = "Record a dose outcome manually (status: confirmed, missed, or postponed; source: patient, caregiver, or simulated). The log is append-only.")]
    async fn record_dose(&self, Parameters(p): Parameters<RecordDoseParams>) -> Result<CallToolResult, McpError> {
        let status = DoseStatus::from_str(&p.status)
            .ok_or_else(|| McpError::internal_error(format!("Unknown status: {}", p.status), None))?;
        let source = match p.source.as_deref() {
            None => DoseSource::Patient,
            Some(raw) => DoseSource::from_str(raw)
                .ok_or_else(|| McpError::internal_error(format!("Unknown source: {}", raw), None))?,
        };

        let result = doses::record_dose(
            &self.database,
            self.sink.as_ref(),
            p.medication_id,
            status,
            source,
            p.note,
        )
        .await
        .map_err(|e| McpError::internal_error(e, None))?;
        to_json_result(&result)
    }

    #[tool(description = "Dose history, newest first, for one medication or across a patient's medications")]
    fn dose_history(&self, Parameters(p): Parameters<DoseHistoryParams>) -> Result<CallToolResult, McpError> {
        let result = match (p.medication_id, p.patient_id) {
            (Some(medication_id), None) => doses::medication_history(&self.database, medication_id),
            (None, Some(patient_id)) => doses::patient_history(&self.database, patient_id),
            _ => Err("Provide exactly one of medication_id or patient_id".to_string()),
        }
        .map_err(|e| McpError::internal_error(e, None))?;
        to_json_result(&result)
    }

    #[tool(description = "Adherence statistics for a patient: totals, today, this week, most recent event, adherence percent")]
    fn dose_stats(&self, Parameters(p): Parameters<DoseStatsParams>) -> Result<CallToolResult, McpError> {
        let result = doses::dose_stats(&self.database, p.patient_id)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json_result(&result)
    }

    // --- Caregivers ---

    #[tool(description = "Create a caregiver account with an access code")]
    fn add_caregiver(&self, Parameters(p): Parameters<AddCaregiverParams>) -> Result<CallToolResult, McpError> {
        let result = caregivers::add_caregiver(&self.database, p.name, p.email, p.access_code)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json_result(&result)
    }

    #[tool(description = "Assign a patient to a caregiver (idempotent)")]
    fn assign_patient(&self, Parameters(p): Parameters<AssignPatientParams>) -> Result<CallToolResult, McpError> {
        caregivers::assign_patient(&self.database, p.caregiver_id, p.patient_id)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json_result(&AssignPatientResponse {
            caregiver_id: p.caregiver_id,
            patient_id: p.patient_id,
            assigned: true,
        })
    }

    #[tool(description = "Log a caregiver in with email + access code; returns a session token valid for 30 minutes")]
    fn caregiver_login(&self, Parameters(p): Parameters<CaregiverLoginParams>) -> Result<CallToolResult, McpError> {
        let result = caregivers::caregiver_login(
            &self.database,
            self.sessions.as_ref(),
            p.email,
            p.access_code,
        )
        .map_err(|e| McpError::internal_error(e, None))?;
        to_json_result(&result)
    }

    #[tool(description = "End a caregiver session")]
    fn caregiver_logout(&self, Parameters(p): Parameters<SessionTokenParams>) -> Result<CallToolResult, McpError> {
        caregivers::caregiver_logout(self.sessions.as_ref(), &p.token)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json_result(&LogoutResponse { logged_out: true })
    }

    #[tool(description = "Patients assigned to the session's caregiver")]
    fn caregiver_patients(&self, Parameters(p): Parameters<SessionTokenParams>) -> Result<CallToolResult, McpError> {
        let result = caregivers::caregiver_patients(&self.database, self.sessions.as_ref(), &p.token)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json_result(&result)
    }

    #[tool(description = "Adherence summary for one assigned patient: per-medication confirmed/missed counts plus overall statistics")]
    fn patient_adherence(&self, Parameters(p): Parameters<PatientAdherenceParams>) -> Result<CallToolResult, McpError> {
        let result = caregivers::patient_adherence(
            &self.database,
            self.sessions.as_ref(),
            &p.token,
            p.patient_id,
        )
        .map_err(|e| McpError::internal_error(e, None))?;
        to_json_result(&result)
    }
}

// ============================================================================
// Server Handler
// ============================================================================

#[tool_handler]
impl ServerHandler for MedAlertaService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "medalerta".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("MedAlerta Reminder Server".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "MedAlerta - medication reminders with dose tracking. \
                 IMPORTANT: Call reminder_instructions first when unsure. \
                 Patients: add_patient, list_patients. \
                 Medications: add/get/list/update/delete_medication (saving schedules a \
                 daily primary alert plus a follow-up 5 minutes later; editing reschedules, \
                 deleting cancels both). \
                 Alerts: acknowledge_alert (action 'confirmar'/'posponer'/none), pending_alerts. \
                 Dose log: record_dose, dose_history, dose_stats (append-only log). \
                 Caregivers: add_caregiver, assign_patient, caregiver_login/logout, \
                 caregiver_patients, patient_adherence (session token, 30 min TTL)."
                    .into(),
            ),
        }
    }
}
