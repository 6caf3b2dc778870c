#![forbid(unsafe_code)]

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arems_engines::feedback::{CompletionTally, FtoRatingSummary};
use arems_engines::notify::{EvaluationNotice, ResendConfig, ResendNotifier};
use arems_engines::progress::progress_bar_width;
use arems_kernel_contracts::evaluation::{EvaluationId, EvaluationRecord, FtoEvaluationRecord};
use arems_kernel_contracts::message::{ConversationId, ConversationRecord, MessageId, MessageRecord};
use arems_kernel_contracts::orientee::{CertLevel, OrienteeId, OrienteeStatus, PendingContact};
use arems_kernel_contracts::profile::{ProfileRecord, Role, UserId};
use arems_kernel_contracts::progress::{DashboardStats, OrienteeProgress};
use arems_kernel_contracts::task::{TaskId, TaskRecord};
use arems_kernel_contracts::training::{
    TrainingMaterialId, TrainingMaterialInput, TrainingMaterialKind, TrainingMaterialRecord,
};
use arems_kernel_contracts::{ContractViolation, MonotonicTimeNs};
use arems_os::access::AccessError;
use arems_os::config::AremsOsConfig;
use arems_os::dashboard::{DashboardView, RecentEvaluation, RosterEntry};
use arems_os::service::{
    deliver_notice, AremsOs, EvaluationDraft, NewOrientee, NoticePlan, NotificationOutcome,
    NotifySkip, OsError,
};
use arems_storage::store::{
    AremsStore, LinkOutcome, OrienteeDetailsUpdate, ProfileDetailsUpdate, StorageError,
};
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

pub const JOURNAL_SCHEMA_VERSION: u8 = 1;
pub const ENV_STORE_PATH: &str = "AREMS_STORE_PATH";

pub type AdapterOs = AremsOs<AremsStore, Arc<ResendNotifier>>;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Os(#[from] OsError),
    #[error("journal: {0}")]
    Journal(String),
}

impl From<ContractViolation> for AdapterError {
    fn from(err: ContractViolation) -> Self {
        AdapterError::Os(OsError::Contract(err))
    }
}

impl AdapterError {
    pub fn http_status(&self) -> u16 {
        match self {
            AdapterError::BadRequest(_) => 400,
            AdapterError::Os(OsError::Access(AccessError::UnknownActor(_))) => 401,
            AdapterError::Os(OsError::Access(_)) => 403,
            AdapterError::Os(OsError::Storage(StorageError::NotFound { .. })) => 404,
            AdapterError::Os(OsError::Storage(StorageError::DuplicateKey { .. })) => 409,
            AdapterError::Os(OsError::Storage(StorageError::Forbidden { .. })) => 403,
            AdapterError::Os(OsError::Storage(_)) | AdapterError::Os(OsError::Contract(_)) => 400,
            AdapterError::Journal(_) => 500,
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            AdapterError::BadRequest(_) | AdapterError::Os(OsError::Contract(_)) => "INVALID",
            AdapterError::Os(OsError::Access(_)) => "DENIED",
            AdapterError::Os(OsError::Storage(StorageError::NotFound { .. })) => "NOT_FOUND",
            AdapterError::Os(OsError::Storage(StorageError::DuplicateKey { .. })) => "DUPLICATE",
            AdapterError::Os(OsError::Storage(StorageError::Forbidden { .. })) => "DENIED",
            AdapterError::Os(OsError::Storage(_)) => "INVALID",
            AdapterError::Journal(_) => "UNAVAILABLE",
        }
    }
}

// ------------------------------------------------------------------ commands

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegisterProfileRequest {
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CreateOrienteeRequest {
    pub actor_user_id: String,
    pub temp_name: String,
    pub temp_email: String,
    pub temp_phone: Option<String>,
    pub cert_level: String,
    pub station: Option<String>,
    pub shift: Option<String>,
    pub lead_fto_user_id: Option<String>,
    pub start_date: NaiveDate,
    pub tentative_clear_date: Option<NaiveDate>,
    pub total_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OrienteeStatusRequest {
    pub actor_user_id: String,
    pub orientee_id: u64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ArchiveOrienteeRequest {
    pub actor_user_id: String,
    pub orientee_id: u64,
    pub archived: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AdjustHoursRequest {
    pub actor_user_id: String,
    pub orientee_id: u64,
    pub hours_adjustment: f64,
    pub reason: Option<String>,
    pub corrected_hours_completed: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DeleteOrienteeRequest {
    pub actor_user_id: String,
    pub orientee_id: u64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SubmitEvaluationRequest {
    pub actor_user_id: String,
    pub orientee_id: u64,
    pub shift_date: NaiveDate,
    pub hours_logged: f64,
    pub overall_rating: u8,
    pub strengths: Option<String>,
    pub improvements: Option<String>,
    #[serde(default)]
    pub daily_tasks: Vec<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RateFtoRequest {
    pub actor_user_id: String,
    pub fto_user_id: String,
    pub overall_rating: u8,
    pub communication_rating: u8,
    pub teaching_rating: u8,
    pub support_rating: u8,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CreateTaskRequest {
    pub actor_user_id: String,
    pub orientee_id: u64,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VerifyTaskRequest {
    pub actor_user_id: String,
    pub task_id: u64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrainingMaterialRequest {
    pub actor_user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompleteTrainingRequest {
    pub actor_user_id: String,
    pub material_id: u64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UpdateRoleRequest {
    pub actor_user_id: String,
    pub user_id: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StartConversationRequest {
    pub actor_user_id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    pub participant_user_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SendMessageRequest {
    pub actor_user_id: String,
    pub conversation_id: u64,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MarkReadRequest {
    pub actor_user_id: String,
    pub conversation_id: u64,
}

/// Profile self-service. `phone` and `avatar_url` are cleared by "".
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UpdateProfileDetailsRequest {
    pub actor_user_id: String,
    pub user_id: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ContactRequest {
    pub temp_name: String,
    pub temp_email: String,
    pub temp_phone: Option<String>,
}

/// Absent fields are left alone; "" clears an optional text column.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UpdateOrienteeDetailsRequest {
    pub actor_user_id: String,
    pub orientee_id: u64,
    pub contact: Option<ContactRequest>,
    pub cert_level: Option<String>,
    pub station: Option<String>,
    pub shift: Option<String>,
    pub lead_fto_user_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub tentative_clear_date: Option<NaiveDate>,
    #[serde(default)]
    pub clear_tentative_clear_date: bool,
    pub orientation_book_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UpdateTrainingMaterialRequest {
    pub actor_user_id: String,
    pub material_id: u64,
    pub title: String,
    pub description: Option<String>,
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EditMessageRequest {
    pub actor_user_id: String,
    pub message_id: u64,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RenameConversationRequest {
    pub actor_user_id: String,
    pub conversation_id: u64,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DeleteConversationRequest {
    pub actor_user_id: String,
    pub conversation_id: u64,
}

/// Every state-changing request. Successful commands are journaled verbatim.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdapterCommand {
    RegisterProfile(RegisterProfileRequest),
    UpdateProfileDetails(UpdateProfileDetailsRequest),
    CreateOrientee(CreateOrienteeRequest),
    UpdateOrienteeDetails(UpdateOrienteeDetailsRequest),
    SetOrienteeStatus(OrienteeStatusRequest),
    ArchiveOrientee(ArchiveOrienteeRequest),
    AdjustHours(AdjustHoursRequest),
    DeleteOrientee(DeleteOrienteeRequest),
    SubmitEvaluation(SubmitEvaluationRequest),
    RateFto(RateFtoRequest),
    CreateTask(CreateTaskRequest),
    VerifyTask(VerifyTaskRequest),
    CreateTrainingMaterial(TrainingMaterialRequest),
    UpdateTrainingMaterial(UpdateTrainingMaterialRequest),
    CompleteTraining(CompleteTrainingRequest),
    UpdateRole(UpdateRoleRequest),
    StartConversation(StartConversationRequest),
    SendMessage(SendMessageRequest),
    EditMessage(EditMessageRequest),
    MarkConversationRead(MarkReadRequest),
    RenameConversation(RenameConversationRequest),
    DeleteConversation(DeleteConversationRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AdapterCommandResponse {
    pub status: String,
    pub outcome: String,
    pub record_id: Option<u64>,
    pub notification: Option<String>,
    pub reason: Option<String>,
}

impl AdapterCommandResponse {
    fn ok(outcome: &str, record_id: Option<u64>) -> Self {
        Self {
            status: "ok".to_string(),
            outcome: outcome.to_string(),
            record_id,
            notification: None,
            reason: None,
        }
    }

    pub fn from_error(err: &AdapterError) -> Self {
        Self {
            status: "error".to_string(),
            outcome: err.outcome().to_string(),
            record_id: None,
            notification: None,
            reason: Some(err.to_string()),
        }
    }
}

/// Lead FTO notice for a journaled evaluation, sent outside the runtime lock.
pub struct PendingNotice {
    evaluation_id: EvaluationId,
    notice: EvaluationNotice,
    notifier: Arc<ResendNotifier>,
}

impl PendingNotice {
    /// Blocks for up to the provider timeout.
    pub fn deliver(self) -> NotificationOutcome {
        deliver_notice(
            Some(&self.notifier),
            self.evaluation_id,
            NoticePlan::Deliver(self.notice),
        )
    }
}

pub struct CommandOutcome {
    pub response: AdapterCommandResponse,
    pub pending: Option<PendingNotice>,
}

impl CommandOutcome {
    fn done(response: AdapterCommandResponse) -> Self {
        Self {
            response,
            pending: None,
        }
    }

    /// Sends any pending notice and records how it went on the response.
    pub fn finish(self) -> AdapterCommandResponse {
        let mut response = self.response;
        if let Some(pending) = self.pending {
            response.notification = Some(notification_label(&pending.deliver()));
        }
        response
    }
}

// --------------------------------------------------------------------- views

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ProgressView {
    pub phase: u8,
    pub phase_name: String,
    pub progress_percent: Option<i64>,
    pub progress_bar_width: u8,
    pub effective_total_hours: f64,
    pub hours_remaining: f64,
}

impl From<OrienteeProgress> for ProgressView {
    fn from(p: OrienteeProgress) -> Self {
        Self {
            phase: p.phase.number(),
            phase_name: p.phase.name().to_string(),
            progress_percent: p.progress_percent,
            progress_bar_width: progress_bar_width(p.progress_percent.unwrap_or(0)),
            effective_total_hours: p.effective_total_hours,
            hours_remaining: p.hours_remaining,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RosterEntryView {
    pub orientee_id: u64,
    pub name: String,
    pub cert_level: String,
    pub station: Option<String>,
    pub status: String,
    pub status_label: String,
    pub hours_completed: f64,
    pub lead_fto_name: Option<String>,
    pub last_evaluation_date: Option<NaiveDate>,
    pub progress: ProgressView,
}

impl From<RosterEntry> for RosterEntryView {
    fn from(e: RosterEntry) -> Self {
        Self {
            orientee_id: e.orientee_id.0,
            name: e.display_name,
            cert_level: e.cert_level.as_str().to_string(),
            station: e.station,
            status: e.status.as_str().to_string(),
            status_label: e.status.label().to_string(),
            hours_completed: e.hours_completed,
            lead_fto_name: e.lead_fto_name,
            last_evaluation_date: e.last_evaluation_date,
            progress: e.progress.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RecentEvaluationView {
    pub evaluation_id: u64,
    pub shift_date: NaiveDate,
    pub hours_logged: f64,
    pub overall_rating: u8,
    pub evaluator_name: Option<String>,
    pub phase_at_shift: u8,
}

impl From<RecentEvaluation> for RecentEvaluationView {
    fn from(e: RecentEvaluation) -> Self {
        Self {
            evaluation_id: e.evaluation_id.0,
            shift_date: e.shift_date,
            hours_logged: e.hours_logged,
            overall_rating: e.overall_rating,
            evaluator_name: e.evaluator_name,
            phase_at_shift: e.phase_at_shift.number(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OrienteeDashboardView {
    pub orientee_id: u64,
    pub name: String,
    pub status: String,
    pub hours_completed: f64,
    pub progress: ProgressView,
    pub recent_evaluations: Vec<RecentEvaluationView>,
    pub tasks: CompletionTally,
    pub training: CompletionTally,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DashboardResponse {
    pub view: String,
    pub stats: Option<DashboardStats>,
    pub roster: Vec<RosterEntryView>,
    pub orientee: Option<OrienteeDashboardView>,
    pub unread_messages: u32,
}

impl From<DashboardView> for DashboardResponse {
    fn from(view: DashboardView) -> Self {
        match view {
            DashboardView::Staff(s) => Self {
                view: "staff".to_string(),
                stats: Some(s.stats),
                roster: s.roster.into_iter().map(Into::into).collect(),
                orientee: None,
                unread_messages: s.unread_messages,
            },
            DashboardView::Orientee(o) => {
                let o = *o;
                Self {
                    view: "orientee".to_string(),
                    stats: None,
                    roster: Vec::new(),
                    unread_messages: o.unread_messages,
                    orientee: Some(OrienteeDashboardView {
                        orientee_id: o.orientee_id.0,
                        name: o.display_name,
                        status: o.status.as_str().to_string(),
                        hours_completed: o.hours_completed,
                        progress: o.progress.into(),
                        recent_evaluations: o
                            .recent_evaluations
                            .into_iter()
                            .map(Into::into)
                            .collect(),
                        tasks: o.tasks,
                        training: o.training,
                    }),
                }
            }
            DashboardView::Unlinked => Self {
                view: "unlinked".to_string(),
                stats: None,
                roster: Vec::new(),
                orientee: None,
                unread_messages: 0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EvaluationView {
    pub evaluation_id: u64,
    pub orientee_id: u64,
    pub evaluator_user_id: String,
    pub shift_date: NaiveDate,
    pub hours_logged: f64,
    pub overall_rating: u8,
    pub phase_at_shift: u8,
    pub strengths: Option<String>,
    pub improvements: Option<String>,
    pub daily_tasks: Vec<String>,
}

impl From<&EvaluationRecord> for EvaluationView {
    fn from(e: &EvaluationRecord) -> Self {
        Self {
            evaluation_id: e.evaluation_id.0,
            orientee_id: e.orientee_id.0,
            evaluator_user_id: e.evaluator_id.as_str().to_string(),
            shift_date: e.shift_date,
            hours_logged: e.hours_logged,
            overall_rating: e.overall_rating.get(),
            phase_at_shift: e.phase_at_shift.number(),
            strengths: e.strengths.clone(),
            improvements: e.improvements.clone(),
            daily_tasks: e.daily_tasks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FtoEvaluationView {
    pub fto_evaluation_id: u64,
    pub fto_user_id: String,
    pub orientee_id: u64,
    pub ratings: [u8; 4],
    pub feedback: Option<String>,
}

impl From<&FtoEvaluationRecord> for FtoEvaluationView {
    fn from(r: &FtoEvaluationRecord) -> Self {
        Self {
            fto_evaluation_id: r.fto_evaluation_id.0,
            fto_user_id: r.input.fto_id.as_str().to_string(),
            orientee_id: r.input.orientee_id.0,
            ratings: [
                r.input.overall_rating.get(),
                r.input.communication_rating.get(),
                r.input.teaching_rating.get(),
                r.input.support_rating.get(),
            ],
            feedback: r.input.feedback.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FtoFeedbackResponse {
    pub summary: FtoRatingSummary,
    pub responses: Vec<FtoEvaluationView>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TaskView {
    pub task_id: u64,
    pub orientee_id: u64,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: String,
    pub verified_by: Option<String>,
}

impl From<&TaskRecord> for TaskView {
    fn from(t: &TaskRecord) -> Self {
        Self {
            task_id: t.task_id.0,
            orientee_id: t.input.assigned_to.0,
            title: t.input.title.clone(),
            description: t.input.description.clone(),
            due_date: t.input.due_date,
            status: t.status.as_str().to_string(),
            verified_by: t
                .verification
                .as_ref()
                .map(|v| v.verified_by.as_str().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TrainingMaterialView {
    pub material_id: u64,
    pub title: String,
    pub description: Option<String>,
    pub kind: String,
    pub url: String,
}

impl From<&TrainingMaterialRecord> for TrainingMaterialView {
    fn from(m: &TrainingMaterialRecord) -> Self {
        Self {
            material_id: m.material_id.0,
            title: m.input.title.clone(),
            description: m.input.description.clone(),
            kind: m.input.kind.as_str().to_string(),
            url: m.input.url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ConversationView {
    pub conversation_id: u64,
    pub name: Option<String>,
    pub is_group: bool,
    pub created_by: String,
    pub participant_user_ids: Vec<String>,
}

impl From<&ConversationRecord> for ConversationView {
    fn from(c: &ConversationRecord) -> Self {
        Self {
            conversation_id: c.conversation_id.0,
            name: c.name.clone(),
            is_group: c.is_group,
            created_by: c.created_by.as_str().to_string(),
            participant_user_ids: c
                .participants
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MessageView {
    pub message_id: u64,
    pub sender_user_id: String,
    pub content: String,
    pub created_at_ns: u64,
    pub edited_at_ns: Option<u64>,
}

impl From<&MessageRecord> for MessageView {
    fn from(m: &MessageRecord) -> Self {
        Self {
            message_id: m.message_id.0,
            sender_user_id: m.sender_id.as_str().to_string(),
            content: m.content.clone(),
            created_at_ns: m.created_at.0,
            edited_at_ns: m.edited_at.map(|t| t.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ProfileView {
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
    pub avatar_url: Option<String>,
}

impl From<&ProfileRecord> for ProfileView {
    fn from(p: &ProfileRecord) -> Self {
        Self {
            user_id: p.user_id.as_str().to_string(),
            full_name: p.full_name.clone(),
            email: p.email.clone(),
            phone: p.phone.clone(),
            role: p.role.as_str().to_string(),
            avatar_url: p.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AdapterHealthResponse {
    pub status: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub journal_entries: u64,
    pub notifications_enabled: bool,
}

// ------------------------------------------------------------------- journal

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct AdapterJournalEntry {
    schema_version: u8,
    now_ns: u64,
    /// Hex SHA-256 of the command's JSON encoding.
    digest: String,
    command: AdapterCommand,
}

impl AdapterJournalEntry {
    fn v1(command: AdapterCommand, now_ns: u64) -> Result<Self, AdapterError> {
        let digest = command_digest(&command)?;
        Ok(Self {
            schema_version: JOURNAL_SCHEMA_VERSION,
            now_ns,
            digest,
            command,
        })
    }
}

pub fn command_digest(command: &AdapterCommand) -> Result<String, AdapterError> {
    let bytes = serde_json::to_vec(command)
        .map_err(|err| AdapterError::Journal(format!("failed to encode command: {err}")))?;
    let digest = Sha256::digest(bytes);
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

#[derive(Debug, Clone)]
struct AdapterPersistenceConfig {
    journal_path: PathBuf,
}

// ------------------------------------------------------------------- runtime

pub struct AdapterRuntime {
    os: AdapterOs,
    persistence: Option<AdapterPersistenceConfig>,
    journal_entries: u64,
}

impl AdapterRuntime {
    pub fn new_in_memory(config: AremsOsConfig, notifier: Option<ResendNotifier>) -> Self {
        Self {
            os: AremsOs::new(config, AremsStore::new_in_memory(), notifier.map(Arc::new)),
            persistence: None,
            journal_entries: 0,
        }
    }

    /// Replays the journal with delivery switched off, then attaches `notifier`.
    pub fn new_with_persistence(
        config: AremsOsConfig,
        notifier: Option<ResendNotifier>,
        journal_path: PathBuf,
    ) -> Result<Self, AdapterError> {
        let mut runtime = Self {
            os: AremsOs::new(config, AremsStore::new_in_memory(), None),
            persistence: Some(AdapterPersistenceConfig { journal_path }),
            journal_entries: 0,
        };
        runtime.ensure_persistence_ready()?;
        runtime.replay_journal_into_store()?;
        runtime.os.set_notifier(notifier.map(Arc::new));
        Ok(runtime)
    }

    pub fn default_from_env() -> Result<Self, AdapterError> {
        let config = AremsOsConfig::from_env()
            .map_err(|err| AdapterError::BadRequest(format!("invalid config: {err}")))?;
        let notifier = match ResendConfig::from_env_var_map(|key| env::var(key).ok())
            .map_err(|err| AdapterError::BadRequest(err.to_string()))?
        {
            Some(resend) => Some(
                ResendNotifier::new(resend)
                    .map_err(|err| AdapterError::BadRequest(err.to_string()))?,
            ),
            None => {
                warn!("no mail provider key configured; evaluation notices are disabled");
                None
            }
        };
        let journal_path = env::var(ENV_STORE_PATH)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_adapter_store_path);
        Self::new_with_persistence(config, notifier, journal_path)
    }

    pub fn os(&self) -> &AdapterOs {
        &self.os
    }

    pub fn health_report(&self) -> AdapterHealthResponse {
        AdapterHealthResponse {
            status: "ok".to_string(),
            outcome: "HEALTHY".to_string(),
            reason: None,
            journal_entries: self.journal_entries,
            notifications_enabled: self.os.config().notifications_enabled,
        }
    }

    /// Stamps `command` with the wall clock. See [`Self::run_command_deferred`].
    pub fn run_command(&mut self, command: AdapterCommand) -> Result<CommandOutcome, AdapterError> {
        self.run_command_deferred(command, system_time_now_ns())
    }

    /// Applies, journals, then sends any lead FTO notice before returning.
    pub fn run_command_at(
        &mut self,
        command: AdapterCommand,
        now_ns: u64,
    ) -> Result<AdapterCommandResponse, AdapterError> {
        Ok(self.run_command_deferred(command, now_ns)?.finish())
    }

    /// Applies and journals `command`. Mail is left in the returned outcome so
    /// the caller can send it after letting go of the runtime.
    ///
    /// A command whose journal line cannot be written is rolled back; the
    /// in-memory state never runs ahead of what a restart would replay.
    pub fn run_command_deferred(
        &mut self,
        command: AdapterCommand,
        now_ns: u64,
    ) -> Result<CommandOutcome, AdapterError> {
        let now_ns = now_ns.max(1);
        let now = MonotonicTimeNs(now_ns);
        if self.persistence.is_none() {
            return self.apply_command(&command, now);
        }
        let entry = AdapterJournalEntry::v1(command, now_ns)?;
        let line = encode_journal_line(&entry)?;
        let checkpoint = self.os.repo().clone();
        let outcome = self.apply_command(&entry.command, now)?;
        if let Err(err) = self.append_journal_line(&line) {
            self.os.replace_repo(checkpoint);
            warn!(error = %err, "journal append failed; command rolled back");
            return Err(err);
        }
        Ok(outcome)
    }

    fn apply_command(
        &mut self,
        command: &AdapterCommand,
        now: MonotonicTimeNs,
    ) -> Result<CommandOutcome, AdapterError> {
        let os = &mut self.os;
        let response = match command {
            AdapterCommand::RegisterProfile(r) => {
                let role = parse_role(&r.role)?;
                let record = ProfileRecord::v1(
                    user(&r.user_id)?,
                    r.full_name.clone(),
                    r.email.clone(),
                    non_empty(r.phone.clone()),
                    role,
                    now,
                )?;
                let linked = match os.register_profile(record, now)? {
                    Some(LinkOutcome::Linked(id)) | Some(LinkOutcome::AlreadyLinked(id)) => {
                        Some(id.0)
                    }
                    Some(LinkOutcome::NoMatch) | None => None,
                };
                AdapterCommandResponse::ok("PROFILE_REGISTERED", linked)
            }
            AdapterCommand::UpdateProfileDetails(r) => {
                os.update_profile_details(
                    &user(&r.actor_user_id)?,
                    &user(&r.user_id)?,
                    ProfileDetailsUpdate {
                        full_name: r.full_name.clone(),
                        phone: clearable(&r.phone),
                        avatar_url: clearable(&r.avatar_url),
                    },
                    now,
                )?;
                AdapterCommandResponse::ok("PROFILE_UPDATED", None)
            }
            AdapterCommand::CreateOrientee(r) => {
                let cert_level = CertLevel::parse(&r.cert_level)
                    .ok_or_else(|| bad("cert_level must be EMT, AEMT or Paramedic"))?;
                let lead_fto_id = non_empty(r.lead_fto_user_id.clone())
                    .map(UserId::new)
                    .transpose()?;
                let id = os.create_orientee(
                    &user(&r.actor_user_id)?,
                    NewOrientee {
                        contact: PendingContact {
                            temp_name: r.temp_name.clone(),
                            temp_email: r.temp_email.clone(),
                            temp_phone: non_empty(r.temp_phone.clone()),
                        },
                        cert_level,
                        station: non_empty(r.station.clone()),
                        shift: non_empty(r.shift.clone()),
                        lead_fto_id,
                        start_date: r.start_date,
                        tentative_clear_date: r.tentative_clear_date,
                        total_hours_base: r.total_hours,
                    },
                    now,
                )?;
                AdapterCommandResponse::ok("ORIENTEE_CREATED", Some(id.0))
            }
            AdapterCommand::UpdateOrienteeDetails(r) => {
                let cert_level = r
                    .cert_level
                    .as_deref()
                    .map(|raw| {
                        CertLevel::parse(raw)
                            .ok_or_else(|| bad("cert_level must be EMT, AEMT or Paramedic"))
                    })
                    .transpose()?;
                let lead_fto_id = clearable(&r.lead_fto_user_id)
                    .map(|lead| lead.map(UserId::new).transpose())
                    .transpose()?;
                let tentative_clear_date = if r.clear_tentative_clear_date {
                    Some(None)
                } else {
                    r.tentative_clear_date.map(Some)
                };
                os.update_orientee_details(
                    &user(&r.actor_user_id)?,
                    OrienteeId(r.orientee_id),
                    OrienteeDetailsUpdate {
                        contact: r.contact.as_ref().map(|c| PendingContact {
                            temp_name: c.temp_name.clone(),
                            temp_email: c.temp_email.clone(),
                            temp_phone: non_empty(c.temp_phone.clone()),
                        }),
                        cert_level,
                        station: clearable(&r.station),
                        shift: clearable(&r.shift),
                        lead_fto_id,
                        start_date: r.start_date,
                        tentative_clear_date,
                        orientation_book_url: clearable(&r.orientation_book_url),
                    },
                    now,
                )?;
                AdapterCommandResponse::ok("ORIENTEE_UPDATED", Some(r.orientee_id))
            }
            AdapterCommand::SetOrienteeStatus(r) => {
                let status = OrienteeStatus::parse(&r.status)
                    .ok_or_else(|| bad("unknown orientee status"))?;
                os.set_orientee_status(
                    &user(&r.actor_user_id)?,
                    OrienteeId(r.orientee_id),
                    status,
                    now,
                )?;
                AdapterCommandResponse::ok("ORIENTEE_STATUS_SET", Some(r.orientee_id))
            }
            AdapterCommand::ArchiveOrientee(r) => {
                os.set_orientee_archived(
                    &user(&r.actor_user_id)?,
                    OrienteeId(r.orientee_id),
                    r.archived,
                    now,
                )?;
                AdapterCommandResponse::ok("ORIENTEE_ARCHIVE_SET", Some(r.orientee_id))
            }
            AdapterCommand::AdjustHours(r) => {
                os.adjust_orientee_hours(
                    &user(&r.actor_user_id)?,
                    OrienteeId(r.orientee_id),
                    r.hours_adjustment,
                    non_empty(r.reason.clone()),
                    r.corrected_hours_completed,
                    now,
                )?;
                AdapterCommandResponse::ok("ORIENTEE_HOURS_ADJUSTED", Some(r.orientee_id))
            }
            AdapterCommand::DeleteOrientee(r) => {
                os.delete_orientee(&user(&r.actor_user_id)?, OrienteeId(r.orientee_id))?;
                AdapterCommandResponse::ok("ORIENTEE_DELETED", Some(r.orientee_id))
            }
            AdapterCommand::SubmitEvaluation(r) => {
                let recorded = os.record_evaluation(
                    &user(&r.actor_user_id)?,
                    EvaluationDraft {
                        orientee_id: OrienteeId(r.orientee_id),
                        shift_date: r.shift_date,
                        hours_logged: r.hours_logged,
                        overall_rating: r.overall_rating,
                        strengths: non_empty(r.strengths.clone()),
                        improvements: non_empty(r.improvements.clone()),
                        daily_tasks: r.daily_tasks.clone(),
                    },
                    non_empty(r.idempotency_key.clone()),
                    now,
                )?;
                let mut response = AdapterCommandResponse::ok(
                    "EVALUATION_SUBMITTED",
                    Some(recorded.evaluation_id.0),
                );
                match (recorded.plan, os.notifier()) {
                    (NoticePlan::Deliver(notice), Some(notifier)) => {
                        return Ok(CommandOutcome {
                            response,
                            pending: Some(PendingNotice {
                                evaluation_id: recorded.evaluation_id,
                                notice,
                                notifier: Arc::clone(notifier),
                            }),
                        });
                    }
                    (plan, _) => {
                        let outcome = deliver_notice::<Arc<ResendNotifier>>(
                            None,
                            recorded.evaluation_id,
                            plan,
                        );
                        response.notification = Some(notification_label(&outcome));
                    }
                }
                response
            }
            AdapterCommand::RateFto(r) => {
                let id = os.rate_fto(
                    &user(&r.actor_user_id)?,
                    &user(&r.fto_user_id)?,
                    [
                        r.overall_rating,
                        r.communication_rating,
                        r.teaching_rating,
                        r.support_rating,
                    ],
                    non_empty(r.feedback.clone()),
                    now,
                )?;
                AdapterCommandResponse::ok("FTO_RATED", Some(id.0))
            }
            AdapterCommand::CreateTask(r) => {
                let id = os.create_task(
                    &user(&r.actor_user_id)?,
                    r.title.clone(),
                    non_empty(r.description.clone()),
                    OrienteeId(r.orientee_id),
                    r.due_date,
                    now,
                )?;
                AdapterCommandResponse::ok("TASK_CREATED", Some(id.0))
            }
            AdapterCommand::VerifyTask(r) => {
                os.verify_task(&user(&r.actor_user_id)?, TaskId(r.task_id), now)?;
                AdapterCommandResponse::ok("TASK_VERIFIED", Some(r.task_id))
            }
            AdapterCommand::CreateTrainingMaterial(r) => {
                let kind = TrainingMaterialKind::parse(&r.kind)
                    .ok_or_else(|| bad("kind must be video, document, powerpoint or link"))?;
                let input = TrainingMaterialInput::v1(
                    r.title.clone(),
                    non_empty(r.description.clone()),
                    kind,
                    r.url.clone(),
                )?;
                let id = os.create_training_material(&user(&r.actor_user_id)?, input, now)?;
                AdapterCommandResponse::ok("TRAINING_MATERIAL_CREATED", Some(id.0))
            }
            AdapterCommand::UpdateTrainingMaterial(r) => {
                let kind = TrainingMaterialKind::parse(&r.kind)
                    .ok_or_else(|| bad("kind must be video, document, powerpoint or link"))?;
                let input = TrainingMaterialInput::v1(
                    r.title.clone(),
                    non_empty(r.description.clone()),
                    kind,
                    r.url.clone(),
                )?;
                os.update_training_material(
                    &user(&r.actor_user_id)?,
                    TrainingMaterialId(r.material_id),
                    input,
                    now,
                )?;
                AdapterCommandResponse::ok("TRAINING_MATERIAL_UPDATED", Some(r.material_id))
            }
            AdapterCommand::CompleteTraining(r) => {
                os.complete_training(
                    &user(&r.actor_user_id)?,
                    TrainingMaterialId(r.material_id),
                    now,
                )?;
                AdapterCommandResponse::ok("TRAINING_COMPLETED", Some(r.material_id))
            }
            AdapterCommand::UpdateRole(r) => {
                os.update_role(
                    &user(&r.actor_user_id)?,
                    &user(&r.user_id)?,
                    parse_role(&r.role)?,
                    now,
                )?;
                AdapterCommandResponse::ok("ROLE_UPDATED", None)
            }
            AdapterCommand::StartConversation(r) => {
                let participants = r
                    .participant_user_ids
                    .iter()
                    .map(|p| user(p))
                    .collect::<Result<Vec<_>, _>>()?;
                let id = os.start_conversation(
                    &user(&r.actor_user_id)?,
                    non_empty(r.name.clone()),
                    r.is_group,
                    participants,
                    now,
                )?;
                AdapterCommandResponse::ok("CONVERSATION_STARTED", Some(id.0))
            }
            AdapterCommand::SendMessage(r) => {
                let id = os.send_message(
                    &user(&r.actor_user_id)?,
                    ConversationId(r.conversation_id),
                    r.content.clone(),
                    now,
                )?;
                AdapterCommandResponse::ok("MESSAGE_SENT", Some(id.0))
            }
            AdapterCommand::EditMessage(r) => {
                os.edit_message(
                    &user(&r.actor_user_id)?,
                    MessageId(r.message_id),
                    r.content.clone(),
                    now,
                )?;
                AdapterCommandResponse::ok("MESSAGE_EDITED", Some(r.message_id))
            }
            AdapterCommand::MarkConversationRead(r) => {
                os.mark_conversation_read(
                    &user(&r.actor_user_id)?,
                    ConversationId(r.conversation_id),
                    now,
                )?;
                AdapterCommandResponse::ok("CONVERSATION_READ", Some(r.conversation_id))
            }
            AdapterCommand::RenameConversation(r) => {
                os.rename_conversation(
                    &user(&r.actor_user_id)?,
                    ConversationId(r.conversation_id),
                    non_empty(r.name.clone()),
                )?;
                AdapterCommandResponse::ok("CONVERSATION_RENAMED", Some(r.conversation_id))
            }
            AdapterCommand::DeleteConversation(r) => {
                os.delete_conversation(
                    &user(&r.actor_user_id)?,
                    ConversationId(r.conversation_id),
                )?;
                AdapterCommandResponse::ok("CONVERSATION_DELETED", Some(r.conversation_id))
            }
        };
        Ok(CommandOutcome::done(response))
    }

    // ----------------------------------------------------------------- reads

    pub fn dashboard(&self, actor_user_id: &str) -> Result<DashboardResponse, AdapterError> {
        Ok(self.os.load_dashboard(&user(actor_user_id)?)?.into())
    }

    pub fn roster(
        &self,
        actor_user_id: &str,
        include_archived: bool,
    ) -> Result<Vec<RosterEntryView>, AdapterError> {
        Ok(self
            .os
            .orientee_roster(&user(actor_user_id)?, include_archived)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    pub fn evaluations(&self, actor_user_id: &str) -> Result<Vec<EvaluationView>, AdapterError> {
        Ok(self
            .os
            .evaluations_visible_to(&user(actor_user_id)?)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    pub fn evaluations_for_orientee(
        &self,
        actor_user_id: &str,
        orientee_id: u64,
    ) -> Result<Vec<EvaluationView>, AdapterError> {
        Ok(self
            .os
            .evaluations_for_orientee(&user(actor_user_id)?, OrienteeId(orientee_id))?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    pub fn training_officers(&self, actor_user_id: &str) -> Result<Vec<ProfileView>, AdapterError> {
        Ok(self
            .os
            .training_officers(&user(actor_user_id)?)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    pub fn fto_feedback(&self, actor_user_id: &str) -> Result<FtoFeedbackResponse, AdapterError> {
        let view = self.os.fto_feedback_for(&user(actor_user_id)?)?;
        Ok(FtoFeedbackResponse {
            summary: view.summary,
            responses: view.evaluations.into_iter().map(Into::into).collect(),
        })
    }

    pub fn tasks(&self, actor_user_id: &str) -> Result<Vec<TaskView>, AdapterError> {
        Ok(self
            .os
            .tasks_visible_to(&user(actor_user_id)?)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    pub fn training_materials(
        &self,
        actor_user_id: &str,
    ) -> Result<Vec<TrainingMaterialView>, AdapterError> {
        Ok(self
            .os
            .training_materials(&user(actor_user_id)?)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    pub fn conversations(
        &self,
        actor_user_id: &str,
    ) -> Result<Vec<ConversationView>, AdapterError> {
        Ok(self
            .os
            .conversations_for(&user(actor_user_id)?)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    pub fn messages(
        &self,
        actor_user_id: &str,
        conversation_id: u64,
    ) -> Result<Vec<MessageView>, AdapterError> {
        Ok(self
            .os
            .messages_in(&user(actor_user_id)?, ConversationId(conversation_id))?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    // --------------------------------------------------------------- journal

    fn ensure_persistence_ready(&self) -> Result<(), AdapterError> {
        let Some(persistence) = self.persistence.as_ref() else {
            return Ok(());
        };
        let path = &persistence.journal_path;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                AdapterError::Journal(format!(
                    "failed to create store directory '{}': {}",
                    parent.display(),
                    err
                ))
            })?;
        }
        if !path.exists() {
            File::create(path).map_err(|err| {
                AdapterError::Journal(format!(
                    "failed to create journal '{}': {}",
                    path.display(),
                    err
                ))
            })?;
        }
        Ok(())
    }

    fn replay_journal_into_store(&mut self) -> Result<(), AdapterError> {
        let Some(persistence) = self.persistence.clone() else {
            return Ok(());
        };
        let path = &persistence.journal_path;
        let file = File::open(path).map_err(|err| {
            AdapterError::Journal(format!("failed to open journal '{}': {}", path.display(), err))
        })?;
        for (line_no, line_result) in BufReader::new(file).lines().enumerate() {
            let line_no = line_no + 1;
            let line = line_result.map_err(|err| {
                AdapterError::Journal(format!(
                    "failed reading journal '{}' at line {line_no}: {err}",
                    path.display()
                ))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AdapterJournalEntry = serde_json::from_str(&line).map_err(|err| {
                AdapterError::Journal(format!("failed parsing journal at line {line_no}: {err}"))
            })?;
            if entry.schema_version != JOURNAL_SCHEMA_VERSION {
                return Err(AdapterError::Journal(format!(
                    "unsupported journal schema_version={} at line {line_no}",
                    entry.schema_version
                )));
            }
            if command_digest(&entry.command)? != entry.digest {
                return Err(AdapterError::Journal(format!(
                    "digest mismatch at line {line_no}"
                )));
            }
            self.apply_command(&entry.command, MonotonicTimeNs(entry.now_ns))
                .map_err(|err| {
                    AdapterError::Journal(format!("replay failed at line {line_no}: {err}"))
                })?;
            self.journal_entries += 1;
        }
        info!(
            entries = self.journal_entries,
            path = %path.display(),
            "journal replayed"
        );
        Ok(())
    }

    fn append_journal_line(&mut self, line: &str) -> Result<(), AdapterError> {
        let Some(persistence) = self.persistence.as_ref() else {
            return Ok(());
        };
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&persistence.journal_path)
            .map_err(|err| {
                AdapterError::Journal(format!(
                    "failed opening journal '{}' for append: {}",
                    persistence.journal_path.display(),
                    err
                ))
            })?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|err| {
                AdapterError::Journal(format!(
                    "failed writing journal '{}': {}",
                    persistence.journal_path.display(),
                    err
                ))
            })?;
        self.journal_entries += 1;
        Ok(())
    }
}

/// One newline-terminated line, written with a single call.
fn encode_journal_line(entry: &AdapterJournalEntry) -> Result<String, AdapterError> {
    let mut line = serde_json::to_string(entry)
        .map_err(|err| AdapterError::Journal(format!("failed to encode entry: {err}")))?;
    line.push('\n');
    Ok(line)
}

fn bad(reason: &str) -> AdapterError {
    AdapterError::BadRequest(reason.to_string())
}

fn user(raw: &str) -> Result<UserId, AdapterError> {
    Ok(UserId::new(raw.trim())?)
}

fn parse_role(raw: &str) -> Result<Role, AdapterError> {
    Role::parse(raw).ok_or_else(|| bad("role must be admin, lead_fto, fto, employee or orientee"))
}

/// Forms send "" for cleared optional fields.
fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Absent means untouched; "" means clear.
fn clearable(v: &Option<String>) -> Option<Option<String>> {
    v.as_ref().map(|s| non_empty(Some(s.clone())))
}

fn notification_label(outcome: &NotificationOutcome) -> String {
    match outcome {
        NotificationOutcome::Sent { .. } => "sent".to_string(),
        NotificationOutcome::Skipped(skip) => {
            let reason = match skip {
                NotifySkip::Disabled => "disabled",
                NotifySkip::NoNotifier => "no_notifier",
                NotifySkip::NoLeadFto => "no_lead_fto",
                NotifySkip::LeadIsEvaluator => "lead_is_evaluator",
                NotifySkip::LeadHasNoEmail => "lead_has_no_email",
                NotifySkip::Duplicate => "duplicate",
            };
            format!("skipped:{reason}")
        }
        NotificationOutcome::Failed(_) => "failed".to_string(),
    }
}

fn system_time_now_ns() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(1);
    u64::try_from(nanos).unwrap_or(u64::MAX)
}

fn default_adapter_store_path() -> PathBuf {
    if let Ok(home) = env::var("HOME") {
        let home = home.trim();
        if !home.is_empty() {
            return PathBuf::from(home).join(".arems/adapter/commands.jsonl");
        }
    }
    PathBuf::from(".arems/adapter/commands.jsonl")
}
