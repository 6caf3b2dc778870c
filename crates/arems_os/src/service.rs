#![forbid(unsafe_code)]

use arems_engines::feedback::{summarize_fto_feedback, FtoRatingSummary};
use arems_engines::notify::{EvaluationNotice, EvaluationNotifier};
use arems_kernel_contracts::evaluation::{
    EvaluationId, EvaluationInput, EvaluationRecord, FtoEvaluationId, FtoEvaluationInput,
    FtoEvaluationRecord,
};
use arems_kernel_contracts::message::{
    ConversationId, ConversationInput, ConversationRecord, MessageId, MessageRecord,
};
use arems_kernel_contracts::orientee::{
    CertLevel, OrienteeCreateInput, OrienteeId, OrienteeRecord, OrienteeStatus, PendingContact,
};
use arems_kernel_contracts::profile::{ProfileRecord, Role, UserId};
use arems_kernel_contracts::task::{TaskId, TaskInput, TaskRecord};
use arems_kernel_contracts::training::{
    TrainingMaterialId, TrainingMaterialInput, TrainingMaterialRecord,
};
use arems_kernel_contracts::{ContractViolation, MonotonicTimeNs};
use arems_storage::repo::AremsRepo;
use arems_storage::store::{
    HoursAdjustment, LinkOutcome, OrienteeDetailsUpdate, ProfileDetailsUpdate, StorageError,
};
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::access::{AccessAction, AccessError, Actor};
use crate::config::AremsOsConfig;
use crate::dashboard::{
    display_name, orientee_dashboard, roster_entry, staff_dashboard, DashboardView, RosterEntry,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OsError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Contract(#[from] ContractViolation),
}

/// Intake form for a new orientee. `total_hours_base` falls back to the
/// configured default.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrientee {
    pub contact: PendingContact,
    pub cert_level: CertLevel,
    pub station: Option<String>,
    pub shift: Option<String>,
    pub lead_fto_id: Option<UserId>,
    pub start_date: NaiveDate,
    pub tentative_clear_date: Option<NaiveDate>,
    pub total_hours_base: Option<f64>,
}

/// Shift evaluation as entered by the evaluator; the evaluator is the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationDraft {
    pub orientee_id: OrienteeId,
    pub shift_date: NaiveDate,
    pub hours_logged: f64,
    pub overall_rating: u8,
    pub strengths: Option<String>,
    pub improvements: Option<String>,
    pub daily_tasks: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifySkip {
    Disabled,
    NoNotifier,
    NoLeadFto,
    LeadIsEvaluator,
    LeadHasNoEmail,
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent { provider_message_id: Option<String> },
    Skipped(NotifySkip),
    /// Delivery failed. The evaluation is still committed.
    Failed(String),
}

/// What should happen to the lead FTO once an evaluation is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticePlan {
    Deliver(EvaluationNotice),
    Skip(NotifySkip),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvaluation {
    pub evaluation_id: EvaluationId,
    pub plan: NoticePlan,
}

/// Runs a [`NoticePlan`] through `notifier`. Safe to call without holding the service.
pub fn deliver_notice<N: EvaluationNotifier>(
    notifier: Option<&N>,
    evaluation_id: EvaluationId,
    plan: NoticePlan,
) -> NotificationOutcome {
    let notice = match plan {
        NoticePlan::Deliver(notice) => notice,
        NoticePlan::Skip(skip) => return NotificationOutcome::Skipped(skip),
    };
    let Some(notifier) = notifier else {
        return NotificationOutcome::Skipped(NotifySkip::NoNotifier);
    };
    match notifier.deliver(&notice) {
        Ok(receipt) => NotificationOutcome::Sent {
            provider_message_id: receipt.provider_message_id,
        },
        Err(err) => {
            warn!(evaluation_id = evaluation_id.0, error = %err, "lead FTO notification failed");
            NotificationOutcome::Failed(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationSubmission {
    pub evaluation_id: EvaluationId,
    pub notification: NotificationOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FtoFeedbackView<'a> {
    pub evaluations: Vec<&'a FtoEvaluationRecord>,
    pub summary: FtoRatingSummary,
}

pub struct AremsOs<R, N> {
    config: AremsOsConfig,
    repo: R,
    notifier: Option<N>,
}

impl<R, N> AremsOs<R, N>
where
    R: AremsRepo,
    N: EvaluationNotifier,
{
    pub fn new(config: AremsOsConfig, repo: R, notifier: Option<N>) -> Self {
        Self {
            config,
            repo,
            notifier,
        }
    }

    pub fn config(&self) -> &AremsOsConfig {
        &self.config
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn notifier(&self) -> Option<&N> {
        self.notifier.as_ref()
    }

    /// Swaps the delivery seam, e.g. to keep replayed commands from re-sending mail.
    pub fn set_notifier(&mut self, notifier: Option<N>) -> Option<N> {
        std::mem::replace(&mut self.notifier, notifier)
    }

    /// Puts back a previously captured store, returning the one it replaces.
    pub fn replace_repo(&mut self, repo: R) -> R {
        std::mem::replace(&mut self.repo, repo)
    }

    pub fn resolve_actor(&self, user_id: &UserId) -> Result<Actor, AccessError> {
        let profile = self
            .repo
            .profile_row(user_id)
            .ok_or_else(|| AccessError::UnknownActor(user_id.as_str().to_string()))?;
        Ok(Actor {
            user_id: profile.user_id.clone(),
            role: profile.role,
            full_name: profile.full_name.clone(),
        })
    }

    fn gate(&self, user_id: &UserId, action: AccessAction) -> Result<Actor, AccessError> {
        let actor = self.resolve_actor(user_id)?;
        actor.require(action)?;
        Ok(actor)
    }

    fn linked_orientee(&self, actor: &Actor) -> Result<&OrienteeRecord, AccessError> {
        self.repo
            .orientee_row_by_user(&actor.user_id)
            .ok_or(AccessError::NotLinked)
    }

    fn existing_orientee(&self, orientee_id: OrienteeId) -> Result<&OrienteeRecord, OsError> {
        self.repo
            .orientee_row(orientee_id)
            .ok_or_else(|| {
                OsError::Storage(StorageError::NotFound {
                    table: "orientees",
                    key: orientee_id.0.to_string(),
                })
            })
    }

    // ---------------------------------------------------------------- profiles

    /// Stores a freshly signed-up profile. Orientee accounts are attached to a
    /// pre-registered roster row whose intake email matches.
    pub fn register_profile(
        &mut self,
        record: ProfileRecord,
        now: MonotonicTimeNs,
    ) -> Result<Option<LinkOutcome>, OsError> {
        let user_id = record.user_id.clone();
        let email = record.email.clone();
        let role = record.role;
        self.repo.insert_profile_row(record)?;
        if role != Role::Orientee {
            return Ok(None);
        }
        let outcome = self.repo.link_orientee_by_email_row(&user_id, &email, now)?;
        if let LinkOutcome::Linked(orientee_id) = outcome {
            info!(user_id = user_id.as_str(), orientee_id = orientee_id.0, "orientee account linked");
        }
        Ok(Some(outcome))
    }

    pub fn update_role(
        &mut self,
        actor_id: &UserId,
        user_id: &UserId,
        role: Role,
        now: MonotonicTimeNs,
    ) -> Result<(), OsError> {
        self.gate(actor_id, AccessAction::UpdateRoles)?;
        self.repo.update_profile_role_row(user_id, role, now)?;
        info!(user_id = user_id.as_str(), role = role.as_str(), "role updated");
        Ok(())
    }

    /// Users edit their own name, phone and avatar; admins may edit anyone's.
    /// Invalid input leaves the stored profile untouched.
    pub fn update_profile_details(
        &mut self,
        actor_id: &UserId,
        user_id: &UserId,
        update: ProfileDetailsUpdate,
        now: MonotonicTimeNs,
    ) -> Result<(), OsError> {
        let actor = self.resolve_actor(actor_id)?;
        if &actor.user_id != user_id && actor.role != Role::Admin {
            return Err(AccessError::NotOwner("profile").into());
        }
        self.repo.update_profile_details_row(user_id, update, now)?;
        info!(user_id = user_id.as_str(), "profile details updated");
        Ok(())
    }

    pub fn training_officers(&self, actor_id: &UserId) -> Result<Vec<&ProfileRecord>, OsError> {
        self.resolve_actor(actor_id)?;
        Ok(self.repo.fto_profile_rows())
    }

    // --------------------------------------------------------------- dashboard

    pub fn load_dashboard(&self, actor_id: &UserId) -> Result<DashboardView, OsError> {
        let actor = self.gate(actor_id, AccessAction::ViewDashboard)?;
        if actor.role != Role::Orientee {
            return Ok(DashboardView::Staff(staff_dashboard(
                &self.repo,
                &actor.user_id,
            )));
        }
        match self.repo.orientee_row_by_user(&actor.user_id) {
            Some(record) => Ok(DashboardView::Orientee(Box::new(orientee_dashboard(
                &self.repo,
                &actor.user_id,
                record,
            )))),
            None => Ok(DashboardView::Unlinked),
        }
    }

    /// Archived rows are listed only for callers allowed to see records.
    pub fn orientee_roster(
        &self,
        actor_id: &UserId,
        include_archived: bool,
    ) -> Result<Vec<RosterEntry>, OsError> {
        let actor = self.gate(actor_id, AccessAction::ViewOrienteeRoster)?;
        if include_archived {
            actor.require(AccessAction::ViewRecords)?;
        }
        Ok(self
            .repo
            .orientee_rows_newest_first()
            .into_iter()
            .filter(|o| include_archived || !o.is_archived)
            .map(|o| roster_entry(&self.repo, o))
            .collect())
    }

    // --------------------------------------------------------------- orientees

    pub fn create_orientee(
        &mut self,
        actor_id: &UserId,
        draft: NewOrientee,
        now: MonotonicTimeNs,
    ) -> Result<OrienteeId, OsError> {
        self.gate(actor_id, AccessAction::CreateOrientee)?;
        let input = OrienteeCreateInput::v1(
            draft.contact,
            draft.cert_level,
            draft.station,
            draft.shift,
            draft.lead_fto_id,
            draft.start_date,
            draft.tentative_clear_date,
            Some(
                draft
                    .total_hours_base
                    .unwrap_or(self.config.default_total_hours),
            ),
        )?;
        let orientee_id = self.repo.create_orientee_row(input, now)?;
        info!(orientee_id = orientee_id.0, "orientee created");
        Ok(orientee_id)
    }

    pub fn update_orientee_details(
        &mut self,
        actor_id: &UserId,
        orientee_id: OrienteeId,
        update: OrienteeDetailsUpdate,
        now: MonotonicTimeNs,
    ) -> Result<(), OsError> {
        self.gate(actor_id, AccessAction::UpdateOrientee)?;
        self.repo
            .update_orientee_details_row(orientee_id, update, now)?;
        Ok(())
    }

    pub fn set_orientee_status(
        &mut self,
        actor_id: &UserId,
        orientee_id: OrienteeId,
        status: OrienteeStatus,
        now: MonotonicTimeNs,
    ) -> Result<(), OsError> {
        self.gate(actor_id, AccessAction::UpdateOrientee)?;
        self.repo.set_orientee_status_row(orientee_id, status, now)?;
        info!(orientee_id = orientee_id.0, status = status.as_str(), "orientee status set");
        Ok(())
    }

    pub fn set_orientee_archived(
        &mut self,
        actor_id: &UserId,
        orientee_id: OrienteeId,
        archived: bool,
        now: MonotonicTimeNs,
    ) -> Result<(), OsError> {
        self.gate(actor_id, AccessAction::UpdateOrientee)?;
        self.repo
            .set_orientee_archived_row(orientee_id, archived, now)?;
        Ok(())
    }

    pub fn adjust_orientee_hours(
        &mut self,
        actor_id: &UserId,
        orientee_id: OrienteeId,
        hours_adjustment: f64,
        reason: Option<String>,
        corrected_hours_completed: Option<f64>,
        now: MonotonicTimeNs,
    ) -> Result<(), OsError> {
        let actor = self.gate(actor_id, AccessAction::AdjustHours)?;
        self.repo.adjust_orientee_hours_row(
            orientee_id,
            HoursAdjustment {
                hours_adjustment,
                reason,
                adjusted_by: actor.user_id,
                corrected_hours_completed,
            },
            now,
        )?;
        info!(orientee_id = orientee_id.0, hours_adjustment, "orientee hours adjusted");
        Ok(())
    }

    pub fn delete_orientee(
        &mut self,
        actor_id: &UserId,
        orientee_id: OrienteeId,
    ) -> Result<(), OsError> {
        self.gate(actor_id, AccessAction::DeleteOrientee)?;
        self.repo.delete_orientee_row(orientee_id)?;
        warn!(orientee_id = orientee_id.0, "orientee deleted with dependent rows");
        Ok(())
    }

    // ------------------------------------------------------------- evaluations

    /// Commits a shift evaluation, then tells the orientee's lead FTO when
    /// someone else did the evaluating. Delivery problems never undo the commit.
    pub fn submit_evaluation(
        &mut self,
        actor_id: &UserId,
        draft: EvaluationDraft,
        idempotency_key: Option<String>,
        now: MonotonicTimeNs,
    ) -> Result<EvaluationSubmission, OsError> {
        let recorded = self.record_evaluation(actor_id, draft, idempotency_key, now)?;
        let notification =
            deliver_notice(self.notifier.as_ref(), recorded.evaluation_id, recorded.plan);
        Ok(EvaluationSubmission {
            evaluation_id: recorded.evaluation_id,
            notification,
        })
    }

    /// Commits a shift evaluation and decides on the lead FTO notice without
    /// sending it. Callers that hold a lock deliver after releasing it.
    pub fn record_evaluation(
        &mut self,
        actor_id: &UserId,
        draft: EvaluationDraft,
        idempotency_key: Option<String>,
        now: MonotonicTimeNs,
    ) -> Result<RecordedEvaluation, OsError> {
        let actor = self.gate(actor_id, AccessAction::CreateEvaluation)?;
        if let Some(key) = &idempotency_key {
            if let Some(existing) = self
                .repo
                .evaluation_id_for_idempotency_key(&actor.user_id, key)
            {
                debug!(evaluation_id = existing.0, "evaluation retry resolved to existing row");
                return Ok(RecordedEvaluation {
                    evaluation_id: existing,
                    plan: NoticePlan::Skip(NotifySkip::Duplicate),
                });
            }
        }

        let input = EvaluationInput::v1(
            draft.orientee_id,
            actor.user_id.clone(),
            draft.shift_date,
            draft.hours_logged,
            draft.overall_rating,
            draft.strengths,
            draft.improvements,
            draft.daily_tasks,
        )?;
        let evaluation_id = self
            .repo
            .create_evaluation_row(input, idempotency_key, now)?;
        info!(
            evaluation_id = evaluation_id.0,
            orientee_id = draft.orientee_id.0,
            hours_logged = draft.hours_logged,
            "evaluation submitted"
        );

        let plan = match self.lead_fto_notice(&actor, evaluation_id) {
            Err(skip) => NoticePlan::Skip(skip),
            Ok(_) if !self.config.notifications_enabled => NoticePlan::Skip(NotifySkip::Disabled),
            Ok(notice) => NoticePlan::Deliver(notice),
        };
        Ok(RecordedEvaluation {
            evaluation_id,
            plan,
        })
    }

    fn lead_fto_notice(
        &self,
        actor: &Actor,
        evaluation_id: EvaluationId,
    ) -> Result<EvaluationNotice, NotifySkip> {
        let evaluation = self
            .repo
            .evaluation_row(evaluation_id)
            .ok_or(NotifySkip::NoLeadFto)?;
        let orientee = self
            .repo
            .orientee_row(evaluation.orientee_id)
            .ok_or(NotifySkip::NoLeadFto)?;
        let lead_id = orientee.lead_fto_id.as_ref().ok_or(NotifySkip::NoLeadFto)?;
        if lead_id == &actor.user_id {
            return Err(NotifySkip::LeadIsEvaluator);
        }
        let lead = self.repo.profile_row(lead_id).ok_or(NotifySkip::NoLeadFto)?;
        if lead.email.trim().is_empty() {
            return Err(NotifySkip::LeadHasNoEmail);
        }
        Ok(EvaluationNotice {
            to: lead.email.clone(),
            to_name: lead.full_name.clone(),
            orientee_name: display_name(&self.repo, orientee),
            evaluator_name: actor.full_name.clone(),
            shift_date: evaluation.shift_date,
            rating: evaluation.overall_rating,
        })
    }

    /// Orientees see only their own evaluations; every other role sees all.
    pub fn evaluations_visible_to(
        &self,
        actor_id: &UserId,
    ) -> Result<Vec<&EvaluationRecord>, OsError> {
        let actor = self.resolve_actor(actor_id)?;
        if actor.role == Role::Orientee {
            let own = self.linked_orientee(&actor)?;
            return Ok(self.repo.evaluation_rows_for_orientee(own.orientee_id));
        }
        Ok(self.repo.evaluation_rows_newest_first())
    }

    pub fn evaluations_for_orientee(
        &self,
        actor_id: &UserId,
        orientee_id: OrienteeId,
    ) -> Result<Vec<&EvaluationRecord>, OsError> {
        let actor = self.resolve_actor(actor_id)?;
        if actor.role == Role::Orientee && self.linked_orientee(&actor)?.orientee_id != orientee_id
        {
            return Err(AccessError::NotOwner("evaluations").into());
        }
        self.existing_orientee(orientee_id)?;
        Ok(self.repo.evaluation_rows_for_orientee(orientee_id))
    }

    // ------------------------------------------------------------- FTO ratings

    pub fn rate_fto(
        &mut self,
        actor_id: &UserId,
        fto_id: &UserId,
        ratings: [u8; 4],
        feedback: Option<String>,
        now: MonotonicTimeNs,
    ) -> Result<FtoEvaluationId, OsError> {
        let actor = self.gate(actor_id, AccessAction::RateFto)?;
        let orientee_id = self.linked_orientee(&actor)?.orientee_id;
        let rated = self.resolve_actor(fto_id)?;
        if !rated.role.is_training_officer() {
            return Err(ContractViolation::InvalidValue {
                field: "fto_evaluation_input.fto_id",
                reason: "must reference a training officer",
            }
            .into());
        }
        let input = FtoEvaluationInput::v1(fto_id.clone(), orientee_id, ratings, feedback)?;
        Ok(self.repo.create_fto_evaluation_row(input, now)?)
    }

    /// Admins see every response; training officers see responses about themselves.
    pub fn fto_feedback_for(&self, actor_id: &UserId) -> Result<FtoFeedbackView<'_>, OsError> {
        let actor = self.gate(actor_id, AccessAction::ViewFtoFeedback)?;
        let evaluations = if actor.role == Role::Admin {
            self.repo.fto_evaluation_rows_newest_first()
        } else {
            self.repo.fto_evaluation_rows_for_fto(&actor.user_id)
        };
        let summary = summarize_fto_feedback(&evaluations);
        Ok(FtoFeedbackView {
            evaluations,
            summary,
        })
    }

    // ------------------------------------------------------------------- tasks

    pub fn create_task(
        &mut self,
        actor_id: &UserId,
        title: String,
        description: Option<String>,
        assigned_to: OrienteeId,
        due_date: Option<NaiveDate>,
        now: MonotonicTimeNs,
    ) -> Result<TaskId, OsError> {
        let actor = self.gate(actor_id, AccessAction::CreateTask)?;
        let input = TaskInput::v1(title, description, assigned_to, actor.user_id, due_date)?;
        Ok(self.repo.create_task_row(input, now)?)
    }

    pub fn verify_task(
        &mut self,
        actor_id: &UserId,
        task_id: TaskId,
        now: MonotonicTimeNs,
    ) -> Result<(), OsError> {
        let actor = self.gate(actor_id, AccessAction::VerifyTask)?;
        self.repo.verify_task_row(task_id, &actor.user_id, now)?;
        Ok(())
    }

    pub fn tasks_visible_to(&self, actor_id: &UserId) -> Result<Vec<&TaskRecord>, OsError> {
        let actor = self.resolve_actor(actor_id)?;
        if actor.role == Role::Orientee {
            let own = self.linked_orientee(&actor)?;
            return Ok(self.repo.task_rows_for_orientee(own.orientee_id));
        }
        Ok(self.repo.task_rows_newest_first())
    }

    // ---------------------------------------------------------------- training

    pub fn training_materials(
        &self,
        actor_id: &UserId,
    ) -> Result<Vec<&TrainingMaterialRecord>, OsError> {
        self.gate(actor_id, AccessAction::ViewTrainingMaterials)?;
        Ok(self.repo.training_material_rows_newest_first())
    }

    pub fn create_training_material(
        &mut self,
        actor_id: &UserId,
        input: TrainingMaterialInput,
        now: MonotonicTimeNs,
    ) -> Result<TrainingMaterialId, OsError> {
        let actor = self.gate(actor_id, AccessAction::ManageTrainingMaterials)?;
        Ok(self
            .repo
            .create_training_material_row(input, &actor.user_id, now)?)
    }

    pub fn update_training_material(
        &mut self,
        actor_id: &UserId,
        material_id: TrainingMaterialId,
        input: TrainingMaterialInput,
        now: MonotonicTimeNs,
    ) -> Result<(), OsError> {
        self.gate(actor_id, AccessAction::ManageTrainingMaterials)?;
        self.repo
            .update_training_material_row(material_id, input, now)?;
        Ok(())
    }

    pub fn complete_training(
        &mut self,
        actor_id: &UserId,
        material_id: TrainingMaterialId,
        now: MonotonicTimeNs,
    ) -> Result<(), OsError> {
        let actor = self.gate(actor_id, AccessAction::CompleteTraining)?;
        let orientee_id = self.linked_orientee(&actor)?.orientee_id;
        self.repo
            .mark_training_complete_row(orientee_id, material_id, now)?;
        Ok(())
    }

    // --------------------------------------------------------------- messaging

    pub fn start_conversation(
        &mut self,
        actor_id: &UserId,
        name: Option<String>,
        is_group: bool,
        participants: Vec<UserId>,
        now: MonotonicTimeNs,
    ) -> Result<ConversationId, OsError> {
        let actor = self.gate(actor_id, AccessAction::Messaging)?;
        let input = ConversationInput::v1(name, is_group, actor.user_id, participants)?;
        Ok(self.repo.create_conversation_row(input, now)?)
    }

    /// Admins see every conversation; everyone else sees the ones they are in.
    pub fn conversations_for(
        &self,
        actor_id: &UserId,
    ) -> Result<Vec<&ConversationRecord>, OsError> {
        let actor = self.gate(actor_id, AccessAction::Messaging)?;
        if actor.require(AccessAction::ViewAllConversations).is_ok() {
            return Ok(self.repo.all_conversation_rows());
        }
        Ok(self.repo.conversation_rows_for_user(&actor.user_id))
    }

    fn readable_conversation(
        &self,
        actor: &Actor,
        conversation_id: ConversationId,
    ) -> Result<&ConversationRecord, OsError> {
        let conversation = self
            .repo
            .conversation_row(conversation_id)
            .ok_or_else(|| StorageError::NotFound {
                table: "conversations",
                key: conversation_id.0.to_string(),
            })?;
        if conversation.participants.contains(&actor.user_id)
            || actor.require(AccessAction::ViewAllConversations).is_ok()
        {
            Ok(conversation)
        } else {
            Err(AccessError::NotOwner("conversation").into())
        }
    }

    pub fn messages_in(
        &self,
        actor_id: &UserId,
        conversation_id: ConversationId,
    ) -> Result<Vec<&MessageRecord>, OsError> {
        let actor = self.gate(actor_id, AccessAction::Messaging)?;
        self.readable_conversation(&actor, conversation_id)?;
        Ok(self.repo.message_rows_for_conversation(conversation_id))
    }

    pub fn send_message(
        &mut self,
        actor_id: &UserId,
        conversation_id: ConversationId,
        content: String,
        now: MonotonicTimeNs,
    ) -> Result<MessageId, OsError> {
        let actor = self.gate(actor_id, AccessAction::Messaging)?;
        Ok(self
            .repo
            .send_message_row(conversation_id, &actor.user_id, content, now)?)
    }

    pub fn edit_message(
        &mut self,
        actor_id: &UserId,
        message_id: MessageId,
        content: String,
        now: MonotonicTimeNs,
    ) -> Result<(), OsError> {
        let actor = self.gate(actor_id, AccessAction::Messaging)?;
        self.repo
            .edit_message_row(message_id, &actor.user_id, content, now)?;
        Ok(())
    }

    pub fn mark_conversation_read(
        &mut self,
        actor_id: &UserId,
        conversation_id: ConversationId,
        now: MonotonicTimeNs,
    ) -> Result<(), OsError> {
        let actor = self.gate(actor_id, AccessAction::Messaging)?;
        self.repo
            .mark_conversation_read_row(&actor.user_id, conversation_id, now)?;
        Ok(())
    }

    pub fn rename_conversation(
        &mut self,
        actor_id: &UserId,
        conversation_id: ConversationId,
        name: Option<String>,
    ) -> Result<(), OsError> {
        let actor = self.gate(actor_id, AccessAction::Messaging)?;
        self.readable_conversation(&actor, conversation_id)?;
        self.repo.rename_conversation_row(conversation_id, name)?;
        Ok(())
    }

    /// Only the creator or an admin may delete a conversation.
    pub fn delete_conversation(
        &mut self,
        actor_id: &UserId,
        conversation_id: ConversationId,
    ) -> Result<(), OsError> {
        let actor = self.gate(actor_id, AccessAction::Messaging)?;
        let conversation = self.readable_conversation(&actor, conversation_id)?;
        if conversation.created_by != actor.user_id && actor.role != Role::Admin {
            return Err(AccessError::NotOwner("conversation").into());
        }
        self.repo.delete_conversation_row(conversation_id)?;
        Ok(())
    }

    pub fn unread_count(&self, actor_id: &UserId) -> Result<u32, OsError> {
        let actor = self.gate(actor_id, AccessAction::Messaging)?;
        Ok(self.repo.unread_message_count(&actor.user_id))
    }
}
