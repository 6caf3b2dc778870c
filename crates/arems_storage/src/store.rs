#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use arems_engines::progress::phase;
use arems_kernel_contracts::evaluation::{
    EvaluationId, EvaluationInput, EvaluationRecord, FtoEvaluationId, FtoEvaluationInput,
    FtoEvaluationRecord,
};
use arems_kernel_contracts::message::{
    validate_message_content, ConversationId, ConversationInput, ConversationRecord, MessageId,
    MessageRecord,
};
use arems_kernel_contracts::orientee::{
    CertLevel, OrienteeCreateInput, OrienteeId, OrienteeRecord, OrienteeSnapshot, OrienteeStatus,
    PendingContact,
};
use arems_kernel_contracts::profile::{ProfileRecord, Role, UserId};
use arems_kernel_contracts::task::{TaskId, TaskInput, TaskRecord, TaskStatus, TaskVerification};
use arems_kernel_contracts::training::{
    TrainingCompletionRecord, TrainingMaterialId, TrainingMaterialInput, TrainingMaterialRecord,
};
use arems_kernel_contracts::{ContractViolation, MonotonicTimeNs, Validate};
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("{table}: no row for key {key}")]
    NotFound { table: &'static str, key: String },
    #[error("{table}: foreign key {key} does not resolve")]
    ForeignKeyViolation { table: &'static str, key: String },
    #[error("{table}: duplicate key {key}")]
    DuplicateKey { table: &'static str, key: String },
    #[error("{table}: {reason}")]
    Forbidden {
        table: &'static str,
        reason: &'static str,
    },
    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),
}

/// Partial update of a profile. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDetailsUpdate {
    pub full_name: Option<String>,
    pub phone: Option<Option<String>>,
    pub avatar_url: Option<Option<String>>,
}

/// Partial update of an orientee's descriptive columns. Hours and status have
/// their own entry points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrienteeDetailsUpdate {
    pub contact: Option<PendingContact>,
    pub cert_level: Option<CertLevel>,
    pub station: Option<Option<String>>,
    pub shift: Option<Option<String>>,
    pub lead_fto_id: Option<Option<UserId>>,
    pub start_date: Option<NaiveDate>,
    pub tentative_clear_date: Option<Option<NaiveDate>>,
    pub orientation_book_url: Option<Option<String>>,
}

/// Administrative override of an orientee's target (and optionally logged) hours.
#[derive(Debug, Clone, PartialEq)]
pub struct HoursAdjustment {
    pub hours_adjustment: f64,
    pub reason: Option<String>,
    pub adjusted_by: UserId,
    /// Explicit correction of `hours_completed`; the only path that may lower it.
    pub corrected_hours_completed: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked(OrienteeId),
    AlreadyLinked(OrienteeId),
    NoMatch,
}

#[derive(Debug, Clone, Default)]
pub struct AremsStore {
    profiles: BTreeMap<UserId, ProfileRecord>,

    orientees: BTreeMap<OrienteeId, OrienteeRecord>,
    next_orientee_id: u64,
    // user_id -> orientee_id, maintained on link/delete.
    orientee_user_index: BTreeMap<UserId, OrienteeId>,

    evaluations: BTreeMap<EvaluationId, EvaluationRecord>,
    next_evaluation_id: u64,
    // Retried submissions must not add hours twice:
    // (evaluator_id, idempotency_key) -> evaluation_id
    evaluation_idempotency_index: BTreeMap<(UserId, String), EvaluationId>,

    fto_evaluations: BTreeMap<FtoEvaluationId, FtoEvaluationRecord>,
    next_fto_evaluation_id: u64,

    tasks: BTreeMap<TaskId, TaskRecord>,
    next_task_id: u64,

    training_materials: BTreeMap<TrainingMaterialId, TrainingMaterialRecord>,
    next_training_material_id: u64,
    training_completions: BTreeMap<(OrienteeId, TrainingMaterialId), TrainingCompletionRecord>,

    conversations: BTreeMap<ConversationId, ConversationRecord>,
    next_conversation_id: u64,
    messages: BTreeMap<MessageId, MessageRecord>,
    next_message_id: u64,
    message_reads: BTreeMap<(UserId, ConversationId), MonotonicTimeNs>,
}

fn next_id(counter: &mut u64) -> u64 {
    *counter = counter.saturating_add(1);
    *counter
}

fn newest_first<T>(rows: &mut [&T], key: impl Fn(&T) -> (MonotonicTimeNs, u64)) {
    rows.sort_by(|a, b| key(*b).cmp(&key(*a)));
}

impl AremsStore {
    pub fn new_in_memory() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------- profiles

    pub fn insert_profile(&mut self, record: ProfileRecord) -> Result<(), StorageError> {
        record.validate()?;
        if self.profiles.contains_key(&record.user_id) {
            return Err(StorageError::DuplicateKey {
                table: "profiles",
                key: record.user_id.as_str().to_string(),
            });
        }
        self.profiles.insert(record.user_id.clone(), record);
        Ok(())
    }

    pub fn get_profile(&self, user_id: &UserId) -> Option<&ProfileRecord> {
        self.profiles.get(user_id)
    }

    pub fn profiles_by_name(&self) -> Vec<&ProfileRecord> {
        let mut rows: Vec<&ProfileRecord> = self.profiles.values().collect();
        rows.sort_by(|a, b| {
            a.full_name
                .to_lowercase()
                .cmp(&b.full_name.to_lowercase())
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        rows
    }

    pub fn fto_profiles(&self) -> Vec<&ProfileRecord> {
        self.profiles_by_name()
            .into_iter()
            .filter(|p| p.role.is_training_officer())
            .collect()
    }

    pub fn update_profile_role(
        &mut self,
        user_id: &UserId,
        role: Role,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        let profile = self.profile_mut(user_id)?;
        profile.role = role;
        profile.updated_at = profile.updated_at.max(now);
        Ok(())
    }

    pub fn update_profile_details(
        &mut self,
        user_id: &UserId,
        update: ProfileDetailsUpdate,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        let current = self.profile_mut(user_id)?;
        let mut next = current.clone();
        if let Some(full_name) = update.full_name {
            next.full_name = full_name;
        }
        if let Some(phone) = update.phone {
            next.phone = phone;
        }
        if let Some(avatar_url) = update.avatar_url {
            next.avatar_url = avatar_url;
        }
        next.updated_at = next.updated_at.max(now);
        next.validate()?;
        *current = next;
        Ok(())
    }

    fn profile_mut(&mut self, user_id: &UserId) -> Result<&mut ProfileRecord, StorageError> {
        self.profiles
            .get_mut(user_id)
            .ok_or_else(|| StorageError::NotFound {
                table: "profiles",
                key: user_id.as_str().to_string(),
            })
    }

    fn require_profile(&self, table: &'static str, user_id: &UserId) -> Result<(), StorageError> {
        if self.profiles.contains_key(user_id) {
            Ok(())
        } else {
            Err(StorageError::ForeignKeyViolation {
                table,
                key: user_id.as_str().to_string(),
            })
        }
    }

    // --------------------------------------------------------------- orientees

    pub fn create_orientee(
        &mut self,
        input: OrienteeCreateInput,
        now: MonotonicTimeNs,
    ) -> Result<OrienteeId, StorageError> {
        input.validate()?;
        if let Some(lead) = &input.lead_fto_id {
            self.require_profile("orientees.lead_fto_id", lead)?;
        }
        let orientee_id = OrienteeId(next_id(&mut self.next_orientee_id));
        let record = OrienteeRecord::from_create_input_v1(orientee_id, input, now)?;
        self.orientees.insert(orientee_id, record);
        Ok(orientee_id)
    }

    pub fn get_orientee(&self, orientee_id: OrienteeId) -> Option<&OrienteeRecord> {
        self.orientees.get(&orientee_id)
    }

    pub fn orientee_by_user(&self, user_id: &UserId) -> Option<&OrienteeRecord> {
        self.orientee_user_index
            .get(user_id)
            .and_then(|id| self.orientees.get(id))
    }

    pub fn orientees_newest_first(&self) -> Vec<&OrienteeRecord> {
        let mut rows: Vec<&OrienteeRecord> = self.orientees.values().collect();
        newest_first(&mut rows, |r| (r.created_at, r.orientee_id.0));
        rows
    }

    pub fn orientee_snapshots(&self) -> Vec<OrienteeSnapshot> {
        self.orientees.values().map(OrienteeRecord::snapshot).collect()
    }

    pub fn update_orientee_details(
        &mut self,
        orientee_id: OrienteeId,
        update: OrienteeDetailsUpdate,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        if let Some(Some(lead)) = &update.lead_fto_id {
            self.require_profile("orientees.lead_fto_id", lead)?;
        }
        let current = self.orientee_mut(orientee_id)?;
        let mut next = current.clone();
        if let Some(contact) = update.contact {
            next.contact = contact;
        }
        if let Some(cert_level) = update.cert_level {
            next.cert_level = cert_level;
        }
        if let Some(station) = update.station {
            next.station = station;
        }
        if let Some(shift) = update.shift {
            next.shift = shift;
        }
        if let Some(lead_fto_id) = update.lead_fto_id {
            next.lead_fto_id = lead_fto_id;
        }
        if let Some(start_date) = update.start_date {
            next.start_date = start_date;
        }
        if let Some(clear) = update.tentative_clear_date {
            next.tentative_clear_date = clear;
        }
        if let Some(url) = update.orientation_book_url {
            next.orientation_book_url = url;
        }
        if let Some(clear) = next.tentative_clear_date {
            if clear < next.start_date {
                return Err(StorageError::ContractViolation(
                    ContractViolation::InvalidValue {
                        field: "orientee_record.tentative_clear_date",
                        reason: "must not precede start_date",
                    },
                ));
            }
        }
        next.updated_at = next.updated_at.max(now);
        next.validate()?;
        *current = next;
        Ok(())
    }

    pub fn set_orientee_status(
        &mut self,
        orientee_id: OrienteeId,
        status: OrienteeStatus,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        let record = self.orientee_mut(orientee_id)?;
        record.status = status;
        record.updated_at = record.updated_at.max(now);
        Ok(())
    }

    pub fn adjust_orientee_hours(
        &mut self,
        orientee_id: OrienteeId,
        adjustment: HoursAdjustment,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        self.require_profile("orientees.adjusted_by", &adjustment.adjusted_by)?;
        let current = self.orientee_mut(orientee_id)?;
        let mut next = current.clone();
        next.hours_adjustment = adjustment.hours_adjustment;
        next.adjustment_reason = adjustment.reason;
        next.adjusted_by = Some(adjustment.adjusted_by);
        if let Some(hours) = adjustment.corrected_hours_completed {
            next.hours_completed = hours;
        }
        next.updated_at = next.updated_at.max(now);
        next.validate()?;
        *current = next;
        Ok(())
    }

    pub fn set_orientee_archived(
        &mut self,
        orientee_id: OrienteeId,
        archived: bool,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        let record = self.orientee_mut(orientee_id)?;
        record.is_archived = archived;
        record.updated_at = record.updated_at.max(now);
        Ok(())
    }

    /// Removes the orientee and every row that references it.
    pub fn delete_orientee(&mut self, orientee_id: OrienteeId) -> Result<(), StorageError> {
        let removed = self
            .orientees
            .remove(&orientee_id)
            .ok_or_else(|| StorageError::NotFound {
                table: "orientees",
                key: orientee_id.0.to_string(),
            })?;
        if let Some(user_id) = &removed.user_id {
            self.orientee_user_index.remove(user_id);
        }
        let dropped_evals: BTreeSet<EvaluationId> = self
            .evaluations
            .values()
            .filter(|e| e.orientee_id == orientee_id)
            .map(|e| e.evaluation_id)
            .collect();
        self.evaluations
            .retain(|id, _| !dropped_evals.contains(id));
        self.evaluation_idempotency_index
            .retain(|_, id| !dropped_evals.contains(id));
        self.tasks.retain(|_, t| t.input.assigned_to != orientee_id);
        self.training_completions
            .retain(|(o, _), _| *o != orientee_id);
        self.fto_evaluations
            .retain(|_, f| f.input.orientee_id != orientee_id);
        Ok(())
    }

    /// Attaches a pre-registered orientee row to a freshly signed-up user.
    pub fn link_orientee_by_email(
        &mut self,
        user_id: &UserId,
        email: &str,
        now: MonotonicTimeNs,
    ) -> Result<LinkOutcome, StorageError> {
        self.require_profile("orientees.user_id", user_id)?;
        if let Some(existing) = self.orientee_user_index.get(user_id) {
            return Ok(LinkOutcome::AlreadyLinked(*existing));
        }
        let wanted = email.trim().to_lowercase();
        let candidate = self
            .orientees
            .values_mut()
            .filter(|o| o.user_id.is_none())
            .find(|o| o.contact.temp_email.trim().to_lowercase() == wanted);
        let Some(record) = candidate else {
            return Ok(LinkOutcome::NoMatch);
        };
        record.user_id = Some(user_id.clone());
        record.updated_at = record.updated_at.max(now);
        let orientee_id = record.orientee_id;
        self.orientee_user_index
            .insert(user_id.clone(), orientee_id);
        Ok(LinkOutcome::Linked(orientee_id))
    }

    fn orientee_mut(
        &mut self,
        orientee_id: OrienteeId,
    ) -> Result<&mut OrienteeRecord, StorageError> {
        self.orientees
            .get_mut(&orientee_id)
            .ok_or_else(|| StorageError::NotFound {
                table: "orientees",
                key: orientee_id.0.to_string(),
            })
    }

    fn require_orientee(
        &self,
        table: &'static str,
        orientee_id: OrienteeId,
    ) -> Result<(), StorageError> {
        if self.orientees.contains_key(&orientee_id) {
            Ok(())
        } else {
            Err(StorageError::ForeignKeyViolation {
                table,
                key: orientee_id.0.to_string(),
            })
        }
    }

    // ------------------------------------------------------------- evaluations

    /// Records a shift evaluation and credits its hours to the orientee.
    ///
    /// This and [`Self::adjust_orientee_hours`] are the only writers of
    /// `hours_completed`. A repeated `(evaluator, idempotency_key)` returns the
    /// original id without crediting hours again.
    pub fn create_evaluation(
        &mut self,
        input: EvaluationInput,
        idempotency_key: Option<String>,
        now: MonotonicTimeNs,
    ) -> Result<EvaluationId, StorageError> {
        input.validate()?;
        self.require_profile("evaluations.evaluator_id", &input.evaluator_id)?;

        if let Some(key) = &idempotency_key {
            if let Some(existing) = self
                .evaluation_idempotency_index
                .get(&(input.evaluator_id.clone(), key.clone()))
            {
                return Ok(*existing);
            }
        }

        let phase_at_shift = match self.orientees.get(&input.orientee_id) {
            Some(o) => phase(o.hours_completed),
            None => {
                return Err(StorageError::ForeignKeyViolation {
                    table: "evaluations.orientee_id",
                    key: input.orientee_id.0.to_string(),
                })
            }
        };
        let evaluator_id = input.evaluator_id.clone();
        let evaluation_id = EvaluationId(next_id(&mut self.next_evaluation_id));
        let record = EvaluationRecord::from_input_v1(evaluation_id, input, phase_at_shift, now)?;

        let orientee = self.orientee_mut(record.orientee_id)?;
        orientee.hours_completed += record.hours_logged;
        orientee.last_evaluation_date = Some(match orientee.last_evaluation_date {
            Some(prev) => prev.max(record.shift_date),
            None => record.shift_date,
        });
        orientee.updated_at = orientee.updated_at.max(now);

        self.evaluations.insert(evaluation_id, record);
        if let Some(key) = idempotency_key {
            self.evaluation_idempotency_index
                .insert((evaluator_id, key), evaluation_id);
        }
        Ok(evaluation_id)
    }

    pub fn evaluation_for_idempotency_key(
        &self,
        evaluator_id: &UserId,
        idempotency_key: &str,
    ) -> Option<EvaluationId> {
        self.evaluation_idempotency_index
            .get(&(evaluator_id.clone(), idempotency_key.to_string()))
            .copied()
    }

    pub fn get_evaluation(&self, evaluation_id: EvaluationId) -> Option<&EvaluationRecord> {
        self.evaluations.get(&evaluation_id)
    }

    pub fn evaluations_newest_first(&self) -> Vec<&EvaluationRecord> {
        let mut rows: Vec<&EvaluationRecord> = self.evaluations.values().collect();
        newest_first(&mut rows, |r| (r.created_at, r.evaluation_id.0));
        rows
    }

    /// Most recent shift first.
    pub fn evaluations_for_orientee(&self, orientee_id: OrienteeId) -> Vec<&EvaluationRecord> {
        let mut rows: Vec<&EvaluationRecord> = self
            .evaluations
            .values()
            .filter(|e| e.orientee_id == orientee_id)
            .collect();
        rows.sort_by(|a, b| {
            b.shift_date
                .cmp(&a.shift_date)
                .then_with(|| b.evaluation_id.cmp(&a.evaluation_id))
        });
        rows
    }

    pub fn create_fto_evaluation(
        &mut self,
        input: FtoEvaluationInput,
        now: MonotonicTimeNs,
    ) -> Result<FtoEvaluationId, StorageError> {
        input.validate()?;
        self.require_profile("fto_evaluations.fto_id", &input.fto_id)?;
        self.require_orientee("fto_evaluations.orientee_id", input.orientee_id)?;
        let fto_evaluation_id = FtoEvaluationId(next_id(&mut self.next_fto_evaluation_id));
        self.fto_evaluations.insert(
            fto_evaluation_id,
            FtoEvaluationRecord {
                fto_evaluation_id,
                input,
                created_at: now,
            },
        );
        Ok(fto_evaluation_id)
    }

    pub fn fto_evaluations_newest_first(&self) -> Vec<&FtoEvaluationRecord> {
        let mut rows: Vec<&FtoEvaluationRecord> = self.fto_evaluations.values().collect();
        newest_first(&mut rows, |r| (r.created_at, r.fto_evaluation_id.0));
        rows
    }

    pub fn fto_evaluations_for_fto(&self, fto_id: &UserId) -> Vec<&FtoEvaluationRecord> {
        self.fto_evaluations_newest_first()
            .into_iter()
            .filter(|r| &r.input.fto_id == fto_id)
            .collect()
    }

    // ------------------------------------------------------------------- tasks

    pub fn create_task(
        &mut self,
        input: TaskInput,
        now: MonotonicTimeNs,
    ) -> Result<TaskId, StorageError> {
        input.validate()?;
        self.require_orientee("tasks.assigned_to", input.assigned_to)?;
        self.require_profile("tasks.assigned_by", &input.assigned_by)?;
        let task_id = TaskId(next_id(&mut self.next_task_id));
        self.tasks.insert(
            task_id,
            TaskRecord {
                task_id,
                input,
                status: TaskStatus::Pending,
                verification: None,
                created_at: now,
            },
        );
        Ok(task_id)
    }

    pub fn get_task(&self, task_id: TaskId) -> Option<&TaskRecord> {
        self.tasks.get(&task_id)
    }

    pub fn tasks_newest_first(&self) -> Vec<&TaskRecord> {
        let mut rows: Vec<&TaskRecord> = self.tasks.values().collect();
        newest_first(&mut rows, |r| (r.created_at, r.task_id.0));
        rows
    }

    pub fn tasks_for_orientee(&self, orientee_id: OrienteeId) -> Vec<&TaskRecord> {
        self.tasks_newest_first()
            .into_iter()
            .filter(|t| t.input.assigned_to == orientee_id)
            .collect()
    }

    /// Marks a task completed. Verifying twice keeps the first verifier.
    pub fn verify_task(
        &mut self,
        task_id: TaskId,
        verified_by: &UserId,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        self.require_profile("tasks.verified_by", verified_by)?;
        let task = self
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| StorageError::NotFound {
                table: "tasks",
                key: task_id.0.to_string(),
            })?;
        if task.status == TaskStatus::Completed {
            return Ok(());
        }
        task.status = TaskStatus::Completed;
        task.verification = Some(TaskVerification {
            verified_by: verified_by.clone(),
            verified_at: now,
        });
        Ok(())
    }

    // ---------------------------------------------------------------- training

    pub fn create_training_material(
        &mut self,
        input: TrainingMaterialInput,
        uploaded_by: &UserId,
        now: MonotonicTimeNs,
    ) -> Result<TrainingMaterialId, StorageError> {
        input.validate()?;
        self.require_profile("training_materials.uploaded_by", uploaded_by)?;
        let material_id = TrainingMaterialId(next_id(&mut self.next_training_material_id));
        self.training_materials.insert(
            material_id,
            TrainingMaterialRecord {
                material_id,
                input,
                uploaded_by: uploaded_by.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(material_id)
    }

    pub fn update_training_material(
        &mut self,
        material_id: TrainingMaterialId,
        input: TrainingMaterialInput,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        input.validate()?;
        let record = self
            .training_materials
            .get_mut(&material_id)
            .ok_or_else(|| StorageError::NotFound {
                table: "training_materials",
                key: material_id.0.to_string(),
            })?;
        record.input = input;
        record.updated_at = record.updated_at.max(now);
        Ok(())
    }

    pub fn training_materials_newest_first(&self) -> Vec<&TrainingMaterialRecord> {
        let mut rows: Vec<&TrainingMaterialRecord> = self.training_materials.values().collect();
        newest_first(&mut rows, |r| (r.created_at, r.material_id.0));
        rows
    }

    pub fn mark_training_complete(
        &mut self,
        orientee_id: OrienteeId,
        material_id: TrainingMaterialId,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        self.require_orientee("training_completions.orientee_id", orientee_id)?;
        if !self.training_materials.contains_key(&material_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "training_completions.material_id",
                key: material_id.0.to_string(),
            });
        }
        let key = (orientee_id, material_id);
        if self.training_completions.contains_key(&key) {
            return Err(StorageError::DuplicateKey {
                table: "training_completions",
                key: format!("{}:{}", orientee_id.0, material_id.0),
            });
        }
        self.training_completions.insert(
            key,
            TrainingCompletionRecord {
                orientee_id,
                material_id,
                completed_at: now,
            },
        );
        Ok(())
    }

    pub fn training_completions_for_orientee(
        &self,
        orientee_id: OrienteeId,
    ) -> Vec<&TrainingCompletionRecord> {
        self.training_completions
            .range((orientee_id, TrainingMaterialId(0))..=(orientee_id, TrainingMaterialId(u64::MAX)))
            .map(|(_, v)| v)
            .collect()
    }

    // --------------------------------------------------------------- messaging

    pub fn create_conversation(
        &mut self,
        input: ConversationInput,
        now: MonotonicTimeNs,
    ) -> Result<ConversationId, StorageError> {
        input.validate()?;
        for participant in &input.participants {
            self.require_profile("conversation_participants.user_id", participant)?;
        }
        let conversation_id = ConversationId(next_id(&mut self.next_conversation_id));
        self.conversations.insert(
            conversation_id,
            ConversationRecord {
                conversation_id,
                name: input.name,
                is_group: input.is_group,
                created_by: input.created_by,
                participants: input.participants,
                created_at: now,
            },
        );
        Ok(conversation_id)
    }

    pub fn get_conversation(&self, conversation_id: ConversationId) -> Option<&ConversationRecord> {
        self.conversations.get(&conversation_id)
    }

    pub fn all_conversations(&self) -> Vec<&ConversationRecord> {
        let mut rows: Vec<&ConversationRecord> = self.conversations.values().collect();
        newest_first(&mut rows, |r| (r.created_at, r.conversation_id.0));
        rows
    }

    pub fn conversations_for_user(&self, user_id: &UserId) -> Vec<&ConversationRecord> {
        self.all_conversations()
            .into_iter()
            .filter(|c| c.participants.contains(user_id))
            .collect()
    }

    pub fn rename_conversation(
        &mut self,
        conversation_id: ConversationId,
        name: Option<String>,
    ) -> Result<(), StorageError> {
        let record = self.conversation_mut(conversation_id)?;
        if record.is_group && name.is_none() {
            return Err(StorageError::ContractViolation(
                ContractViolation::InvalidValue {
                    field: "conversation_record.name",
                    reason: "group conversations must be named",
                },
            ));
        }
        if let Some(n) = &name {
            if n.trim().is_empty() || n.len() > 128 {
                return Err(StorageError::ContractViolation(
                    ContractViolation::InvalidValue {
                        field: "conversation_record.name",
                        reason: "must be non-empty and <= 128 chars",
                    },
                ));
            }
        }
        record.name = name;
        Ok(())
    }

    /// Drops the conversation together with its messages and read marks.
    pub fn delete_conversation(
        &mut self,
        conversation_id: ConversationId,
    ) -> Result<(), StorageError> {
        if self.conversations.remove(&conversation_id).is_none() {
            return Err(StorageError::NotFound {
                table: "conversations",
                key: conversation_id.0.to_string(),
            });
        }
        self.messages
            .retain(|_, m| m.conversation_id != conversation_id);
        self.message_reads
            .retain(|(_, c), _| *c != conversation_id);
        Ok(())
    }

    pub fn send_message(
        &mut self,
        conversation_id: ConversationId,
        sender_id: &UserId,
        content: String,
        now: MonotonicTimeNs,
    ) -> Result<MessageId, StorageError> {
        validate_message_content(&content)?;
        let conversation = self.conversation_mut(conversation_id)?;
        if !conversation.participants.contains(sender_id) {
            return Err(StorageError::Forbidden {
                table: "messages",
                reason: "sender is not a participant",
            });
        }
        let message_id = MessageId(next_id(&mut self.next_message_id));
        self.messages.insert(
            message_id,
            MessageRecord {
                message_id,
                conversation_id,
                sender_id: sender_id.clone(),
                content,
                created_at: now,
                edited_at: None,
            },
        );
        Ok(message_id)
    }

    pub fn edit_message(
        &mut self,
        message_id: MessageId,
        editor_id: &UserId,
        content: String,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        let message = self
            .messages
            .get_mut(&message_id)
            .ok_or_else(|| StorageError::NotFound {
                table: "messages",
                key: message_id.0.to_string(),
            })?;
        if &message.sender_id != editor_id {
            return Err(StorageError::Forbidden {
                table: "messages",
                reason: "only the sender may edit a message",
            });
        }
        let mut next = message.clone();
        next.content = content;
        next.edited_at = Some(now.max(next.created_at));
        next.validate()?;
        *message = next;
        Ok(())
    }

    /// Oldest first.
    pub fn messages_for_conversation(&self, conversation_id: ConversationId) -> Vec<&MessageRecord> {
        let mut rows: Vec<&MessageRecord> = self
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .collect();
        rows.sort_by_key(|m| (m.created_at, m.message_id));
        rows
    }

    pub fn mark_conversation_read(
        &mut self,
        user_id: &UserId,
        conversation_id: ConversationId,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        let conversation = self.conversation_mut(conversation_id)?;
        if !conversation.participants.contains(user_id) {
            return Err(StorageError::Forbidden {
                table: "message_reads",
                reason: "reader is not a participant",
            });
        }
        let mark = self
            .message_reads
            .entry((user_id.clone(), conversation_id))
            .or_insert(now);
        *mark = (*mark).max(now);
        Ok(())
    }

    /// Messages from others that arrived after the user's last read mark,
    /// summed across every conversation the user belongs to.
    pub fn unread_count(&self, user_id: &UserId) -> u32 {
        let mut total = 0_u32;
        for conversation in self.conversations_for_user(user_id) {
            let last_read = self
                .message_reads
                .get(&(user_id.clone(), conversation.conversation_id))
                .copied();
            total += self
                .messages
                .values()
                .filter(|m| m.conversation_id == conversation.conversation_id)
                .filter(|m| &m.sender_id != user_id)
                .filter(|m| last_read.map_or(true, |t| m.created_at > t))
                .count() as u32;
        }
        total
    }

    fn conversation_mut(
        &mut self,
        conversation_id: ConversationId,
    ) -> Result<&mut ConversationRecord, StorageError> {
        self.conversations
            .get_mut(&conversation_id)
            .ok_or_else(|| StorageError::NotFound {
                table: "conversations",
                key: conversation_id.0.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arems_kernel_contracts::progress::Phase;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    fn store_with_fto_and_orientee() -> (AremsStore, OrienteeId) {
        let mut s = AremsStore::new_in_memory();
        s.insert_profile(
            ProfileRecord::v1(
                uid("fto_1"),
                "Chris Vega".to_string(),
                "chris@arems.net".to_string(),
                None,
                Role::Fto,
                MonotonicTimeNs(1),
            )
            .unwrap(),
        )
        .unwrap();
        let input = OrienteeCreateInput::v1(
            PendingContact {
                temp_name: "Jo Park".to_string(),
                temp_email: "Jo.Park@example.org".to_string(),
                temp_phone: None,
            },
            CertLevel::Emt,
            Some("Station 3".to_string()),
            Some("A Shift".to_string()),
            Some(uid("fto_1")),
            day(1),
            None,
            None,
        )
        .unwrap();
        let id = s.create_orientee(input, MonotonicTimeNs(2)).unwrap();
        (s, id)
    }

    fn eval(orientee_id: OrienteeId, d: u32, hours: f64) -> EvaluationInput {
        EvaluationInput::v1(orientee_id, uid("fto_1"), day(d), hours, 4, None, None, vec![])
            .unwrap()
    }

    #[test]
    fn at_store_01_new_orientee_defaults() {
        let (s, id) = store_with_fto_and_orientee();
        let o = s.get_orientee(id).unwrap();
        assert_eq!(o.status, OrienteeStatus::OnTrack);
        assert_eq!(o.hours_completed, 0.0);
        assert_eq!(o.total_hours_base, 96.0);
        assert_eq!(o.user_id, None);
    }

    #[test]
    fn at_store_02_evaluation_credits_hours_and_stamps_prior_phase() {
        let (mut s, id) = store_with_fto_and_orientee();
        s.create_evaluation(eval(id, 2, 12.0), None, MonotonicTimeNs(3))
            .unwrap();
        let second = s
            .create_evaluation(eval(id, 3, 12.0), None, MonotonicTimeNs(4))
            .unwrap();
        let third = s
            .create_evaluation(eval(id, 4, 12.0), None, MonotonicTimeNs(5))
            .unwrap();
        let o = s.get_orientee(id).unwrap();
        assert_eq!(o.hours_completed, 36.0);
        assert_eq!(o.last_evaluation_date, Some(day(4)));
        assert_eq!(
            s.get_evaluation(second).unwrap().phase_at_shift,
            Phase::Familiarization
        );
        assert_eq!(
            s.get_evaluation(third).unwrap().phase_at_shift,
            Phase::GuidedParticipation
        );
    }

    #[test]
    fn at_store_03_idempotent_evaluation_does_not_double_credit() {
        let (mut s, id) = store_with_fto_and_orientee();
        let a = s
            .create_evaluation(eval(id, 2, 12.0), Some("shift-0602".to_string()), MonotonicTimeNs(3))
            .unwrap();
        let b = s
            .create_evaluation(eval(id, 2, 12.0), Some("shift-0602".to_string()), MonotonicTimeNs(4))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(s.get_orientee(id).unwrap().hours_completed, 12.0);
        assert_eq!(s.evaluations_newest_first().len(), 1);
    }

    #[test]
    fn at_store_04_backdated_evaluation_keeps_latest_date() {
        let (mut s, id) = store_with_fto_and_orientee();
        s.create_evaluation(eval(id, 9, 12.0), None, MonotonicTimeNs(3))
            .unwrap();
        s.create_evaluation(eval(id, 5, 12.0), None, MonotonicTimeNs(4))
            .unwrap();
        assert_eq!(s.get_orientee(id).unwrap().last_evaluation_date, Some(day(9)));
        let dates: Vec<NaiveDate> = s
            .evaluations_for_orientee(id)
            .iter()
            .map(|e| e.shift_date)
            .collect();
        assert_eq!(dates, vec![day(9), day(5)]);
    }

    #[test]
    fn at_store_05_evaluation_for_unknown_orientee_is_fk_violation() {
        let (mut s, _) = store_with_fto_and_orientee();
        let r = s.create_evaluation(eval(OrienteeId(99), 2, 12.0), None, MonotonicTimeNs(3));
        assert!(matches!(r, Err(StorageError::ForeignKeyViolation { .. })));
    }

    #[test]
    fn at_store_06_hours_adjustment_validates_before_commit() {
        let (mut s, id) = store_with_fto_and_orientee();
        let bad = HoursAdjustment {
            hours_adjustment: 0.0,
            reason: None,
            adjusted_by: uid("fto_1"),
            corrected_hours_completed: Some(-4.0),
        };
        assert!(s.adjust_orientee_hours(id, bad, MonotonicTimeNs(5)).is_err());
        assert_eq!(s.get_orientee(id).unwrap().adjusted_by, None);

        let ok = HoursAdjustment {
            hours_adjustment: 24.0,
            reason: Some("missed skills week".to_string()),
            adjusted_by: uid("fto_1"),
            corrected_hours_completed: None,
        };
        s.adjust_orientee_hours(id, ok, MonotonicTimeNs(6)).unwrap();
        let o = s.get_orientee(id).unwrap();
        assert_eq!(o.hours_adjustment, 24.0);
        assert_eq!(o.adjusted_by, Some(uid("fto_1")));
    }
}
