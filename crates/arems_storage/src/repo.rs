#![forbid(unsafe_code)]

use arems_kernel_contracts::evaluation::{
    EvaluationId, EvaluationInput, EvaluationRecord, FtoEvaluationId, FtoEvaluationInput,
    FtoEvaluationRecord,
};
use arems_kernel_contracts::message::{
    ConversationId, ConversationInput, ConversationRecord, MessageId, MessageRecord,
};
use arems_kernel_contracts::orientee::{
    OrienteeCreateInput, OrienteeId, OrienteeRecord, OrienteeSnapshot, OrienteeStatus,
};
use arems_kernel_contracts::profile::{ProfileRecord, Role, UserId};
use arems_kernel_contracts::task::{TaskId, TaskInput, TaskRecord};
use arems_kernel_contracts::training::{
    TrainingCompletionRecord, TrainingMaterialId, TrainingMaterialInput, TrainingMaterialRecord,
};
use arems_kernel_contracts::MonotonicTimeNs;

use crate::store::{
    AremsStore, HoursAdjustment, LinkOutcome, OrienteeDetailsUpdate, ProfileDetailsUpdate,
    StorageError,
};

/// Typed repository interface for staff and orientee profiles.
pub trait ProfileRepo {
    fn insert_profile_row(&mut self, record: ProfileRecord) -> Result<(), StorageError>;
    fn update_profile_role_row(
        &mut self,
        user_id: &UserId,
        role: Role,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError>;
    fn update_profile_details_row(
        &mut self,
        user_id: &UserId,
        update: ProfileDetailsUpdate,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError>;

    fn profile_row(&self, user_id: &UserId) -> Option<&ProfileRecord>;
    fn profile_rows_by_name(&self) -> Vec<&ProfileRecord>;
    fn fto_profile_rows(&self) -> Vec<&ProfileRecord>;
}

/// Typed repository interface for the orientee table and its cascades.
pub trait OrienteeRepo {
    fn create_orientee_row(
        &mut self,
        input: OrienteeCreateInput,
        now: MonotonicTimeNs,
    ) -> Result<OrienteeId, StorageError>;
    fn update_orientee_details_row(
        &mut self,
        orientee_id: OrienteeId,
        update: OrienteeDetailsUpdate,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError>;
    fn set_orientee_status_row(
        &mut self,
        orientee_id: OrienteeId,
        status: OrienteeStatus,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError>;
    fn adjust_orientee_hours_row(
        &mut self,
        orientee_id: OrienteeId,
        adjustment: HoursAdjustment,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError>;
    fn set_orientee_archived_row(
        &mut self,
        orientee_id: OrienteeId,
        archived: bool,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError>;
    fn delete_orientee_row(&mut self, orientee_id: OrienteeId) -> Result<(), StorageError>;
    fn link_orientee_by_email_row(
        &mut self,
        user_id: &UserId,
        email: &str,
        now: MonotonicTimeNs,
    ) -> Result<LinkOutcome, StorageError>;

    fn orientee_row(&self, orientee_id: OrienteeId) -> Option<&OrienteeRecord>;
    fn orientee_row_by_user(&self, user_id: &UserId) -> Option<&OrienteeRecord>;
    fn orientee_rows_newest_first(&self) -> Vec<&OrienteeRecord>;
    fn orientee_snapshot_rows(&self) -> Vec<OrienteeSnapshot>;
}

pub trait EvaluationRepo {
    fn create_evaluation_row(
        &mut self,
        input: EvaluationInput,
        idempotency_key: Option<String>,
        now: MonotonicTimeNs,
    ) -> Result<EvaluationId, StorageError>;
    fn create_fto_evaluation_row(
        &mut self,
        input: FtoEvaluationInput,
        now: MonotonicTimeNs,
    ) -> Result<FtoEvaluationId, StorageError>;

    fn evaluation_row(&self, evaluation_id: EvaluationId) -> Option<&EvaluationRecord>;
    fn evaluation_id_for_idempotency_key(
        &self,
        evaluator_id: &UserId,
        idempotency_key: &str,
    ) -> Option<EvaluationId>;
    fn evaluation_rows_newest_first(&self) -> Vec<&EvaluationRecord>;
    fn evaluation_rows_for_orientee(&self, orientee_id: OrienteeId) -> Vec<&EvaluationRecord>;
    fn fto_evaluation_rows_newest_first(&self) -> Vec<&FtoEvaluationRecord>;
    fn fto_evaluation_rows_for_fto(&self, fto_id: &UserId) -> Vec<&FtoEvaluationRecord>;
}

pub trait TaskRepo {
    fn create_task_row(
        &mut self,
        input: TaskInput,
        now: MonotonicTimeNs,
    ) -> Result<TaskId, StorageError>;
    fn verify_task_row(
        &mut self,
        task_id: TaskId,
        verified_by: &UserId,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError>;

    fn task_row(&self, task_id: TaskId) -> Option<&TaskRecord>;
    fn task_rows_newest_first(&self) -> Vec<&TaskRecord>;
    fn task_rows_for_orientee(&self, orientee_id: OrienteeId) -> Vec<&TaskRecord>;
}

pub trait TrainingRepo {
    fn create_training_material_row(
        &mut self,
        input: TrainingMaterialInput,
        uploaded_by: &UserId,
        now: MonotonicTimeNs,
    ) -> Result<TrainingMaterialId, StorageError>;
    fn update_training_material_row(
        &mut self,
        material_id: TrainingMaterialId,
        input: TrainingMaterialInput,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError>;
    fn mark_training_complete_row(
        &mut self,
        orientee_id: OrienteeId,
        material_id: TrainingMaterialId,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError>;

    fn training_material_rows_newest_first(&self) -> Vec<&TrainingMaterialRecord>;
    fn training_completion_rows_for_orientee(
        &self,
        orientee_id: OrienteeId,
    ) -> Vec<&TrainingCompletionRecord>;
}

pub trait MessagingRepo {
    fn create_conversation_row(
        &mut self,
        input: ConversationInput,
        now: MonotonicTimeNs,
    ) -> Result<ConversationId, StorageError>;
    fn rename_conversation_row(
        &mut self,
        conversation_id: ConversationId,
        name: Option<String>,
    ) -> Result<(), StorageError>;
    fn delete_conversation_row(&mut self, conversation_id: ConversationId)
        -> Result<(), StorageError>;
    fn send_message_row(
        &mut self,
        conversation_id: ConversationId,
        sender_id: &UserId,
        content: String,
        now: MonotonicTimeNs,
    ) -> Result<MessageId, StorageError>;
    fn edit_message_row(
        &mut self,
        message_id: MessageId,
        editor_id: &UserId,
        content: String,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError>;
    fn mark_conversation_read_row(
        &mut self,
        user_id: &UserId,
        conversation_id: ConversationId,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError>;

    fn conversation_row(&self, conversation_id: ConversationId) -> Option<&ConversationRecord>;
    fn conversation_rows_for_user(&self, user_id: &UserId) -> Vec<&ConversationRecord>;
    fn all_conversation_rows(&self) -> Vec<&ConversationRecord>;
    fn message_rows_for_conversation(&self, conversation_id: ConversationId)
        -> Vec<&MessageRecord>;
    fn unread_message_count(&self, user_id: &UserId) -> u32;
}

/// Everything the orchestration layer needs from a backing store.
pub trait AremsRepo:
    ProfileRepo + OrienteeRepo + EvaluationRepo + TaskRepo + TrainingRepo + MessagingRepo
{
}

impl<T> AremsRepo for T where
    T: ProfileRepo + OrienteeRepo + EvaluationRepo + TaskRepo + TrainingRepo + MessagingRepo
{
}

impl ProfileRepo for AremsStore {
    fn insert_profile_row(&mut self, record: ProfileRecord) -> Result<(), StorageError> {
        self.insert_profile(record)
    }

    fn update_profile_role_row(
        &mut self,
        user_id: &UserId,
        role: Role,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        self.update_profile_role(user_id, role, now)
    }

    fn update_profile_details_row(
        &mut self,
        user_id: &UserId,
        update: ProfileDetailsUpdate,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        self.update_profile_details(user_id, update, now)
    }

    fn profile_row(&self, user_id: &UserId) -> Option<&ProfileRecord> {
        self.get_profile(user_id)
    }

    fn profile_rows_by_name(&self) -> Vec<&ProfileRecord> {
        self.profiles_by_name()
    }

    fn fto_profile_rows(&self) -> Vec<&ProfileRecord> {
        self.fto_profiles()
    }
}

impl OrienteeRepo for AremsStore {
    fn create_orientee_row(
        &mut self,
        input: OrienteeCreateInput,
        now: MonotonicTimeNs,
    ) -> Result<OrienteeId, StorageError> {
        self.create_orientee(input, now)
    }

    fn update_orientee_details_row(
        &mut self,
        orientee_id: OrienteeId,
        update: OrienteeDetailsUpdate,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        self.update_orientee_details(orientee_id, update, now)
    }

    fn set_orientee_status_row(
        &mut self,
        orientee_id: OrienteeId,
        status: OrienteeStatus,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        self.set_orientee_status(orientee_id, status, now)
    }

    fn adjust_orientee_hours_row(
        &mut self,
        orientee_id: OrienteeId,
        adjustment: HoursAdjustment,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        self.adjust_orientee_hours(orientee_id, adjustment, now)
    }

    fn set_orientee_archived_row(
        &mut self,
        orientee_id: OrienteeId,
        archived: bool,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        self.set_orientee_archived(orientee_id, archived, now)
    }

    fn delete_orientee_row(&mut self, orientee_id: OrienteeId) -> Result<(), StorageError> {
        self.delete_orientee(orientee_id)
    }

    fn link_orientee_by_email_row(
        &mut self,
        user_id: &UserId,
        email: &str,
        now: MonotonicTimeNs,
    ) -> Result<LinkOutcome, StorageError> {
        self.link_orientee_by_email(user_id, email, now)
    }

    fn orientee_row(&self, orientee_id: OrienteeId) -> Option<&OrienteeRecord> {
        self.get_orientee(orientee_id)
    }

    fn orientee_row_by_user(&self, user_id: &UserId) -> Option<&OrienteeRecord> {
        self.orientee_by_user(user_id)
    }

    fn orientee_rows_newest_first(&self) -> Vec<&OrienteeRecord> {
        self.orientees_newest_first()
    }

    fn orientee_snapshot_rows(&self) -> Vec<OrienteeSnapshot> {
        self.orientee_snapshots()
    }
}

impl EvaluationRepo for AremsStore {
    fn create_evaluation_row(
        &mut self,
        input: EvaluationInput,
        idempotency_key: Option<String>,
        now: MonotonicTimeNs,
    ) -> Result<EvaluationId, StorageError> {
        self.create_evaluation(input, idempotency_key, now)
    }

    fn create_fto_evaluation_row(
        &mut self,
        input: FtoEvaluationInput,
        now: MonotonicTimeNs,
    ) -> Result<FtoEvaluationId, StorageError> {
        self.create_fto_evaluation(input, now)
    }

    fn evaluation_row(&self, evaluation_id: EvaluationId) -> Option<&EvaluationRecord> {
        self.get_evaluation(evaluation_id)
    }

    fn evaluation_id_for_idempotency_key(
        &self,
        evaluator_id: &UserId,
        idempotency_key: &str,
    ) -> Option<EvaluationId> {
        self.evaluation_for_idempotency_key(evaluator_id, idempotency_key)
    }

    fn evaluation_rows_newest_first(&self) -> Vec<&EvaluationRecord> {
        self.evaluations_newest_first()
    }

    fn evaluation_rows_for_orientee(&self, orientee_id: OrienteeId) -> Vec<&EvaluationRecord> {
        self.evaluations_for_orientee(orientee_id)
    }

    fn fto_evaluation_rows_newest_first(&self) -> Vec<&FtoEvaluationRecord> {
        self.fto_evaluations_newest_first()
    }

    fn fto_evaluation_rows_for_fto(&self, fto_id: &UserId) -> Vec<&FtoEvaluationRecord> {
        self.fto_evaluations_for_fto(fto_id)
    }
}

impl TaskRepo for AremsStore {
    fn create_task_row(
        &mut self,
        input: TaskInput,
        now: MonotonicTimeNs,
    ) -> Result<TaskId, StorageError> {
        self.create_task(input, now)
    }

    fn verify_task_row(
        &mut self,
        task_id: TaskId,
        verified_by: &UserId,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        self.verify_task(task_id, verified_by, now)
    }

    fn task_row(&self, task_id: TaskId) -> Option<&TaskRecord> {
        self.get_task(task_id)
    }

    fn task_rows_newest_first(&self) -> Vec<&TaskRecord> {
        self.tasks_newest_first()
    }

    fn task_rows_for_orientee(&self, orientee_id: OrienteeId) -> Vec<&TaskRecord> {
        self.tasks_for_orientee(orientee_id)
    }
}

impl TrainingRepo for AremsStore {
    fn create_training_material_row(
        &mut self,
        input: TrainingMaterialInput,
        uploaded_by: &UserId,
        now: MonotonicTimeNs,
    ) -> Result<TrainingMaterialId, StorageError> {
        self.create_training_material(input, uploaded_by, now)
    }

    fn update_training_material_row(
        &mut self,
        material_id: TrainingMaterialId,
        input: TrainingMaterialInput,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        self.update_training_material(material_id, input, now)
    }

    fn mark_training_complete_row(
        &mut self,
        orientee_id: OrienteeId,
        material_id: TrainingMaterialId,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        self.mark_training_complete(orientee_id, material_id, now)
    }

    fn training_material_rows_newest_first(&self) -> Vec<&TrainingMaterialRecord> {
        self.training_materials_newest_first()
    }

    fn training_completion_rows_for_orientee(
        &self,
        orientee_id: OrienteeId,
    ) -> Vec<&TrainingCompletionRecord> {
        self.training_completions_for_orientee(orientee_id)
    }
}

impl MessagingRepo for AremsStore {
    fn create_conversation_row(
        &mut self,
        input: ConversationInput,
        now: MonotonicTimeNs,
    ) -> Result<ConversationId, StorageError> {
        self.create_conversation(input, now)
    }

    fn rename_conversation_row(
        &mut self,
        conversation_id: ConversationId,
        name: Option<String>,
    ) -> Result<(), StorageError> {
        self.rename_conversation(conversation_id, name)
    }

    fn delete_conversation_row(
        &mut self,
        conversation_id: ConversationId,
    ) -> Result<(), StorageError> {
        self.delete_conversation(conversation_id)
    }

    fn send_message_row(
        &mut self,
        conversation_id: ConversationId,
        sender_id: &UserId,
        content: String,
        now: MonotonicTimeNs,
    ) -> Result<MessageId, StorageError> {
        self.send_message(conversation_id, sender_id, content, now)
    }

    fn edit_message_row(
        &mut self,
        message_id: MessageId,
        editor_id: &UserId,
        content: String,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        self.edit_message(message_id, editor_id, content, now)
    }

    fn mark_conversation_read_row(
        &mut self,
        user_id: &UserId,
        conversation_id: ConversationId,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        self.mark_conversation_read(user_id, conversation_id, now)
    }

    fn conversation_row(&self, conversation_id: ConversationId) -> Option<&ConversationRecord> {
        self.get_conversation(conversation_id)
    }

    fn conversation_rows_for_user(&self, user_id: &UserId) -> Vec<&ConversationRecord> {
        self.conversations_for_user(user_id)
    }

    fn all_conversation_rows(&self) -> Vec<&ConversationRecord> {
        self.all_conversations()
    }

    fn message_rows_for_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Vec<&MessageRecord> {
        self.messages_for_conversation(conversation_id)
    }

    fn unread_message_count(&self, user_id: &UserId) -> u32 {
        self.unread_count(user_id)
    }
}
