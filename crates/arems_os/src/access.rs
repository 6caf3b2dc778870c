#![forbid(unsafe_code)]

use arems_kernel_contracts::profile::{Role, UserId};
use arems_kernel_contracts::ReasonCodeId;
use thiserror::Error;

pub mod reason_codes {
    use arems_kernel_contracts::ReasonCodeId;

    // Access reason-code namespace.
    pub const ACCESS_DENIED_ROLE: ReasonCodeId = ReasonCodeId(0xAC00_0001);
    pub const ACCESS_DENIED_UNKNOWN_ACTOR: ReasonCodeId = ReasonCodeId(0xAC00_0002);
    pub const ACCESS_DENIED_NOT_OWNER: ReasonCodeId = ReasonCodeId(0xAC00_0003);
    pub const ACCESS_DENIED_NOT_LINKED: ReasonCodeId = ReasonCodeId(0xAC00_0004);
}

/// Operations that are gated by the caller's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessAction {
    ViewDashboard,
    ViewOrienteeRoster,
    ViewFtoFeedback,
    ViewTrainingMaterials,
    CreateEvaluation,
    CreateTask,
    VerifyTask,
    CreateOrientee,
    UpdateOrientee,
    ManageTrainingMaterials,
    UpdateRoles,
    AdjustHours,
    DeleteOrientee,
    ViewRecords,
    ViewAllConversations,
    CompleteTraining,
    RateFto,
    Messaging,
}

impl AccessAction {
    pub const ALL: [AccessAction; 18] = [
        AccessAction::ViewDashboard,
        AccessAction::ViewOrienteeRoster,
        AccessAction::ViewFtoFeedback,
        AccessAction::ViewTrainingMaterials,
        AccessAction::CreateEvaluation,
        AccessAction::CreateTask,
        AccessAction::VerifyTask,
        AccessAction::CreateOrientee,
        AccessAction::UpdateOrientee,
        AccessAction::ManageTrainingMaterials,
        AccessAction::UpdateRoles,
        AccessAction::AdjustHours,
        AccessAction::DeleteOrientee,
        AccessAction::ViewRecords,
        AccessAction::ViewAllConversations,
        AccessAction::CompleteTraining,
        AccessAction::RateFto,
        AccessAction::Messaging,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AccessAction::ViewDashboard => "view_dashboard",
            AccessAction::ViewOrienteeRoster => "view_orientee_roster",
            AccessAction::ViewFtoFeedback => "view_fto_feedback",
            AccessAction::ViewTrainingMaterials => "view_training_materials",
            AccessAction::CreateEvaluation => "create_evaluation",
            AccessAction::CreateTask => "create_task",
            AccessAction::VerifyTask => "verify_task",
            AccessAction::CreateOrientee => "create_orientee",
            AccessAction::UpdateOrientee => "update_orientee",
            AccessAction::ManageTrainingMaterials => "manage_training_materials",
            AccessAction::UpdateRoles => "update_roles",
            AccessAction::AdjustHours => "adjust_hours",
            AccessAction::DeleteOrientee => "delete_orientee",
            AccessAction::ViewRecords => "view_records",
            AccessAction::ViewAllConversations => "view_all_conversations",
            AccessAction::CompleteTraining => "complete_training",
            AccessAction::RateFto => "rate_fto",
            AccessAction::Messaging => "messaging",
        }
    }
}

pub fn access_allowed(role: Role, action: AccessAction) -> bool {
    use AccessAction as A;
    match action {
        A::ViewDashboard | A::ViewTrainingMaterials => true,
        A::ViewOrienteeRoster
        | A::ViewFtoFeedback
        | A::CreateTask
        | A::VerifyTask
        | A::CreateOrientee
        | A::UpdateOrientee => role.is_training_officer(),
        A::CreateEvaluation => role.is_training_officer() || role == Role::Employee,
        A::ManageTrainingMaterials
        | A::UpdateRoles
        | A::AdjustHours
        | A::DeleteOrientee
        | A::ViewRecords
        | A::ViewAllConversations => role == Role::Admin,
        A::CompleteTraining | A::RateFto => role == Role::Orientee,
        A::Messaging => role != Role::Employee,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("no profile for actor {0}")]
    UnknownActor(String),
    #[error("role {role} may not {action}")]
    Denied {
        role: &'static str,
        action: &'static str,
        reason_code: ReasonCodeId,
    },
    #[error("actor may not act on {0} owned by another user")]
    NotOwner(&'static str),
    #[error("actor has no linked orientee record")]
    NotLinked,
}

impl AccessError {
    pub fn reason_code(&self) -> ReasonCodeId {
        match self {
            AccessError::UnknownActor(_) => reason_codes::ACCESS_DENIED_UNKNOWN_ACTOR,
            AccessError::Denied { reason_code, .. } => *reason_code,
            AccessError::NotOwner(_) => reason_codes::ACCESS_DENIED_NOT_OWNER,
            AccessError::NotLinked => reason_codes::ACCESS_DENIED_NOT_LINKED,
        }
    }
}

pub fn require_access(role: Role, action: AccessAction) -> Result<(), AccessError> {
    if access_allowed(role, action) {
        Ok(())
    } else {
        Err(AccessError::Denied {
            role: role.as_str(),
            action: action.as_str(),
            reason_code: reason_codes::ACCESS_DENIED_ROLE,
        })
    }
}

/// Resolved caller of a service operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub full_name: String,
}

impl Actor {
    pub fn require(&self, action: AccessAction) -> Result<(), AccessError> {
        require_access(self.role, action)
    }
}
