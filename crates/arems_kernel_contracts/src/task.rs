#![forbid(unsafe_code)]

use chrono::NaiveDate;

use crate::common::{require_optional_text, require_text};
use crate::orientee::OrienteeId;
use crate::profile::UserId;
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const TASK_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInput {
    pub schema_version: SchemaVersion,
    pub title: String,
    pub description: Option<String>,
    pub assigned_to: OrienteeId,
    pub assigned_by: UserId,
    pub due_date: Option<NaiveDate>,
}

impl TaskInput {
    pub fn v1(
        title: String,
        description: Option<String>,
        assigned_to: OrienteeId,
        assigned_by: UserId,
        due_date: Option<NaiveDate>,
    ) -> Result<Self, ContractViolation> {
        let input = Self {
            schema_version: TASK_CONTRACT_VERSION,
            title,
            description,
            assigned_to,
            assigned_by,
            due_date,
        };
        input.validate()?;
        Ok(input)
    }
}

impl Validate for TaskInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != TASK_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "task_input.schema_version",
                reason: "must match TASK_CONTRACT_VERSION",
            });
        }
        require_text("task_input.title", &self.title, 256)?;
        require_optional_text("task_input.description", self.description.as_deref(), 4096)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskVerification {
    pub verified_by: UserId,
    pub verified_at: MonotonicTimeNs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub input: TaskInput,
    pub status: TaskStatus,
    pub verification: Option<TaskVerification>,
    pub created_at: MonotonicTimeNs,
}

impl Validate for TaskRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.input.validate()?;
        match (self.status, self.verification.is_some()) {
            (TaskStatus::Pending, false) | (TaskStatus::Completed, true) => Ok(()),
            (TaskStatus::Pending, true) => Err(ContractViolation::InvalidValue {
                field: "task_record.verification",
                reason: "must be None while pending",
            }),
            (TaskStatus::Completed, false) => Err(ContractViolation::InvalidValue {
                field: "task_record.verification",
                reason: "must be Some(...) once completed",
            }),
        }
    }
}
