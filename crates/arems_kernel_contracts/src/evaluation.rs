#![forbid(unsafe_code)]

use chrono::NaiveDate;

use crate::common::{require_finite, require_optional_text};
use crate::orientee::OrienteeId;
use crate::profile::UserId;
use crate::progress::Phase;
use crate::{ContractViolation, MonotonicTimeNs, Rating, SchemaVersion, Validate};

pub const EVALUATION_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Upper bound on hours creditable from a single shift.
pub const MAX_HOURS_PER_SHIFT: f64 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EvaluationId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FtoEvaluationId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationInput {
    pub schema_version: SchemaVersion,
    pub orientee_id: OrienteeId,
    pub evaluator_id: UserId,
    pub shift_date: NaiveDate,
    pub hours_logged: f64,
    pub overall_rating: Rating,
    pub strengths: Option<String>,
    pub improvements: Option<String>,
    pub daily_tasks: Vec<String>,
}

impl EvaluationInput {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        orientee_id: OrienteeId,
        evaluator_id: UserId,
        shift_date: NaiveDate,
        hours_logged: f64,
        overall_rating: u8,
        strengths: Option<String>,
        improvements: Option<String>,
        daily_tasks: Vec<String>,
    ) -> Result<Self, ContractViolation> {
        let input = Self {
            schema_version: EVALUATION_CONTRACT_VERSION,
            orientee_id,
            evaluator_id,
            shift_date,
            hours_logged,
            overall_rating: Rating::new("evaluation_input.overall_rating", overall_rating)?,
            strengths,
            improvements,
            daily_tasks,
        };
        input.validate()?;
        Ok(input)
    }
}

impl Validate for EvaluationInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != EVALUATION_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "evaluation_input.schema_version",
                reason: "must match EVALUATION_CONTRACT_VERSION",
            });
        }
        require_finite("evaluation_input.hours_logged", self.hours_logged)?;
        if !(0.0..=MAX_HOURS_PER_SHIFT).contains(&self.hours_logged) {
            return Err(ContractViolation::InvalidRange {
                field: "evaluation_input.hours_logged",
                min: 0.0,
                max: MAX_HOURS_PER_SHIFT,
                got: self.hours_logged,
            });
        }
        require_optional_text("evaluation_input.strengths", self.strengths.as_deref(), 4096)?;
        require_optional_text(
            "evaluation_input.improvements",
            self.improvements.as_deref(),
            4096,
        )?;
        if self.daily_tasks.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "evaluation_input.daily_tasks",
                reason: "must contain <= 64 entries",
            });
        }
        for task in &self.daily_tasks {
            if task.trim().is_empty() || task.len() > 256 {
                return Err(ContractViolation::InvalidValue {
                    field: "evaluation_input.daily_tasks",
                    reason: "entries must be non-empty and <= 256 chars",
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRecord {
    pub schema_version: SchemaVersion,
    pub evaluation_id: EvaluationId,
    pub orientee_id: OrienteeId,
    pub evaluator_id: UserId,
    pub shift_date: NaiveDate,
    pub hours_logged: f64,
    pub overall_rating: Rating,
    pub strengths: Option<String>,
    pub improvements: Option<String>,
    pub daily_tasks: Vec<String>,
    /// Phase the orientee was in when the shift was worked. Historical, not live.
    pub phase_at_shift: Phase,
    pub created_at: MonotonicTimeNs,
}

impl EvaluationRecord {
    pub fn from_input_v1(
        evaluation_id: EvaluationId,
        input: EvaluationInput,
        phase_at_shift: Phase,
        created_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        input.validate()?;
        Ok(Self {
            schema_version: EVALUATION_CONTRACT_VERSION,
            evaluation_id,
            orientee_id: input.orientee_id,
            evaluator_id: input.evaluator_id,
            shift_date: input.shift_date,
            hours_logged: input.hours_logged,
            overall_rating: input.overall_rating,
            strengths: input.strengths,
            improvements: input.improvements,
            daily_tasks: input.daily_tasks,
            phase_at_shift,
            created_at,
        })
    }
}

/// Orientee's rating of the field training officer who precepted them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtoEvaluationInput {
    pub schema_version: SchemaVersion,
    pub fto_id: UserId,
    pub orientee_id: OrienteeId,
    pub overall_rating: Rating,
    pub communication_rating: Rating,
    pub teaching_rating: Rating,
    pub support_rating: Rating,
    pub feedback: Option<String>,
}

impl FtoEvaluationInput {
    pub fn v1(
        fto_id: UserId,
        orientee_id: OrienteeId,
        ratings: [u8; 4],
        feedback: Option<String>,
    ) -> Result<Self, ContractViolation> {
        let [overall, communication, teaching, support] = ratings;
        let input = Self {
            schema_version: EVALUATION_CONTRACT_VERSION,
            fto_id,
            orientee_id,
            overall_rating: Rating::new("fto_evaluation_input.overall_rating", overall)?,
            communication_rating: Rating::new(
                "fto_evaluation_input.communication_rating",
                communication,
            )?,
            teaching_rating: Rating::new("fto_evaluation_input.teaching_rating", teaching)?,
            support_rating: Rating::new("fto_evaluation_input.support_rating", support)?,
            feedback,
        };
        input.validate()?;
        Ok(input)
    }
}

impl Validate for FtoEvaluationInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != EVALUATION_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "fto_evaluation_input.schema_version",
                reason: "must match EVALUATION_CONTRACT_VERSION",
            });
        }
        require_optional_text("fto_evaluation_input.feedback", self.feedback.as_deref(), 4096)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtoEvaluationRecord {
    pub fto_evaluation_id: FtoEvaluationId,
    pub input: FtoEvaluationInput,
    pub created_at: MonotonicTimeNs,
}

impl FtoEvaluationRecord {
    pub fn ratings(&self) -> [Rating; 4] {
        [
            self.input.overall_rating,
            self.input.communication_rating,
            self.input.teaching_rating,
            self.input.support_rating,
        ]
    }
}
