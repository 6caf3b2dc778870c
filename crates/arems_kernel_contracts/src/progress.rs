#![forbid(unsafe_code)]

use serde::Serialize;
use thiserror::Error;

/// Cumulative-hours floor of each phase after the first.
pub const GUIDED_PARTICIPATION_FLOOR_HOURS: f64 = 24.0;
pub const INDEPENDENCE_FLOOR_HOURS: f64 = 64.0;
pub const CLEARANCE_FLOOR_HOURS: f64 = 88.0;

pub const DEFAULT_TOTAL_HOURS: f64 = 96.0;

/// Field-training stage. Always derived from hours, never stored on an orientee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Familiarization,
    GuidedParticipation,
    Independence,
    Clearance,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Familiarization,
        Phase::GuidedParticipation,
        Phase::Independence,
        Phase::Clearance,
    ];

    pub fn number(self) -> u8 {
        match self {
            Phase::Familiarization => 1,
            Phase::GuidedParticipation => 2,
            Phase::Independence => 3,
            Phase::Clearance => 4,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Phase::Familiarization),
            2 => Some(Phase::GuidedParticipation),
            3 => Some(Phase::Independence),
            4 => Some(Phase::Clearance),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Familiarization => "Familiarization",
            Phase::GuidedParticipation => "Guided Participation",
            Phase::Independence => "Independence",
            Phase::Clearance => "Clearance",
        }
    }

    /// Lower-inclusive hours bound of this phase.
    pub fn hours_floor(self) -> f64 {
        match self {
            Phase::Familiarization => 0.0,
            Phase::GuidedParticipation => GUIDED_PARTICIPATION_FLOOR_HOURS,
            Phase::Independence => INDEPENDENCE_FLOOR_HOURS,
            Phase::Clearance => CLEARANCE_FLOOR_HOURS,
        }
    }
}

/// Raised when an orientee's effective target hours is zero or negative.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("effective total hours must be > 0 (base {total_hours_base} + adjustment {hours_adjustment})")]
pub struct DivisionGuardError {
    pub total_hours_base: f64,
    pub hours_adjustment: f64,
}

impl DivisionGuardError {
    pub fn effective_total(&self) -> f64 {
        self.total_hours_base + self.hours_adjustment
    }
}

/// Population summary shown on the staff dashboard.
///
/// `avg_progress` is not capped at 100: over-completed orientees pull the mean up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct DashboardStats {
    pub active_orientees: u32,
    pub at_risk_count: u32,
    pub pending_clearance: u32,
    pub avg_progress: i64,
    /// Active orientees left out of `avg_progress` by the division guard.
    pub guarded_orientees: u32,
}

/// Derived progress for one orientee, recomputed on every read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrienteeProgress {
    pub phase: Phase,
    pub progress_percent: Option<i64>,
    pub effective_total_hours: f64,
    pub hours_remaining: f64,
}
