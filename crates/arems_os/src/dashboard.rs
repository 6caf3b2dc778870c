#![forbid(unsafe_code)]

use arems_engines::feedback::{tally_tasks, tally_training, CompletionTally};
use arems_engines::progress::{compute_dashboard_stats, orientee_progress};
use arems_kernel_contracts::evaluation::EvaluationId;
use arems_kernel_contracts::orientee::{CertLevel, OrienteeId, OrienteeRecord, OrienteeStatus};
use arems_kernel_contracts::progress::{DashboardStats, OrienteeProgress, Phase};
use arems_kernel_contracts::profile::UserId;
use arems_storage::repo::AremsRepo;
use chrono::NaiveDate;

/// Evaluations shown on an orientee's own dashboard.
pub const RECENT_EVALUATION_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub orientee_id: OrienteeId,
    pub display_name: String,
    pub cert_level: CertLevel,
    pub station: Option<String>,
    pub status: OrienteeStatus,
    pub hours_completed: f64,
    pub lead_fto_name: Option<String>,
    pub last_evaluation_date: Option<NaiveDate>,
    pub progress: OrienteeProgress,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaffDashboard {
    pub stats: DashboardStats,
    pub roster: Vec<RosterEntry>,
    pub unread_messages: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecentEvaluation {
    pub evaluation_id: EvaluationId,
    pub shift_date: NaiveDate,
    pub hours_logged: f64,
    pub overall_rating: u8,
    pub evaluator_name: Option<String>,
    pub phase_at_shift: Phase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrienteeDashboard {
    pub orientee_id: OrienteeId,
    pub display_name: String,
    pub status: OrienteeStatus,
    pub hours_completed: f64,
    pub progress: OrienteeProgress,
    pub recent_evaluations: Vec<RecentEvaluation>,
    pub tasks: CompletionTally,
    pub training: CompletionTally,
    pub unread_messages: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardView {
    Staff(StaffDashboard),
    Orientee(Box<OrienteeDashboard>),
    /// Orientee account that has not been matched to a roster row yet.
    Unlinked,
}

pub fn roster_entry<R: AremsRepo>(repo: &R, record: &OrienteeRecord) -> RosterEntry {
    let lead_fto_name = record
        .lead_fto_id
        .as_ref()
        .and_then(|id| repo.profile_row(id))
        .map(|p| p.full_name.clone());
    RosterEntry {
        orientee_id: record.orientee_id,
        display_name: display_name(repo, record),
        cert_level: record.cert_level,
        station: record.station.clone(),
        status: record.status,
        hours_completed: record.hours_completed,
        lead_fto_name,
        last_evaluation_date: record.last_evaluation_date,
        progress: orientee_progress(&record.snapshot()),
    }
}

/// Linked orientees show their profile name, others the name captured at intake.
pub fn display_name<R: AremsRepo>(repo: &R, record: &OrienteeRecord) -> String {
    record
        .user_id
        .as_ref()
        .and_then(|id| repo.profile_row(id))
        .map(|p| p.full_name.clone())
        .unwrap_or_else(|| record.display_name().to_string())
}

/// Stats cover every stored orientee; the roster lists only active, unarchived ones.
pub fn staff_dashboard<R: AremsRepo>(repo: &R, viewer: &UserId) -> StaffDashboard {
    let stats = compute_dashboard_stats(&repo.orientee_snapshot_rows());
    let roster = repo
        .orientee_rows_newest_first()
        .into_iter()
        .filter(|o| o.status.is_active() && !o.is_archived)
        .map(|o| roster_entry(repo, o))
        .collect();
    StaffDashboard {
        stats,
        roster,
        unread_messages: repo.unread_message_count(viewer),
    }
}

pub fn orientee_dashboard<R: AremsRepo>(
    repo: &R,
    viewer: &UserId,
    record: &OrienteeRecord,
) -> OrienteeDashboard {
    let recent_evaluations = repo
        .evaluation_rows_for_orientee(record.orientee_id)
        .into_iter()
        .take(RECENT_EVALUATION_LIMIT)
        .map(|e| RecentEvaluation {
            evaluation_id: e.evaluation_id,
            shift_date: e.shift_date,
            hours_logged: e.hours_logged,
            overall_rating: e.overall_rating.get(),
            evaluator_name: repo.profile_row(&e.evaluator_id).map(|p| p.full_name.clone()),
            phase_at_shift: e.phase_at_shift,
        })
        .collect();
    let tasks = tally_tasks(&repo.task_rows_for_orientee(record.orientee_id));
    let training = tally_training(
        &repo.training_material_rows_newest_first(),
        &repo.training_completion_rows_for_orientee(record.orientee_id),
    );
    OrienteeDashboard {
        orientee_id: record.orientee_id,
        display_name: display_name(repo, record),
        status: record.status,
        hours_completed: record.hours_completed,
        progress: orientee_progress(&record.snapshot()),
        recent_evaluations,
        tasks,
        training,
        unread_messages: repo.unread_message_count(viewer),
    }
}
