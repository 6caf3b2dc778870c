#![forbid(unsafe_code)]

//! Phase and progress derivation for orientees.
//!
//! Everything here is a pure function of its arguments. Callers own the
//! snapshot; nothing is cached between calls.

use arems_kernel_contracts::orientee::{OrienteeSnapshot, OrienteeStatus};
use arems_kernel_contracts::progress::{
    DashboardStats, DivisionGuardError, OrienteeProgress, Phase, CLEARANCE_FLOOR_HOURS,
    GUIDED_PARTICIPATION_FLOOR_HOURS, INDEPENDENCE_FLOOR_HOURS,
};

/// Maps cumulative hours onto a phase using lower-inclusive breakpoints.
///
/// Negative and NaN input fall through to [`Phase::Familiarization`].
pub fn phase(hours_completed: f64) -> Phase {
    if hours_completed >= CLEARANCE_FLOOR_HOURS {
        Phase::Clearance
    } else if hours_completed >= INDEPENDENCE_FLOOR_HOURS {
        Phase::Independence
    } else if hours_completed >= GUIDED_PARTICIPATION_FLOOR_HOURS {
        Phase::GuidedParticipation
    } else {
        Phase::Familiarization
    }
}

/// Target hours after adjustment. May be zero or negative; callers guard the division.
pub fn effective_total_hours(total_hours_base: f64, hours_adjustment: f64) -> f64 {
    total_hours_base + hours_adjustment
}

/// Whole percent of the effective target, rounded half-up. Errs when the target is not positive.
pub fn progress_percent(
    hours_completed: f64,
    total_hours_base: f64,
    hours_adjustment: f64,
) -> Result<i64, DivisionGuardError> {
    raw_progress_percent(hours_completed, total_hours_base, hours_adjustment)
        .map(round_half_up)
}

/// Visual width for a progress bar. Display-only; the raw percent stays uncapped.
pub fn progress_bar_width(percent: i64) -> u8 {
    percent.clamp(0, 100) as u8
}

pub fn orientee_progress(snapshot: &OrienteeSnapshot) -> OrienteeProgress {
    let effective =
        effective_total_hours(snapshot.total_hours_base, snapshot.hours_adjustment);
    OrienteeProgress {
        phase: phase(snapshot.hours_completed),
        progress_percent: progress_percent(
            snapshot.hours_completed,
            snapshot.total_hours_base,
            snapshot.hours_adjustment,
        )
        .ok(),
        effective_total_hours: effective,
        hours_remaining: (effective - snapshot.hours_completed).max(0.0),
    }
}

/// Summarises a population snapshot.
///
/// Active orientees whose effective total is not positive are counted as
/// active but left out of the average entirely; `guarded_orientees` reports
/// how many were skipped.
pub fn compute_dashboard_stats(orientees: &[OrienteeSnapshot]) -> DashboardStats {
    let mut stats = DashboardStats::default();
    let mut percent_sum = 0.0_f64;
    let mut averaged = 0_u32;

    for o in orientees {
        if o.status.is_at_risk() {
            stats.at_risk_count += 1;
        }
        if o.status == OrienteeStatus::PendingClearance {
            stats.pending_clearance += 1;
        }
        if !o.status.is_active() {
            continue;
        }
        stats.active_orientees += 1;
        match raw_progress_percent(o.hours_completed, o.total_hours_base, o.hours_adjustment) {
            Ok(p) => {
                percent_sum += p;
                averaged += 1;
            }
            Err(_) => stats.guarded_orientees += 1,
        }
    }

    if averaged > 0 {
        stats.avg_progress = round_half_up(percent_sum / f64::from(averaged));
    }
    stats
}

fn raw_progress_percent(
    hours_completed: f64,
    total_hours_base: f64,
    hours_adjustment: f64,
) -> Result<f64, DivisionGuardError> {
    let effective = effective_total_hours(total_hours_base, hours_adjustment);
    // `!(x > 0)` also catches NaN.
    if !(effective > 0.0) {
        return Err(DivisionGuardError {
            total_hours_base,
            hours_adjustment,
        });
    }
    Ok(hours_completed / effective * 100.0)
}

fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}
