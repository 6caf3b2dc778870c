#![forbid(unsafe_code)]

use std::path::PathBuf;

use arems_engines::notify::{
    EvaluationNotice, EvaluationNotifier, NotifyError, ResendConfig, ResendNotifier, ENV_API_KEY,
};
use arems_engines::progress::{orientee_progress, phase, progress_bar_width};
use arems_kernel_contracts::orientee::{OrienteeSnapshot, OrienteeStatus};
use arems_kernel_contracts::progress::DEFAULT_TOTAL_HOURS;
use arems_kernel_contracts::{ContractViolation, Rating};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::info;

use crate::stats::{render_stats, stats_from_file, StatsFileError};

#[derive(Debug, Parser)]
#[command(name = "arems", about = "Orientation progress calculator and operator checks")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Print the phase for a cumulative hours figure.
    Phase {
        #[arg(allow_negative_numbers = true)]
        hours: f64,
    },
    /// Print phase, percent and remaining hours.
    Progress {
        #[arg(allow_negative_numbers = true)]
        hours: f64,
        #[arg(default_value_t = DEFAULT_TOTAL_HOURS)]
        total: f64,
        #[arg(default_value_t = 0.0, allow_negative_numbers = true)]
        adjustment: f64,
    },
    /// Dashboard stats for a JSON array of orientee rows.
    Stats {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Send a sample evaluation notice through the configured mail provider.
    NotifyTest {
        #[arg(long)]
        to: String,
        #[arg(long, default_value = "Test Orientee")]
        orientee: String,
    },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Contract(#[from] ContractViolation),
    #[error(transparent)]
    Stats(#[from] StatsFileError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Validates hours through the same contract the stores use.
fn snapshot(hours: f64, total: f64, adjustment: f64) -> Result<OrienteeSnapshot, ToolError> {
    Ok(OrienteeSnapshot::v1(hours, total, adjustment, OrienteeStatus::OnTrack)?)
}

pub fn execute_phase(hours: f64) -> Result<String, ToolError> {
    snapshot(hours, DEFAULT_TOTAL_HOURS, 0.0)?;
    let p = phase(hours);
    Ok(format!("phase {} ({})", p.number(), p.name()))
}

pub fn execute_progress(hours: f64, total: f64, adjustment: f64) -> Result<String, ToolError> {
    let progress = orientee_progress(&snapshot(hours, total, adjustment)?);
    let percent = match progress.progress_percent {
        Some(p) => {
            let width = usize::from(progress_bar_width(p)) / 5;
            format!("{p}% [{}{}]", "#".repeat(width), ".".repeat(20 - width))
        }
        None => "n/a (target hours must be > 0)".to_string(),
    };
    Ok(format!(
        "phase {} ({})\nprogress {percent}\ntarget {}h, remaining {}h",
        progress.phase.number(),
        progress.phase.name(),
        progress.effective_total_hours,
        progress.hours_remaining
    ))
}

pub fn execute_stats(file: &std::path::Path, json: bool) -> Result<String, ToolError> {
    let stats = stats_from_file(file)?;
    if json {
        Ok(serde_json::to_string_pretty(&stats)?)
    } else {
        Ok(render_stats(&stats))
    }
}

pub fn sample_notice(
    to: &str,
    orientee: &str,
    shift_date: NaiveDate,
) -> Result<EvaluationNotice, ToolError> {
    Ok(EvaluationNotice {
        to: to.trim().to_string(),
        to_name: "Lead FTO".to_string(),
        orientee_name: orientee.to_string(),
        evaluator_name: "arems notify-test".to_string(),
        shift_date,
        rating: Rating::new("notify_test.rating", 4)?,
    })
}

/// `api_key` overrides the env lookup so the caller can prompt for it.
pub fn execute_notify_test<F>(
    notice: &EvaluationNotice,
    api_key: String,
    mut env_getter: F,
) -> Result<String, ToolError>
where
    F: FnMut(&str) -> Option<String>,
{
    let config = ResendConfig::from_env_var_map(|key| {
        if key == ENV_API_KEY {
            Some(api_key.clone())
        } else {
            env_getter(key)
        }
    })?
    .ok_or(NotifyError::Config("api key must not be empty"))?;
    let notifier = ResendNotifier::new(config)?;
    let receipt = notifier.deliver(notice)?;
    info!(to = %notice.to, "test notice delivered");
    Ok(match receipt.provider_message_id {
        Some(id) => format!("sent ({id})"),
        None => "sent".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_tools_cli_01_parses_negative_adjustment() {
        let cli = Cli::try_parse_from(["arems", "progress", "40", "96", "-16"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Progress {
                hours: 40.0,
                total: 96.0,
                adjustment: -16.0
            }
        );
        let cli = Cli::try_parse_from(["arems", "progress", "40"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Progress {
                hours: 40.0,
                total: DEFAULT_TOTAL_HOURS,
                adjustment: 0.0
            }
        );
    }

    #[test]
    fn at_tools_cli_02_phase_output_and_rejection() {
        assert_eq!(execute_phase(0.0).unwrap(), "phase 1 (Familiarization)");
        assert_eq!(execute_phase(64.0).unwrap(), "phase 3 (Independence)");
        assert!(execute_phase(-1.0).is_err());
        assert!(execute_phase(f64::NAN).is_err());
    }

    #[test]
    fn at_tools_cli_03_progress_output() {
        let out = execute_progress(48.0, 96.0, 0.0).unwrap();
        assert!(out.starts_with(
            "phase 2 (Guided Participation)\nprogress 50% [##########..........]"
        ));
        assert!(out.ends_with("target 96h, remaining 48h"));

        let over = execute_progress(120.0, 96.0, 0.0).unwrap();
        assert!(over.contains("progress 125% [####################]"));

        let guarded = execute_progress(10.0, 40.0, -40.0).unwrap();
        assert!(guarded.contains("n/a"));
    }

    #[test]
    fn at_tools_cli_04_notify_test_requires_http_endpoint() {
        let shift = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        let notice = sample_notice("lead@arems.net", "Jo Park", shift).unwrap();
        let err = execute_notify_test(&notice, "re_key".to_string(), |key| {
            (key == arems_engines::notify::ENV_ENDPOINT).then(|| "ftp://mail".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ToolError::Notify(NotifyError::Config(_))));
    }
}
