#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use arems_kernel_contracts::evaluation::FtoEvaluationRecord;
use arems_kernel_contracts::task::{TaskRecord, TaskStatus};
use arems_kernel_contracts::training::{TrainingCompletionRecord, TrainingMaterialRecord};
use arems_kernel_contracts::Rating;
use serde::Serialize;

/// Mean star rating to one decimal place, `None` when there is nothing to average.
pub fn average_rating(ratings: impl IntoIterator<Item = Rating>) -> Option<f64> {
    let mut sum = 0_u32;
    let mut n = 0_u32;
    for r in ratings {
        sum += u32::from(r.get());
        n += 1;
    }
    if n == 0 {
        return None;
    }
    let mean = f64::from(sum) / f64::from(n);
    Some((mean * 10.0).round() / 10.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FtoRatingSummary {
    pub responses: u32,
    pub overall: Option<f64>,
    pub communication: Option<f64>,
    pub teaching: Option<f64>,
    pub support: Option<f64>,
}

pub fn summarize_fto_feedback(rows: &[&FtoEvaluationRecord]) -> FtoRatingSummary {
    FtoRatingSummary {
        responses: rows.len() as u32,
        overall: average_rating(rows.iter().map(|r| r.input.overall_rating)),
        communication: average_rating(rows.iter().map(|r| r.input.communication_rating)),
        teaching: average_rating(rows.iter().map(|r| r.input.teaching_rating)),
        support: average_rating(rows.iter().map(|r| r.input.support_rating)),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompletionTally {
    pub completed: u32,
    pub total: u32,
}

pub fn tally_tasks(tasks: &[&TaskRecord]) -> CompletionTally {
    CompletionTally {
        completed: tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count() as u32,
        total: tasks.len() as u32,
    }
}

/// Completions that point at deleted materials do not count.
pub fn tally_training(
    materials: &[&TrainingMaterialRecord],
    completions: &[&TrainingCompletionRecord],
) -> CompletionTally {
    let done: BTreeSet<_> = completions.iter().map(|c| c.material_id).collect();
    CompletionTally {
        completed: materials
            .iter()
            .filter(|m| done.contains(&m.material_id))
            .count() as u32,
        total: materials.len() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arems_kernel_contracts::evaluation::{FtoEvaluationId, FtoEvaluationInput};
    use arems_kernel_contracts::orientee::OrienteeId;
    use arems_kernel_contracts::profile::UserId;
    use arems_kernel_contracts::MonotonicTimeNs;

    fn r(v: u8) -> Rating {
        Rating::new("t", v).unwrap()
    }

    #[test]
    fn at_feedback_01_average_to_one_decimal() {
        assert_eq!(average_rating([r(4), r(5), r(5)]), Some(4.7));
        assert_eq!(average_rating([r(3)]), Some(3.0));
        assert_eq!(average_rating(Vec::new()), None);
    }

    #[test]
    fn at_feedback_02_fto_summary_per_dimension() {
        let fto = UserId::new("fto_9").unwrap();
        let rows: Vec<FtoEvaluationRecord> = [[5, 4, 3, 5], [4, 4, 5, 5]]
            .into_iter()
            .enumerate()
            .map(|(i, ratings)| FtoEvaluationRecord {
                fto_evaluation_id: FtoEvaluationId(i as u64 + 1),
                input: FtoEvaluationInput::v1(fto.clone(), OrienteeId(1), ratings, None).unwrap(),
                created_at: MonotonicTimeNs(i as u64),
            })
            .collect();
        let refs: Vec<&FtoEvaluationRecord> = rows.iter().collect();
        let s = summarize_fto_feedback(&refs);
        assert_eq!(s.responses, 2);
        assert_eq!(s.overall, Some(4.5));
        assert_eq!(s.communication, Some(4.0));
        assert_eq!(s.teaching, Some(4.0));
        assert_eq!(s.support, Some(5.0));
    }

    #[test]
    fn at_feedback_03_empty_fto_summary() {
        let s = summarize_fto_feedback(&[]);
        assert_eq!(s.responses, 0);
        assert_eq!(s.overall, None);
    }

    #[test]
    fn at_feedback_04_training_tally_ignores_orphan_completions() {
        use arems_kernel_contracts::training::{
            TrainingMaterialId, TrainingMaterialInput, TrainingMaterialKind,
        };
        let material = |id: u64| TrainingMaterialRecord {
            material_id: TrainingMaterialId(id),
            input: TrainingMaterialInput::v1(
                format!("Module {id}"),
                None,
                TrainingMaterialKind::Link,
                "https://training.arems.net/m".to_string(),
            )
            .unwrap(),
            uploaded_by: UserId::new("admin_1").unwrap(),
            created_at: MonotonicTimeNs(id),
            updated_at: MonotonicTimeNs(id),
        };
        let done = |id: u64| TrainingCompletionRecord {
            orientee_id: OrienteeId(1),
            material_id: TrainingMaterialId(id),
            completed_at: MonotonicTimeNs(10 + id),
        };
        let materials = [material(1), material(2), material(3)];
        let completions = [done(2), done(9)];
        let m: Vec<&TrainingMaterialRecord> = materials.iter().collect();
        let c: Vec<&TrainingCompletionRecord> = completions.iter().collect();
        assert_eq!(
            tally_training(&m, &c),
            CompletionTally {
                completed: 1,
                total: 3
            }
        );
    }
}
