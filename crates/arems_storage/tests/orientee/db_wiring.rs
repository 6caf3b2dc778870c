#![forbid(unsafe_code)]

use arems_kernel_contracts::evaluation::{EvaluationInput, FtoEvaluationInput};
use arems_kernel_contracts::orientee::{
    CertLevel, OrienteeCreateInput, OrienteeId, OrienteeStatus, PendingContact,
};
use arems_kernel_contracts::profile::{ProfileRecord, Role, UserId};
use arems_kernel_contracts::task::TaskInput;
use arems_kernel_contracts::MonotonicTimeNs;
use arems_storage::repo::{EvaluationRepo, OrienteeRepo, ProfileRepo, TaskRepo};
use arems_storage::store::{AremsStore, LinkOutcome, OrienteeDetailsUpdate, StorageError};
use chrono::NaiveDate;

fn uid(v: &str) -> UserId {
    UserId::new(v).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

fn profile(s: &mut AremsStore, id: &str, name: &str, email: &str, role: Role) {
    s.insert_profile_row(
        ProfileRecord::v1(
            uid(id),
            name.to_string(),
            email.to_string(),
            None,
            role,
            MonotonicTimeNs(1),
        )
        .unwrap(),
    )
    .unwrap();
}

fn orientee(s: &mut AremsStore, name: &str, email: &str, t: u64) -> OrienteeId {
    let input = OrienteeCreateInput::v1(
        PendingContact {
            temp_name: name.to_string(),
            temp_email: email.to_string(),
            temp_phone: None,
        },
        CertLevel::Paramedic,
        Some("Station 1".to_string()),
        None,
        Some(uid("lead_1")),
        day(1),
        Some(day(28)),
        None,
    )
    .unwrap();
    s.create_orientee_row(input, MonotonicTimeNs(t)).unwrap()
}

fn seeded() -> AremsStore {
    let mut s = AremsStore::new_in_memory();
    profile(&mut s, "lead_1", "Dana Reyes", "dana@arems.net", Role::LeadFto);
    profile(&mut s, "admin_1", "Sam Ortiz", "sam@arems.net", Role::Admin);
    s
}

#[test]
fn at_orientee_db_01_roster_is_newest_first() {
    let mut s = seeded();
    let a = orientee(&mut s, "Ana Diaz", "ana@example.org", 10);
    let b = orientee(&mut s, "Ben Cole", "ben@example.org", 20);
    let ids: Vec<OrienteeId> = s
        .orientee_rows_newest_first()
        .iter()
        .map(|o| o.orientee_id)
        .collect();
    assert_eq!(ids, vec![b, a]);
    assert_eq!(s.orientee_snapshot_rows().len(), 2);
}

#[test]
fn at_orientee_db_02_unknown_lead_fto_is_rejected() {
    let mut s = seeded();
    let id = orientee(&mut s, "Ana Diaz", "ana@example.org", 10);
    let update = OrienteeDetailsUpdate {
        lead_fto_id: Some(Some(uid("ghost"))),
        ..OrienteeDetailsUpdate::default()
    };
    let r = s.update_orientee_details_row(id, update, MonotonicTimeNs(11));
    assert!(matches!(r, Err(StorageError::ForeignKeyViolation { .. })));
    assert_eq!(s.orientee_row(id).unwrap().lead_fto_id, Some(uid("lead_1")));
}

#[test]
fn at_orientee_db_03_clear_date_before_start_is_rejected() {
    let mut s = seeded();
    let id = orientee(&mut s, "Ana Diaz", "ana@example.org", 10);
    let update = OrienteeDetailsUpdate {
        start_date: Some(day(20)),
        tentative_clear_date: Some(Some(day(5))),
        ..OrienteeDetailsUpdate::default()
    };
    assert!(s
        .update_orientee_details_row(id, update, MonotonicTimeNs(11))
        .is_err());
    assert_eq!(s.orientee_row(id).unwrap().start_date, day(1));
}

#[test]
fn at_orientee_db_04_link_by_email_is_case_insensitive_and_once_only() {
    let mut s = seeded();
    let id = orientee(&mut s, "Ana Diaz", "Ana.Diaz@Example.org", 10);
    profile(&mut s, "user_ana", "Ana Diaz", "ana.diaz@example.org", Role::Orientee);

    let first = s
        .link_orientee_by_email_row(&uid("user_ana"), " ana.diaz@example.org ", MonotonicTimeNs(12))
        .unwrap();
    assert_eq!(first, LinkOutcome::Linked(id));
    let again = s
        .link_orientee_by_email_row(&uid("user_ana"), "ana.diaz@example.org", MonotonicTimeNs(13))
        .unwrap();
    assert_eq!(again, LinkOutcome::AlreadyLinked(id));
    assert_eq!(
        s.orientee_row_by_user(&uid("user_ana")).unwrap().orientee_id,
        id
    );

    profile(&mut s, "user_x", "Xi Lin", "xi@example.org", Role::Orientee);
    let miss = s
        .link_orientee_by_email_row(&uid("user_x"), "xi@example.org", MonotonicTimeNs(14))
        .unwrap();
    assert_eq!(miss, LinkOutcome::NoMatch);
}

#[test]
fn at_orientee_db_05_delete_cascades_to_dependent_rows() {
    let mut s = seeded();
    let keep = orientee(&mut s, "Ana Diaz", "ana@example.org", 10);
    let gone = orientee(&mut s, "Ben Cole", "ben@example.org", 11);

    for (o, d) in [(keep, 2), (gone, 3)] {
        s.create_evaluation_row(
            EvaluationInput::v1(o, uid("lead_1"), day(d), 12.0, 3, None, None, vec![]).unwrap(),
            None,
            MonotonicTimeNs(20 + u64::from(d)),
        )
        .unwrap();
        s.create_task_row(
            TaskInput::v1("Check rig".to_string(), None, o, uid("lead_1"), None).unwrap(),
            MonotonicTimeNs(30 + u64::from(d)),
        )
        .unwrap();
        s.create_fto_evaluation_row(
            FtoEvaluationInput::v1(uid("lead_1"), o, [5, 4, 4, 5], None).unwrap(),
            MonotonicTimeNs(40 + u64::from(d)),
        )
        .unwrap();
    }

    s.delete_orientee_row(gone).unwrap();
    assert!(s.orientee_row(gone).is_none());
    assert!(s.evaluation_rows_for_orientee(gone).is_empty());
    assert!(s.task_rows_for_orientee(gone).is_empty());
    assert_eq!(s.evaluation_rows_newest_first().len(), 1);
    assert_eq!(s.fto_evaluation_rows_newest_first().len(), 1);
    assert_eq!(s.task_rows_for_orientee(keep).len(), 1);

    assert!(matches!(
        s.delete_orientee_row(gone),
        Err(StorageError::NotFound { .. })
    ));
}

#[test]
fn at_orientee_db_06_status_and_archive_flags_persist() {
    let mut s = seeded();
    let id = orientee(&mut s, "Ana Diaz", "ana@example.org", 10);
    s.set_orientee_status_row(id, OrienteeStatus::PendingClearance, MonotonicTimeNs(11))
        .unwrap();
    s.set_orientee_archived_row(id, true, MonotonicTimeNs(12))
        .unwrap();
    let o = s.orientee_row(id).unwrap();
    assert_eq!(o.status, OrienteeStatus::PendingClearance);
    assert!(o.is_archived);
    assert_eq!(o.updated_at, MonotonicTimeNs(12));
}
