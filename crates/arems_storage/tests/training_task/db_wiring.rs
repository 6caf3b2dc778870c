#![forbid(unsafe_code)]

use arems_kernel_contracts::orientee::{CertLevel, OrienteeCreateInput, OrienteeId, PendingContact};
use arems_kernel_contracts::profile::{ProfileRecord, Role, UserId};
use arems_kernel_contracts::task::{TaskInput, TaskStatus};
use arems_kernel_contracts::training::{
    TrainingMaterialId, TrainingMaterialInput, TrainingMaterialKind,
};
use arems_kernel_contracts::MonotonicTimeNs;
use arems_storage::repo::{OrienteeRepo, ProfileRepo, TaskRepo, TrainingRepo};
use arems_storage::store::{AremsStore, StorageError};
use chrono::NaiveDate;

fn uid(v: &str) -> UserId {
    UserId::new(v).unwrap()
}

fn seeded() -> (AremsStore, OrienteeId) {
    let mut s = AremsStore::new_in_memory();
    for (id, role) in [("admin_1", Role::Admin), ("fto_1", Role::Fto)] {
        s.insert_profile_row(
            ProfileRecord::v1(
                uid(id),
                id.to_string(),
                format!("{id}@arems.net"),
                None,
                role,
                MonotonicTimeNs(1),
            )
            .unwrap(),
        )
        .unwrap();
    }
    let o = s
        .create_orientee_row(
            OrienteeCreateInput::v1(
                PendingContact {
                    temp_name: "Jo Park".to_string(),
                    temp_email: "jo@example.org".to_string(),
                    temp_phone: None,
                },
                CertLevel::Aemt,
                None,
                None,
                None,
                NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
                None,
                Some(120.0),
            )
            .unwrap(),
            MonotonicTimeNs(2),
        )
        .unwrap();
    (s, o)
}

fn material(s: &mut AremsStore, title: &str, t: u64) -> TrainingMaterialId {
    s.create_training_material_row(
        TrainingMaterialInput::v1(
            title.to_string(),
            None,
            TrainingMaterialKind::Video,
            "https://training.arems.net/v/1".to_string(),
        )
        .unwrap(),
        &uid("admin_1"),
        MonotonicTimeNs(t),
    )
    .unwrap()
}

#[test]
fn at_training_db_01_completion_is_recorded_once() {
    let (mut s, o) = seeded();
    let m = material(&mut s, "Airway basics", 10);
    s.mark_training_complete_row(o, m, MonotonicTimeNs(11))
        .unwrap();
    let r = s.mark_training_complete_row(o, m, MonotonicTimeNs(12));
    assert!(matches!(r, Err(StorageError::DuplicateKey { .. })));
    let done = s.training_completion_rows_for_orientee(o);
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].completed_at, MonotonicTimeNs(11));
}

#[test]
fn at_training_db_02_unknown_material_is_fk_violation() {
    let (mut s, o) = seeded();
    let r = s.mark_training_complete_row(o, TrainingMaterialId(77), MonotonicTimeNs(11));
    assert!(matches!(r, Err(StorageError::ForeignKeyViolation { .. })));
}

#[test]
fn at_training_db_03_update_replaces_content_and_keeps_order() {
    let (mut s, _) = seeded();
    let first = material(&mut s, "Airway basics", 10);
    let second = material(&mut s, "Stroke scale", 20);
    s.update_training_material_row(
        first,
        TrainingMaterialInput::v1(
            "Airway basics v2".to_string(),
            Some("Updated protocol".to_string()),
            TrainingMaterialKind::Document,
            "https://training.arems.net/d/2".to_string(),
        )
        .unwrap(),
        MonotonicTimeNs(30),
    )
    .unwrap();
    let rows = s.training_material_rows_newest_first();
    assert_eq!(rows[0].material_id, second);
    assert_eq!(rows[1].input.title, "Airway basics v2");
    assert_eq!(rows[1].updated_at, MonotonicTimeNs(30));
}

#[test]
fn at_task_db_01_verify_keeps_first_verifier() {
    let (mut s, o) = seeded();
    let t = s
        .create_task_row(
            TaskInput::v1("Restock bag".to_string(), None, o, uid("fto_1"), None).unwrap(),
            MonotonicTimeNs(10),
        )
        .unwrap();
    assert_eq!(s.task_row(t).unwrap().status, TaskStatus::Pending);

    s.verify_task_row(t, &uid("fto_1"), MonotonicTimeNs(11))
        .unwrap();
    s.verify_task_row(t, &uid("admin_1"), MonotonicTimeNs(12))
        .unwrap();
    let row = s.task_row(t).unwrap();
    assert_eq!(row.status, TaskStatus::Completed);
    let v = row.verification.as_ref().unwrap();
    assert_eq!(v.verified_by, uid("fto_1"));
    assert_eq!(v.verified_at, MonotonicTimeNs(11));
}

#[test]
fn at_task_db_02_task_for_unknown_orientee_is_rejected() {
    let (mut s, _) = seeded();
    let r = s.create_task_row(
        TaskInput::v1("Restock bag".to_string(), None, OrienteeId(9), uid("fto_1"), None).unwrap(),
        MonotonicTimeNs(10),
    );
    assert!(matches!(r, Err(StorageError::ForeignKeyViolation { .. })));
    assert!(s.task_rows_newest_first().is_empty());
}
