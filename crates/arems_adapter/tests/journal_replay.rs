#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;

use arems_adapter::{
    AdapterCommand, AdapterError, AdapterRuntime, CreateOrienteeRequest, DeleteConversationRequest,
    EditMessageRequest, OrienteeStatusRequest, RegisterProfileRequest, RenameConversationRequest,
    SendMessageRequest, StartConversationRequest, SubmitEvaluationRequest,
    TrainingMaterialRequest, UpdateOrienteeDetailsRequest, UpdateProfileDetailsRequest,
    UpdateTrainingMaterialRequest,
};
use arems_engines::notify::{ResendConfig, ResendNotifier};
use arems_os::config::AremsOsConfig;
use chrono::NaiveDate;

fn register(id: &str, role: &str) -> AdapterCommand {
    AdapterCommand::RegisterProfile(RegisterProfileRequest {
        user_id: id.to_string(),
        full_name: format!("User {id}"),
        email: format!("{id}@arems.net"),
        phone: None,
        role: role.to_string(),
    })
}

fn create_orientee(name: &str, lead: &str) -> AdapterCommand {
    AdapterCommand::CreateOrientee(CreateOrienteeRequest {
        actor_user_id: "admin_1".to_string(),
        temp_name: name.to_string(),
        temp_email: format!("{}@example.org", name.to_lowercase().replace(' ', ".")),
        temp_phone: None,
        cert_level: "Paramedic".to_string(),
        station: Some("Station 4".to_string()),
        shift: Some("B".to_string()),
        lead_fto_user_id: Some(lead.to_string()),
        start_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
        tentative_clear_date: None,
        total_hours: Some(120.0),
    })
}

fn evaluation(orientee_id: u64, day: u32, hours: f64, key: &str) -> AdapterCommand {
    AdapterCommand::SubmitEvaluation(SubmitEvaluationRequest {
        actor_user_id: "fto_2".to_string(),
        orientee_id,
        shift_date: NaiveDate::from_ymd_opt(2026, 9, day).unwrap(),
        hours_logged: hours,
        overall_rating: 5,
        strengths: Some("Scene control".to_string()),
        improvements: None,
        daily_tasks: vec!["12-lead".to_string()],
        idempotency_key: Some(key.to_string()),
    })
}

fn open(path: &Path, notifier: Option<ResendNotifier>) -> Result<AdapterRuntime, AdapterError> {
    AdapterRuntime::new_with_persistence(AremsOsConfig::mvp_v1(), notifier, path.to_path_buf())
}

fn seed(path: &Path) -> u64 {
    let mut rt = open(path, None).unwrap();
    rt.run_command_at(register("admin_1", "admin"), 10).unwrap();
    rt.run_command_at(register("fto_1", "lead_fto"), 11).unwrap();
    rt.run_command_at(register("fto_2", "fto"), 12).unwrap();
    let id = rt
        .run_command_at(create_orientee("Sam Ortiz", "fto_1"), 13)
        .unwrap()
        .record_id
        .unwrap();
    for (n, day) in [(1u64, 3u32), (2, 5), (3, 7)] {
        rt.run_command_at(evaluation(id, day, 20.0, &format!("shift-{n}")), 13 + n)
            .unwrap();
    }
    rt.run_command_at(
        AdapterCommand::SetOrienteeStatus(OrienteeStatusRequest {
            actor_user_id: "fto_1".to_string(),
            orientee_id: id,
            status: "at-risk".to_string(),
        }),
        17,
    )
    .unwrap();
    id
}

/// Connection refused on the discard port, so every delivery attempt fails fast.
fn unreachable_notifier() -> ResendNotifier {
    let mut config = ResendConfig::mvp_v1("re_test_key".to_string());
    config.endpoint = "http://127.0.0.1:9/emails".to_string();
    config.timeout_ms = 500;
    ResendNotifier::new(config).unwrap()
}

#[test]
fn at_adapter_journal_01_replay_restores_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/commands.jsonl");
    let id = seed(&path);

    let rt = open(&path, None).unwrap();
    assert_eq!(rt.health_report().journal_entries, 8);
    let dash = rt.dashboard("fto_1").unwrap();
    let stats = dash.stats.unwrap();
    assert_eq!(stats.active_orientees, 1);
    assert_eq!(stats.at_risk_count, 1);
    assert_eq!(stats.avg_progress, 50);
    assert_eq!(dash.roster[0].orientee_id, id);
    assert_eq!(dash.roster[0].hours_completed, 60.0);
    assert_eq!(dash.roster[0].progress.phase, 2);
    assert_eq!(rt.evaluations("fto_1").unwrap().len(), 3);
}

#[test]
fn at_adapter_journal_02_rejected_commands_are_not_journaled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commands.jsonl");
    let id = seed(&path);

    let mut rt = open(&path, None).unwrap();
    let err = rt
        .run_command_at(evaluation(id, 9, -4.0, "shift-bad"), 20)
        .unwrap_err();
    assert_eq!(err.http_status(), 400);
    let over = rt
        .run_command_at(evaluation(id, 9, 30.0, "shift-long"), 21)
        .unwrap_err();
    assert_eq!(over.http_status(), 400);
    let lines = fs::read_to_string(&path).unwrap().lines().count();
    assert_eq!(lines, 8);
    assert_eq!(rt.health_report().journal_entries, 8);
}

#[test]
fn at_adapter_journal_03_digest_tampering_fails_replay() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commands.jsonl");
    seed(&path);

    let raw = fs::read_to_string(&path).unwrap();
    let mut lines: Vec<String> = raw.lines().map(str::to_string).collect();
    let mut entry: serde_json::Value = serde_json::from_str(&lines[4]).unwrap();
    entry["command"]["hours_logged"] = serde_json::json!(24.0);
    lines[4] = entry.to_string();
    fs::write(&path, lines.join("\n") + "\n").unwrap();

    let err = open(&path, None).err().unwrap();
    match err {
        AdapterError::Journal(reason) => assert!(reason.contains("line 5"), "{reason}"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn at_adapter_journal_04_notifier_attaches_after_replay() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commands.jsonl");
    let id = seed(&path);

    let mut rt = open(&path, Some(unreachable_notifier())).unwrap();
    let retry = rt
        .run_command_at(evaluation(id, 3, 20.0, "shift-1"), 30)
        .unwrap();
    assert_eq!(retry.notification.as_deref(), Some("skipped:duplicate"));

    let fresh = rt
        .run_command_at(evaluation(id, 9, 12.0, "shift-4"), 31)
        .unwrap();
    assert_eq!(fresh.notification.as_deref(), Some("failed"));
    assert_eq!(rt.evaluations("fto_2").unwrap().len(), 4);
    assert_eq!(rt.roster("fto_1", false).unwrap()[0].hours_completed, 72.0);
}

#[test]
fn at_adapter_journal_05_unknown_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commands.jsonl");
    seed(&path);

    let raw = fs::read_to_string(&path).unwrap();
    let mut entry: serde_json::Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
    entry["schema_version"] = serde_json::json!(2);
    fs::write(&path, format!("{entry}\n")).unwrap();

    assert!(matches!(open(&path, None), Err(AdapterError::Journal(_))));
}

#[test]
fn at_adapter_journal_06_failed_append_rolls_back_command() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commands.jsonl");
    let mut rt = open(&path, None).unwrap();
    rt.run_command_at(register("admin_1", "admin"), 10).unwrap();
    rt.run_command_at(register("fto_1", "lead_fto"), 11).unwrap();
    rt.run_command_at(register("fto_2", "fto"), 12).unwrap();
    let saved = fs::read_to_string(&path).unwrap();

    fs::remove_file(&path).unwrap();
    fs::create_dir(&path).unwrap();
    let err = rt
        .run_command_at(create_orientee("Sam Ortiz", "fto_1"), 13)
        .unwrap_err();
    assert!(matches!(err, AdapterError::Journal(_)), "{err}");
    assert_eq!(err.http_status(), 500);
    assert!(rt.roster("admin_1", true).unwrap().is_empty());
    assert_eq!(rt.health_report().journal_entries, 3);

    fs::remove_dir(&path).unwrap();
    fs::write(&path, &saved).unwrap();
    let id = rt
        .run_command_at(create_orientee("Sam Ortiz", "fto_1"), 14)
        .unwrap()
        .record_id
        .unwrap();

    // A keyed evaluation that failed to journal must not count when retried.
    let broken = dir.path().join("moved.jsonl");
    fs::rename(&path, &broken).unwrap();
    fs::create_dir(&path).unwrap();
    assert!(rt
        .run_command_at(evaluation(id, 3, 20.0, "shift-1"), 15)
        .is_err());
    assert_eq!(rt.roster("admin_1", false).unwrap()[0].hours_completed, 0.0);
    assert!(rt.evaluations("admin_1").unwrap().is_empty());

    fs::remove_dir(&path).unwrap();
    fs::rename(&broken, &path).unwrap();
    let retried = rt
        .run_command_at(evaluation(id, 3, 20.0, "shift-1"), 16)
        .unwrap();
    assert_eq!(retried.outcome, "EVALUATION_SUBMITTED");
    assert_eq!(rt.roster("admin_1", false).unwrap()[0].hours_completed, 20.0);
    drop(rt);

    let reopened = open(&path, None).unwrap();
    assert_eq!(reopened.health_report().journal_entries, 5);
    assert_eq!(reopened.roster("admin_1", false).unwrap()[0].hours_completed, 20.0);
    assert_eq!(reopened.evaluations("admin_1").unwrap().len(), 1);
}

#[test]
fn at_adapter_journal_07_notice_is_sent_after_the_entry_is_durable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commands.jsonl");
    let id = seed(&path);

    let mut rt = open(&path, Some(unreachable_notifier())).unwrap();
    let outcome = rt
        .run_command_deferred(evaluation(id, 9, 12.0, "shift-4"), 31)
        .unwrap();
    assert!(outcome.pending.is_some());
    assert_eq!(outcome.response.notification, None);
    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 9);
    assert_eq!(rt.roster("fto_1", false).unwrap()[0].hours_completed, 72.0);

    let response = outcome.finish();
    assert_eq!(response.outcome, "EVALUATION_SUBMITTED");
    assert_eq!(response.notification.as_deref(), Some("failed"));

    let quiet = rt
        .run_command_deferred(
            AdapterCommand::SetOrienteeStatus(OrienteeStatusRequest {
                actor_user_id: "fto_1".to_string(),
                orientee_id: id,
                status: "on-track".to_string(),
            }),
            32,
        )
        .unwrap();
    assert!(quiet.pending.is_none());
}

#[test]
fn at_adapter_journal_08_update_commands_survive_replay() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commands.jsonl");
    let id = seed(&path);

    let mut rt = open(&path, None).unwrap();
    let mut t = 40;
    let mut run = |rt: &mut AdapterRuntime, command: AdapterCommand| {
        t += 1;
        rt.run_command_at(command, t).unwrap()
    };

    run(
        &mut rt,
        AdapterCommand::UpdateProfileDetails(UpdateProfileDetailsRequest {
            actor_user_id: "fto_2".to_string(),
            user_id: "fto_2".to_string(),
            full_name: Some("Riley Shaw".to_string()),
            phone: Some("555-0199".to_string()),
            avatar_url: None,
        }),
    );
    run(
        &mut rt,
        AdapterCommand::UpdateOrienteeDetails(UpdateOrienteeDetailsRequest {
            actor_user_id: "admin_1".to_string(),
            orientee_id: id,
            contact: None,
            cert_level: Some("AEMT".to_string()),
            station: Some("Station 9".to_string()),
            shift: Some(String::new()),
            lead_fto_user_id: Some("fto_2".to_string()),
            start_date: None,
            tentative_clear_date: NaiveDate::from_ymd_opt(2026, 12, 1),
            clear_tentative_clear_date: false,
            orientation_book_url: Some("https://docs.arems.net/book/sam".to_string()),
        }),
    );
    let material_id = run(
        &mut rt,
        AdapterCommand::CreateTrainingMaterial(TrainingMaterialRequest {
            actor_user_id: "admin_1".to_string(),
            title: "Airway Management".to_string(),
            description: None,
            kind: "video".to_string(),
            url: "https://training.arems.net/airway".to_string(),
        }),
    )
    .record_id
    .unwrap();
    run(
        &mut rt,
        AdapterCommand::UpdateTrainingMaterial(UpdateTrainingMaterialRequest {
            actor_user_id: "admin_1".to_string(),
            material_id,
            title: "Airway Management II".to_string(),
            description: Some("Supraglottic devices".to_string()),
            kind: "document".to_string(),
            url: "https://training.arems.net/airway-2".to_string(),
        }),
    );
    let kept = run(
        &mut rt,
        AdapterCommand::StartConversation(StartConversationRequest {
            actor_user_id: "fto_1".to_string(),
            name: None,
            is_group: false,
            participant_user_ids: vec!["fto_2".to_string()],
        }),
    )
    .record_id
    .unwrap();
    let message_id = run(
        &mut rt,
        AdapterCommand::SendMessage(SendMessageRequest {
            actor_user_id: "fto_1".to_string(),
            conversation_id: kept,
            content: "Sam is ready for nights".to_string(),
        }),
    )
    .record_id
    .unwrap();
    run(
        &mut rt,
        AdapterCommand::EditMessage(EditMessageRequest {
            actor_user_id: "fto_1".to_string(),
            message_id,
            content: "Sam is ready for B shift".to_string(),
        }),
    );
    run(
        &mut rt,
        AdapterCommand::RenameConversation(RenameConversationRequest {
            actor_user_id: "fto_2".to_string(),
            conversation_id: kept,
            name: Some("Sam handoff".to_string()),
        }),
    );
    let dropped = run(
        &mut rt,
        AdapterCommand::StartConversation(StartConversationRequest {
            actor_user_id: "fto_1".to_string(),
            name: Some("Scratch".to_string()),
            is_group: false,
            participant_user_ids: vec!["admin_1".to_string()],
        }),
    )
    .record_id
    .unwrap();
    run(
        &mut rt,
        AdapterCommand::DeleteConversation(DeleteConversationRequest {
            actor_user_id: "fto_1".to_string(),
            conversation_id: dropped,
        }),
    );
    let denied = rt
        .run_command_at(
            AdapterCommand::UpdateProfileDetails(UpdateProfileDetailsRequest {
                actor_user_id: "fto_2".to_string(),
                user_id: "fto_1".to_string(),
                full_name: Some("Not Mine".to_string()),
                phone: None,
                avatar_url: None,
            }),
            90,
        )
        .unwrap_err();
    assert_eq!(denied.http_status(), 403);
    drop(rt);

    let rt = open(&path, None).unwrap();
    assert_eq!(rt.health_report().journal_entries, 18);

    let ftos = rt.training_officers("fto_1").unwrap();
    let riley = ftos.iter().find(|p| p.user_id == "fto_2").unwrap();
    assert_eq!(riley.full_name, "Riley Shaw");
    assert_eq!(riley.phone.as_deref(), Some("555-0199"));
    assert_eq!(rt.training_officers("fto_1").unwrap().len(), 3);

    let roster = rt.roster("admin_1", false).unwrap();
    assert_eq!(roster[0].cert_level, "AEMT");
    assert_eq!(roster[0].station.as_deref(), Some("Station 9"));
    assert_eq!(roster[0].lead_fto_name.as_deref(), Some("Riley Shaw"));
    assert_eq!(rt.evaluations_for_orientee("fto_1", id).unwrap().len(), 3);
    assert_eq!(rt.evaluations_for_orientee("fto_1", id + 1).unwrap_err().http_status(), 404);

    let materials = rt.training_materials("fto_1").unwrap();
    assert_eq!(materials.len(), 1);
    assert_eq!(materials[0].title, "Airway Management II");
    assert_eq!(materials[0].kind, "document");

    let conversations = rt.conversations("fto_1").unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].name.as_deref(), Some("Sam handoff"));
    let messages = rt.messages("fto_2", kept).unwrap();
    assert_eq!(messages[0].content, "Sam is ready for B shift");
    assert!(messages[0].edited_at_ns.is_some());
}
