#![forbid(unsafe_code)]

use arems_kernel_contracts::message::{ConversationId, ConversationInput};
use arems_kernel_contracts::profile::{ProfileRecord, Role, UserId};
use arems_kernel_contracts::MonotonicTimeNs;
use arems_storage::repo::{MessagingRepo, ProfileRepo};
use arems_storage::store::{AremsStore, StorageError};

fn uid(v: &str) -> UserId {
    UserId::new(v).unwrap()
}

fn seeded() -> AremsStore {
    let mut s = AremsStore::new_in_memory();
    for (id, name, role) in [
        ("fto_1", "Chris Vega", Role::Fto),
        ("ori_1", "Jo Park", Role::Orientee),
        ("ori_2", "Lee Moss", Role::Orientee),
    ] {
        s.insert_profile_row(
            ProfileRecord::v1(
                uid(id),
                name.to_string(),
                format!("{id}@arems.net"),
                None,
                role,
                MonotonicTimeNs(1),
            )
            .unwrap(),
        )
        .unwrap();
    }
    s
}

fn direct(s: &mut AremsStore, a: &str, b: &str, t: u64) -> ConversationId {
    s.create_conversation_row(
        ConversationInput::v1(None, false, uid(a), [uid(b)]).unwrap(),
        MonotonicTimeNs(t),
    )
    .unwrap()
}

#[test]
fn at_msg_db_01_unread_counts_only_messages_from_others_after_mark() {
    let mut s = seeded();
    let c = direct(&mut s, "fto_1", "ori_1", 10);
    s.send_message_row(c, &uid("fto_1"), "Shift at 0700".to_string(), MonotonicTimeNs(11))
        .unwrap();
    s.send_message_row(c, &uid("ori_1"), "Copy".to_string(), MonotonicTimeNs(12))
        .unwrap();
    s.send_message_row(c, &uid("fto_1"), "Bring your book".to_string(), MonotonicTimeNs(13))
        .unwrap();
    assert_eq!(s.unread_message_count(&uid("ori_1")), 2);
    assert_eq!(s.unread_message_count(&uid("fto_1")), 1);

    s.mark_conversation_read_row(&uid("ori_1"), c, MonotonicTimeNs(13))
        .unwrap();
    assert_eq!(s.unread_message_count(&uid("ori_1")), 0);

    s.send_message_row(c, &uid("fto_1"), "See you".to_string(), MonotonicTimeNs(14))
        .unwrap();
    assert_eq!(s.unread_message_count(&uid("ori_1")), 1);
}

#[test]
fn at_msg_db_02_non_participant_cannot_send_or_mark_read() {
    let mut s = seeded();
    let c = direct(&mut s, "fto_1", "ori_1", 10);
    let r = s.send_message_row(c, &uid("ori_2"), "hi".to_string(), MonotonicTimeNs(11));
    assert!(matches!(r, Err(StorageError::Forbidden { .. })));
    let r = s.mark_conversation_read_row(&uid("ori_2"), c, MonotonicTimeNs(11));
    assert!(matches!(r, Err(StorageError::Forbidden { .. })));
    assert!(s.conversation_rows_for_user(&uid("ori_2")).is_empty());
}

#[test]
fn at_msg_db_03_only_sender_may_edit() {
    let mut s = seeded();
    let c = direct(&mut s, "fto_1", "ori_1", 10);
    let m = s
        .send_message_row(c, &uid("fto_1"), "Shift at 0700".to_string(), MonotonicTimeNs(11))
        .unwrap();
    let r = s.edit_message_row(m, &uid("ori_1"), "nope".to_string(), MonotonicTimeNs(12));
    assert!(matches!(r, Err(StorageError::Forbidden { .. })));
    s.edit_message_row(m, &uid("fto_1"), "Shift at 0730".to_string(), MonotonicTimeNs(12))
        .unwrap();
    let rows = s.message_rows_for_conversation(c);
    assert_eq!(rows[0].content, "Shift at 0730");
    assert_eq!(rows[0].edited_at, Some(MonotonicTimeNs(12)));
}

#[test]
fn at_msg_db_04_delete_conversation_drops_messages_and_marks() {
    let mut s = seeded();
    let keep = direct(&mut s, "fto_1", "ori_2", 10);
    let gone = direct(&mut s, "fto_1", "ori_1", 11);
    s.send_message_row(gone, &uid("fto_1"), "a".to_string(), MonotonicTimeNs(12))
        .unwrap();
    s.send_message_row(keep, &uid("fto_1"), "b".to_string(), MonotonicTimeNs(13))
        .unwrap();
    s.mark_conversation_read_row(&uid("ori_1"), gone, MonotonicTimeNs(14))
        .unwrap();

    s.delete_conversation_row(gone).unwrap();
    assert!(s.conversation_row(gone).is_none());
    assert!(s.message_rows_for_conversation(gone).is_empty());
    assert_eq!(s.message_rows_for_conversation(keep).len(), 1);
    assert_eq!(s.all_conversation_rows().len(), 1);
    assert_eq!(s.unread_message_count(&uid("ori_1")), 0);
}

#[test]
fn at_msg_db_05_group_rename_requires_a_name() {
    let mut s = seeded();
    let g = s
        .create_conversation_row(
            ConversationInput::v1(
                Some("A Shift".to_string()),
                true,
                uid("fto_1"),
                [uid("ori_1"), uid("ori_2")],
            )
            .unwrap(),
            MonotonicTimeNs(10),
        )
        .unwrap();
    assert!(s.rename_conversation_row(g, None).is_err());
    s.rename_conversation_row(g, Some("B Shift".to_string()))
        .unwrap();
    let row = s.conversation_row(g).unwrap();
    assert_eq!(row.name.as_deref(), Some("B Shift"));
    assert_eq!(row.participants.len(), 3);
}
