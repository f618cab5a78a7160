use chrono::Utc;
use pretty_assertions::assert_eq;
use terracrypt_store::{MemoryStore, ResourceStore, SqliteStore, StoreError};
use terracrypt_types::*;

fn make_friend(id: &str) -> Record {
    Record::Friend(Friend {
        id: id.into(),
        user_id: id.into(),
        username: format!("{id}_name"),
        name: "Friend".into(),
        email: format!("{id}@example.com"),
        picture: None,
        status: FriendStatus::Accepted,
        is_favorite: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    })
}

fn make_chat(id: &str) -> Record {
    Record::Chat(Chat {
        chat_id: id.into(),
        name: format!("chat {id}"),
        creator_id: "u-1".into(),
        is_group: false,
        unread_count: 0,
        last_message_content: None,
        last_message_timestamp: None,
        participant_ids: vec!["u-1".into()],
    })
}

fn make_participant(chat_id: &str, user_id: &str) -> Record {
    Record::Participant(Participant {
        id: Participant::compose_id(chat_id, user_id),
        user_id: user_id.into(),
        chat_id: chat_id.into(),
        role: ParticipantRole::Member,
        joined_at: Utc::now(),
        left_at: None,
        is_active: true,
    })
}

fn make_message(id: &str, chat_id: &str, ts: i64) -> Message {
    Message {
        message_id: id.into(),
        chat_id: chat_id.into(),
        sender_id: "u-1".into(),
        content: format!("message {id}"),
        timestamp: ts,
        is_read: false,
        is_sent: true,
        is_delivered: false,
        reply_to_message_id: None,
    }
}

fn stores() -> Vec<(&'static str, Box<dyn ResourceStore>)> {
    vec![
        ("memory", Box::new(MemoryStore::new())),
        ("sqlite", Box::new(SqliteStore::open_in_memory().unwrap())),
    ]
}

// ── Shared contract ─────────────────────────────────────────────

#[test]
fn upsert_then_get_returns_record() {
    for (name, store) in stores() {
        let friend = make_friend("u-2");
        store.upsert(&friend).unwrap();
        let got = store.get(ResourceKind::Friend, "u-2").unwrap();
        assert_eq!(got, Some(friend), "{name}");
    }
}

#[test]
fn upsert_twice_keeps_one_row() {
    for (name, store) in stores() {
        store.upsert(&make_chat("c-1")).unwrap();
        store.upsert(&make_chat("c-1")).unwrap();
        assert_eq!(store.list_all(ResourceKind::Chat).unwrap().len(), 1, "{name}");
    }
}

#[test]
fn delete_reports_presence() {
    for (name, store) in stores() {
        store.upsert(&make_friend("u-2")).unwrap();
        assert!(store.delete(ResourceKind::Friend, "u-2").unwrap(), "{name}");
        assert!(!store.delete(ResourceKind::Friend, "u-2").unwrap(), "{name}");
        assert!(store.get(ResourceKind::Friend, "u-2").unwrap().is_none(), "{name}");
    }
}

#[test]
fn list_scope_filters_participants_by_chat() {
    for (name, store) in stores() {
        store.upsert(&make_chat("c-1")).unwrap();
        store.upsert(&make_chat("c-2")).unwrap();
        store.upsert(&make_participant("c-1", "u-1")).unwrap();
        store.upsert(&make_participant("c-1", "u-2")).unwrap();
        store.upsert(&make_participant("c-2", "u-1")).unwrap();

        let scoped = store
            .list_scope(ResourceKind::Participant, &Scope::Chat("c-1".into()))
            .unwrap();
        let ids: Vec<&str> = scoped.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["c-1_u-1", "c-1_u-2"], "{name}");
    }
}

#[test]
fn messages_are_ordered_by_timestamp() {
    for (name, store) in stores() {
        store.upsert(&make_chat("c-1")).unwrap();
        store.upsert_message(&make_message("m-2", "c-1", 20)).unwrap();
        store.upsert_message(&make_message("m-1", "c-1", 10)).unwrap();

        let ids: Vec<String> = store
            .messages_for_chat("c-1")
            .unwrap()
            .into_iter()
            .map(|m| m.message_id)
            .collect();
        assert_eq!(ids, vec!["m-1".to_string(), "m-2".to_string()], "{name}");
    }
}

#[test]
fn get_message_by_id() {
    for (name, store) in stores() {
        store.upsert(&make_chat("c-1")).unwrap();
        store.upsert_message(&make_message("m-1", "c-1", 10)).unwrap();

        let found = store.get_message("m-1").unwrap();
        assert_eq!(found.map(|m| m.timestamp), Some(10), "{name}");
        assert!(store.get_message("m-404").unwrap().is_none(), "{name}");
    }
}

#[test]
fn delete_messages_for_chat_counts_removed() {
    for (name, store) in stores() {
        store.upsert(&make_chat("c-1")).unwrap();
        store.upsert(&make_chat("c-2")).unwrap();
        store.upsert_message(&make_message("m-1", "c-1", 1)).unwrap();
        store.upsert_message(&make_message("m-2", "c-1", 2)).unwrap();
        store.upsert_message(&make_message("m-3", "c-2", 3)).unwrap();

        assert_eq!(store.delete_messages_for_chat("c-1").unwrap(), 2, "{name}");
        assert_eq!(store.delete_messages_for_chat("c-1").unwrap(), 0, "{name}");
        assert_eq!(store.messages_for_chat("c-2").unwrap().len(), 1, "{name}");
    }
}

#[test]
fn clearing_chats_clears_children() {
    for (name, store) in stores() {
        store.upsert(&make_chat("c-1")).unwrap();
        store.upsert(&make_participant("c-1", "u-1")).unwrap();
        store.upsert_message(&make_message("m-1", "c-1", 1)).unwrap();
        store.upsert(&make_friend("u-5")).unwrap();

        store.clear(ResourceKind::Chat).unwrap();

        assert!(store.list_all(ResourceKind::Chat).unwrap().is_empty(), "{name}");
        assert!(store.list_all(ResourceKind::Participant).unwrap().is_empty(), "{name}");
        assert!(store.messages_for_chat("c-1").unwrap().is_empty(), "{name}");
        assert_eq!(store.list_all(ResourceKind::Friend).unwrap().len(), 1, "{name}");
    }
}

#[test]
fn ready_succeeds_on_fresh_store() {
    for (name, store) in stores() {
        assert!(store.ready().is_ok(), "{name}");
    }
}

// ── SQLite specifics ────────────────────────────────────────────

#[test]
fn sqlite_rejects_chat_delete_with_messages_left() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.upsert(&make_chat("c-1")).unwrap();
    store.upsert_message(&make_message("m-1", "c-1", 1)).unwrap();

    let err = store.delete(ResourceKind::Chat, "c-1").unwrap_err();
    assert!(matches!(err, StoreError::Integrity(_)));

    store.delete_messages_for_chat("c-1").unwrap();
    assert!(store.delete(ResourceKind::Chat, "c-1").unwrap());
}

#[test]
fn sqlite_rejects_orphan_participant() {
    let store = SqliteStore::open_in_memory().unwrap();
    let err = store.upsert(&make_participant("missing", "u-1")).unwrap_err();
    assert!(matches!(err, StoreError::Integrity(_)));
}

#[test]
fn sqlite_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    {
        let store = SqliteStore::open(&path).unwrap();
        store.upsert(&make_friend("u-7")).unwrap();
        store.upsert(&make_chat("c-7")).unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    assert!(store.get(ResourceKind::Friend, "u-7").unwrap().is_some());
    assert!(store.get(ResourceKind::Chat, "c-7").unwrap().is_some());
}

#[test]
fn memory_store_counts_messages() {
    let store = MemoryStore::new();
    store.upsert_message(&make_message("m-1", "c-1", 1)).unwrap();
    store.upsert_message(&make_message("m-1", "c-1", 1)).unwrap();
    assert_eq!(store.message_count(), 1);
}
