use chrono::Utc;
use pretty_assertions::assert_eq;
use terracrypt_types::*;

fn make_friend(id: &str) -> Friend {
    Friend {
        id: id.into(),
        user_id: id.into(),
        username: format!("{id}_name"),
        name: "Test Friend".into(),
        email: format!("{id}@example.com"),
        picture: None,
        status: FriendStatus::Accepted,
        is_favorite: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn make_chat(id: &str) -> Chat {
    Chat {
        chat_id: id.into(),
        name: "General".into(),
        creator_id: "u-1".into(),
        is_group: true,
        unread_count: 0,
        last_message_content: None,
        last_message_timestamp: None,
        participant_ids: vec!["u-1".into(), "u-2".into()],
    }
}

// --- ResourceKind ---

#[test]
fn kind_parses_singular_and_plural() {
    assert_eq!("friend".parse::<ResourceKind>().unwrap(), ResourceKind::Friend);
    assert_eq!("Chats".parse::<ResourceKind>().unwrap(), ResourceKind::Chat);
    assert_eq!("members".parse::<ResourceKind>().unwrap(), ResourceKind::Participant);
}

#[test]
fn kind_rejects_unknown() {
    let err = "messages".parse::<ResourceKind>().unwrap_err();
    assert_eq!(err, ParseError::UnknownKind("messages".into()));
    assert_eq!(err.to_string(), "unknown resource kind: messages");
}

#[test]
fn kind_index_is_dense() {
    let indices: Vec<usize> = ResourceKind::ALL.iter().map(|k| k.index()).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn kind_orders_friend_chat_participant() {
    assert!(ResourceKind::Friend < ResourceKind::Chat);
    assert!(ResourceKind::Chat < ResourceKind::Participant);
}

// --- Statuses ---

#[test]
fn friend_status_treats_declined_as_rejected() {
    assert_eq!("declined".parse::<FriendStatus>().unwrap(), FriendStatus::Rejected);
    assert_eq!("".parse::<FriendStatus>().unwrap(), FriendStatus::Accepted);
}

#[test]
fn request_status_deserializes_rejected_alias() {
    let s: RequestStatus = serde_json::from_str("\"rejected\"").unwrap();
    assert_eq!(s, RequestStatus::Declined);
}

// --- Records ---

#[test]
fn record_reports_kind_and_id() {
    let record = Record::from(make_chat("c-1"));
    assert_eq!(record.kind(), ResourceKind::Chat);
    assert_eq!(record.id(), "c-1");
    assert_eq!(record.chat_id(), Some("c-1"));
}

#[test]
fn friend_same_content_ignores_timestamps() {
    let a = make_friend("u-2");
    let mut b = a.clone();
    b.updated_at = Utc::now() + chrono::Duration::hours(1);
    assert!(a.same_content(&b));

    b.username = "renamed".into();
    assert!(!a.same_content(&b));
}

#[test]
fn chat_same_content_ignores_local_counters() {
    let a = make_chat("c-1");
    let mut b = a.clone();
    b.unread_count = 7;
    b.last_message_content = Some("hi".into());
    assert!(a.same_content(&b));
}

#[test]
fn resource_round_trips_through_record() {
    let chat = make_chat("c-9");
    let back = Chat::from_record(chat.clone().into_record()).unwrap();
    assert_eq!(back, chat);
    assert!(Friend::from_record(Record::Chat(chat)).is_none());
}

#[test]
fn participant_id_is_chat_scoped() {
    assert_eq!(Participant::compose_id("c-1", "u-2"), "c-1_u-2");
}

#[test]
fn participant_defaults_to_active_member() {
    let json = serde_json::json!({
        "id": "c-1_u-2",
        "user_id": "u-2",
        "chat_id": "c-1",
        "joined_at": "2025-01-01T00:00:00Z"
    });
    let p: Participant = serde_json::from_value(json).unwrap();
    assert!(p.is_active);
    assert_eq!(p.role, ParticipantRole::Member);
    assert!(p.left_at.is_none());
}

// --- Scope / ChangeSet ---

#[test]
fn chat_scope_matches_only_its_rows() {
    let p = Record::Participant(Participant {
        id: "c-1_u-2".into(),
        user_id: "u-2".into(),
        chat_id: "c-1".into(),
        role: ParticipantRole::Admin,
        joined_at: Utc::now(),
        left_at: None,
        is_active: true,
    });
    assert!(Scope::All.contains(&p));
    assert!(Scope::Chat("c-1".into()).contains(&p));
    assert!(!Scope::Chat("c-2".into()).contains(&p));
    assert!(!Scope::Chat("c-1".into()).contains(&Record::Friend(make_friend("u-3"))));
}

#[test]
fn change_set_merge_dedupes() {
    let mut a = ChangeSet::new(ResourceKind::Friend).with_added("u-1");
    let b = ChangeSet::new(ResourceKind::Friend)
        .with_added("u-1")
        .with_removed("u-9");
    a.merge(b);
    assert_eq!(a.len(), 2);
    assert!(!a.is_empty());
    assert!(ChangeSet::new(ResourceKind::Chat).is_empty());
}

// --- Session ---

#[test]
fn session_debug_redacts_token() {
    let session = Session::new("u-1", "secret-token");
    let rendered = format!("{session:?}");
    assert!(rendered.contains("u-1"));
    assert!(!rendered.contains("secret-token"));
}

#[test]
fn session_user_match_is_case_insensitive() {
    let session = Session::new("ABC-123", "t");
    assert!(session.is_user("abc-123"));
    assert!(!session.is_user("abc-124"));
}

#[test]
fn delivery_status_parses_and_orders() {
    assert_eq!("Delivered".parse::<DeliveryStatus>(), Ok(DeliveryStatus::Delivered));
    assert!(DeliveryStatus::Sent < DeliveryStatus::Read);
    assert!(matches!(
        "lost".parse::<DeliveryStatus>(),
        Err(ParseError::UnknownDeliveryStatus(_))
    ));
}

#[test]
fn acknowledgements_only_move_forward() {
    let mut message = Message {
        message_id: "m-1".into(),
        chat_id: "c-1".into(),
        sender_id: "u-1".into(),
        content: "hi".into(),
        timestamp: 1,
        is_read: false,
        is_sent: false,
        is_delivered: false,
        reply_to_message_id: None,
    };

    assert!(message.acknowledge(DeliveryStatus::Read));
    assert!(message.is_sent && message.is_delivered && message.is_read);

    // A late "sent" after "read" changes nothing.
    assert!(!message.acknowledge(DeliveryStatus::Sent));
    assert!(message.is_read);
}
