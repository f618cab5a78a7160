use pretty_assertions::assert_eq;
use terracrypt_remote::{
    IncomingMessage, MessageStatusUpdate, NotificationType, PushEnvelope, RawNotification,
};
use terracrypt_types::ResourceKind;

#[test]
fn notification_type_round_trips_tags() {
    for t in [
        NotificationType::Chat,
        NotificationType::Request,
        NotificationType::Member,
        NotificationType::ChatMessage,
        NotificationType::MessageStatus,
    ] {
        assert_eq!(NotificationType::from_tag(t.tag()), Some(t));
    }
    assert_eq!(NotificationType::from_tag("typing-indicator"), None);
}

#[test]
fn notification_type_maps_to_resource_kind() {
    assert_eq!(NotificationType::Chat.resource_kind(), ResourceKind::Chat);
    assert_eq!(NotificationType::Request.resource_kind(), ResourceKind::Friend);
    assert_eq!(
        NotificationType::Member.resource_kind(),
        ResourceKind::Participant
    );
    assert_eq!(NotificationType::ChatMessage.resource_kind(), ResourceKind::Chat);
    assert!(NotificationType::MessageStatus.carries_message());
    assert!(!NotificationType::Chat.carries_message());
}

#[test]
fn envelope_parses_type_field() {
    let env: PushEnvelope = serde_json::from_str(
        r#"{"type":"chat-notification","message":{"action":"deleted","subjectId":"c-1","affectedMemberIds":["u-1"]}}"#,
    )
    .unwrap();
    assert_eq!(env.notification_type, "chat-notification");
    assert_eq!(env.message["subjectId"], "c-1");
}

#[test]
fn envelope_without_message_defaults_to_null() {
    let env: PushEnvelope = serde_json::from_str(r#"{"type":"request-notification"}"#).unwrap();
    assert!(env.message.is_null());
}

#[test]
fn raw_notification_accepts_camel_and_snake_case() {
    let camel: RawNotification = serde_json::from_value(serde_json::json!({
        "action": "created", "subjectId": "c-1", "affectedMemberIds": ["u-1"]
    }))
    .unwrap();
    let snake: RawNotification = serde_json::from_value(serde_json::json!({
        "action": "created", "chat_id": "c-1", "members": ["u-1"]
    }))
    .unwrap();
    assert_eq!(camel, snake);
}

#[test]
fn raw_notification_tolerates_missing_fields() {
    let raw: RawNotification = serde_json::from_value(serde_json::json!({ "action": "created" })).unwrap();
    assert!(raw.subject_id.is_none());
    assert!(raw.affected_member_ids.is_none());
    assert!(raw.status.is_none());
}

#[test]
fn envelope_new_uses_wire_tag() {
    let env = PushEnvelope::new(NotificationType::Request, serde_json::json!({}));
    let json = serde_json::to_value(&env).unwrap();
    assert_eq!(json["type"], "request-notification");
}

#[test]
fn incoming_message_becomes_unread_delivered_message() {
    let incoming: IncomingMessage = serde_json::from_value(serde_json::json!({
        "message_id": "m-1",
        "chat_id": "c-1",
        "sender_id": "u-2",
        "content": "hello",
        "sent_at": "2025-03-01T10:00:00Z"
    }))
    .unwrap();

    let message = incoming.into_message();
    assert_eq!(message.timestamp, 1_740_823_200);
    assert!(!message.is_read);
    assert!(message.is_sent && message.is_delivered);
    assert!(message.reply_to_message_id.is_none());
}

#[test]
fn message_status_tolerates_missing_fields() {
    let update: MessageStatusUpdate =
        serde_json::from_value(serde_json::json!({ "status": "delivered" })).unwrap();
    assert_eq!(update.status.as_deref(), Some("delivered"));
    assert!(update.message_id.is_none());
}
