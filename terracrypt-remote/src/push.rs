//! Push-channel envelopes.
//!
//! The persistent connection delivers JSON envelopes of the shape
//! `{ "type": "chat-notification" | "request-notification" | "member-notification", "message": { ... } }`.
//! Chat messages (`"chat"`) and delivery acknowledgements (`"message-status"`)
//! share the envelope but carry a message body instead of a notification.
//! Delivery is FIFO per connection and at-least-once. This module only
//! describes the wire shape; field validation happens in the router.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use terracrypt_types::{Message, ResourceKind};

/// Envelope `type` tags the sync engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationType {
    Chat,
    Request,
    /// Membership of one chat changed; the subject is the chat id.
    Member,
    /// A new chat message, body is an [`IncomingMessage`].
    ChatMessage,
    /// Delivery acknowledgement, body is a [`MessageStatusUpdate`].
    MessageStatus,
}

impl NotificationType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "chat-notification" => Some(NotificationType::Chat),
            "request-notification" => Some(NotificationType::Request),
            "member-notification" => Some(NotificationType::Member),
            "chat" => Some(NotificationType::ChatMessage),
            "message-status" => Some(NotificationType::MessageStatus),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            NotificationType::Chat => "chat-notification",
            NotificationType::Request => "request-notification",
            NotificationType::Member => "member-notification",
            NotificationType::ChatMessage => "chat",
            NotificationType::MessageStatus => "message-status",
        }
    }

    /// Collection a notification of this type reconciles into.
    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            NotificationType::Chat => ResourceKind::Chat,
            NotificationType::Request => ResourceKind::Friend,
            NotificationType::Member => ResourceKind::Participant,
            NotificationType::ChatMessage | NotificationType::MessageStatus => ResourceKind::Chat,
        }
    }

    /// Whether the body is a message payload rather than a notification.
    pub fn carries_message(&self) -> bool {
        matches!(
            self,
            NotificationType::ChatMessage | NotificationType::MessageStatus
        )
    }
}

/// Outer push envelope. `message` stays untyped until the router validates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEnvelope {
    #[serde(rename = "type")]
    pub notification_type: String,
    #[serde(default)]
    pub message: serde_json::Value,
}

impl PushEnvelope {
    pub fn new(notification_type: NotificationType, message: serde_json::Value) -> Self {
        Self {
            notification_type: notification_type.tag().to_string(),
            message,
        }
    }
}

/// Inner notification body with every field optional, so a missing field
/// is reported by the router instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNotification {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default, alias = "subject_id", alias = "chat_id", alias = "request_id")]
    pub subject_id: Option<String>,
    #[serde(default, alias = "affected_member_ids", alias = "members")]
    pub affected_member_ids: Option<Vec<String>>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Body of a `chat` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub message_id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub reply_to_message_id: Option<String>,
}

impl IncomingMessage {
    /// The cached form: unread, already sent and delivered by the server.
    pub fn into_message(self) -> Message {
        Message {
            message_id: self.message_id,
            chat_id: self.chat_id,
            sender_id: self.sender_id,
            content: self.content,
            timestamp: self.sent_at.timestamp(),
            is_read: false,
            is_sent: true,
            is_delivered: true,
            reply_to_message_id: self.reply_to_message_id,
        }
    }
}

/// Body of a `message-status` envelope. The status stays a string so an
/// unknown stage is reported by the router rather than failing parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStatusUpdate {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}
