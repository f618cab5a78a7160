//! Mirrored rows: friends, chats, participants and messages.

use crate::error::ParseError;
use crate::kind::ResourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── Friends ──

/// Relationship state of a friend row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FriendStatus {
    Pending,
    #[default]
    Accepted,
    Rejected,
    Blocked,
}

impl FriendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendStatus::Pending => "pending",
            FriendStatus::Accepted => "accepted",
            FriendStatus::Rejected => "rejected",
            FriendStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for FriendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FriendStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(FriendStatus::Pending),
            "accepted" | "" => Ok(FriendStatus::Accepted),
            "rejected" | "declined" => Ok(FriendStatus::Rejected),
            "blocked" => Ok(FriendStatus::Blocked),
            other => Err(ParseError::UnknownFriendStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub status: FriendStatus,
    #[serde(default)]
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Friend {
    /// True when every server-owned field matches; timestamps are local bookkeeping.
    pub fn same_content(&self, other: &Friend) -> bool {
        self.user_id == other.user_id
            && self.username == other.username
            && self.name == other.name
            && self.email == other.email
            && self.picture == other.picture
            && self.status == other.status
            && self.is_favorite == other.is_favorite
    }
}

/// Status carried by a friend-request notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    #[serde(alias = "rejected")]
    Declined,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Declined => "declined",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "accepted" => Ok(RequestStatus::Accepted),
            "declined" | "rejected" => Ok(RequestStatus::Declined),
            other => Err(ParseError::UnknownRequestStatus(other.to_string())),
        }
    }
}

/// An incoming friend request that has not been answered yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub request_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub status: RequestStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// ── Chats ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub chat_id: String,
    pub name: String,
    pub creator_id: String,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub last_message_content: Option<String>,
    #[serde(default)]
    pub last_message_timestamp: Option<i64>,
    #[serde(default)]
    pub participant_ids: Vec<String>,
}

impl Chat {
    /// Compares the fields the server owns. Unread counters and the
    /// last-message preview are maintained locally and carried over on pull.
    pub fn same_content(&self, other: &Chat) -> bool {
        self.chat_id == other.chat_id
            && self.name == other.name
            && self.creator_id == other.creator_id
            && self.is_group == other.is_group
            && self.participant_ids == other.participant_ids
    }
}

// ── Participants ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Admin,
    #[default]
    Member,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Admin => "admin",
            ParticipantRole::Member => "member",
        }
    }
}

impl FromStr for ParticipantRole {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(ParticipantRole::Admin),
            "member" => Ok(ParticipantRole::Member),
            other => Err(ParseError::UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub user_id: String,
    pub chat_id: String,
    #[serde(default)]
    pub role: ParticipantRole,
    pub joined_at: DateTime<Utc>,
    #[serde(default)]
    pub left_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Participant {
    /// Participant ids are scoped to their chat: `<chat_id>_<user_id>`.
    pub fn compose_id(chat_id: &str, user_id: &str) -> String {
        format!("{chat_id}_{user_id}")
    }
}

// ── Messages ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub timestamp: i64,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub is_sent: bool,
    #[serde(default)]
    pub is_delivered: bool,
    #[serde(default)]
    pub reply_to_message_id: Option<String>,
}

impl Message {
    /// Applies a server acknowledgement. Flags only move forward: a read
    /// message is also delivered and sent. Returns whether anything changed.
    pub fn acknowledge(&mut self, status: DeliveryStatus) -> bool {
        let before = (self.is_sent, self.is_delivered, self.is_read);
        self.is_sent = true;
        if status >= DeliveryStatus::Delivered {
            self.is_delivered = true;
        }
        if status == DeliveryStatus::Read {
            self.is_read = true;
        }
        before != (self.is_sent, self.is_delivered, self.is_read)
    }
}

/// Delivery stage reported by a message-status acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Read => "read",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sent" => Ok(DeliveryStatus::Sent),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "read" => Ok(DeliveryStatus::Read),
            other => Err(ParseError::UnknownDeliveryStatus(other.to_string())),
        }
    }
}

// ── Type-erased row ──

/// A row of one of the three mirrored collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Record {
    Friend(Friend),
    Chat(Chat),
    Participant(Participant),
}

impl Record {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Record::Friend(_) => ResourceKind::Friend,
            Record::Chat(_) => ResourceKind::Chat,
            Record::Participant(_) => ResourceKind::Participant,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Record::Friend(f) => &f.id,
            Record::Chat(c) => &c.chat_id,
            Record::Participant(p) => &p.id,
        }
    }

    /// Owning chat, for participant rows.
    pub fn chat_id(&self) -> Option<&str> {
        match self {
            Record::Chat(c) => Some(&c.chat_id),
            Record::Participant(p) => Some(&p.chat_id),
            Record::Friend(_) => None,
        }
    }

    /// Compares server-owned content only (see the per-type `same_content`).
    pub fn same_content(&self, other: &Record) -> bool {
        match (self, other) {
            (Record::Friend(a), Record::Friend(b)) => a.same_content(b),
            (Record::Chat(a), Record::Chat(b)) => a.same_content(b),
            (Record::Participant(a), Record::Participant(b)) => a == b,
            _ => false,
        }
    }
}

/// Typed view over a [`Record`] variant.
pub trait Resource: Sized + Clone {
    const KIND: ResourceKind;

    fn resource_id(&self) -> &str;
    fn into_record(self) -> Record;
    fn from_record(record: Record) -> Option<Self>;
}

impl Resource for Friend {
    const KIND: ResourceKind = ResourceKind::Friend;

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn into_record(self) -> Record {
        Record::Friend(self)
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Friend(f) => Some(f),
            _ => None,
        }
    }
}

impl Resource for Chat {
    const KIND: ResourceKind = ResourceKind::Chat;

    fn resource_id(&self) -> &str {
        &self.chat_id
    }

    fn into_record(self) -> Record {
        Record::Chat(self)
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Chat(c) => Some(c),
            _ => None,
        }
    }
}

impl Resource for Participant {
    const KIND: ResourceKind = ResourceKind::Participant;

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn into_record(self) -> Record {
        Record::Participant(self)
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Participant(p) => Some(p),
            _ => None,
        }
    }
}

impl From<Friend> for Record {
    fn from(f: Friend) -> Self {
        Record::Friend(f)
    }
}

impl From<Chat> for Record {
    fn from(c: Chat) -> Self {
        Record::Chat(c)
    }
}

impl From<Participant> for Record {
    fn from(p: Participant) -> Self {
        Record::Participant(p)
    }
}
