//! Validated push notifications.

use crate::error::{SyncError, SyncResult};
use std::collections::BTreeSet;
use terracrypt_types::{RequestStatus, ResourceKind};

/// What happened to the notification's subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    Created,
    Deleted,
    StatusChanged(RequestStatus),
}

/// Handler routing key; [`NotificationAction`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Created,
    Deleted,
    StatusChanged,
}

impl NotificationAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            NotificationAction::Created => ActionKind::Created,
            NotificationAction::Deleted => ActionKind::Deleted,
            NotificationAction::StatusChanged(_) => ActionKind::StatusChanged,
        }
    }

    /// Parses the wire `action` (and `status` for status changes).
    ///
    /// `Ok(None)` means the action is not one this client knows; the
    /// notification is ignored rather than rejected. A status change
    /// without a recognizable status is malformed.
    pub fn parse(action: &str, status: Option<&str>) -> SyncResult<Option<Self>> {
        let normalized = action.trim().to_ascii_lowercase().replace(['-', '_'], "");
        match normalized.as_str() {
            "created" | "create" => Ok(Some(NotificationAction::Created)),
            "deleted" | "delete" => Ok(Some(NotificationAction::Deleted)),
            "statuschanged" | "status" => {
                let raw = status.ok_or_else(|| {
                    SyncError::MalformedNotification("status change without status".into())
                })?;
                let parsed = raw
                    .parse::<RequestStatus>()
                    .map_err(|e| SyncError::MalformedNotification(e.to_string()))?;
                Ok(Some(NotificationAction::StatusChanged(parsed)))
            }
            _ => Ok(None),
        }
    }
}

/// A push notification that passed validation, queued for one handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNotification {
    pub kind: ResourceKind,
    pub action: NotificationAction,
    pub subject_id: String,
    pub affected_member_ids: BTreeSet<String>,
}

impl PendingNotification {
    /// Case-insensitive membership test against `affected_member_ids`.
    pub fn affects(&self, user_id: &str) -> bool {
        self.affected_member_ids
            .iter()
            .any(|m| m.eq_ignore_ascii_case(user_id))
    }
}
