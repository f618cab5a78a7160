//! Push notification validation and dispatch.
//!
//! Every envelope goes through the same gate: parse the envelope, resolve
//! its type to a resource kind, require the mandatory fields, check that
//! the signed-in user is among the affected members, then hand it to the
//! single handler registered for `(kind, action)`. Anything that fails a
//! check is logged and dropped; only handler failures reach the caller.
//!
//! `chat` and `message-status` envelopes carry a message body instead of a
//! notification. They skip the membership check and go to the single
//! [`MessageHandler`].

use crate::error::{SyncError, SyncResult};
use crate::notification::{ActionKind, NotificationAction, PendingNotification};
use crate::session::SessionHandle;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use terracrypt_remote::{
    IncomingMessage, MessageStatusUpdate, NotificationType, PushEnvelope, RawNotification,
};
use terracrypt_types::{ChangeSet, DeliveryStatus, Message, ResourceKind};
use tracing::{debug, info, warn};

/// Reconciles one validated notification into the cache.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, notification: &PendingNotification) -> SyncResult<ChangeSet>;
}

/// Applies pushed chat messages and delivery acknowledgements.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn message_received(&self, message: Message) -> SyncResult<ChangeSet>;

    async fn message_status(
        &self,
        message_id: &str,
        status: DeliveryStatus,
    ) -> SyncResult<ChangeSet>;
}

/// Why a notification was not handed to a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    Malformed(String),
    UnknownType(String),
    UnknownAction(String),
    /// The signed-in user is not among the affected members.
    NotAddressed,
    SignedOut,
    NoHandler,
}

/// Outcome of [`NotificationRouter::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Applied(ChangeSet),
    Dropped(DropReason),
}

type HandlerKey = (ResourceKind, ActionKind);

/// A push that passed validation.
enum Validated {
    Notification(PendingNotification),
    Message(Message),
    Status {
        message_id: String,
        status: DeliveryStatus,
    },
}

pub struct NotificationRouter {
    session: SessionHandle,
    handlers: RwLock<HashMap<HandlerKey, Arc<dyn NotificationHandler>>>,
    messages: RwLock<Option<Arc<dyn MessageHandler>>>,
}

impl NotificationRouter {
    pub fn new(session: SessionHandle) -> Self {
        Self {
            session,
            handlers: RwLock::new(HashMap::new()),
            messages: RwLock::new(None),
        }
    }

    /// Registers the handler for message envelopes, replacing any previous one.
    pub fn register_message_handler(&self, handler: Arc<dyn MessageHandler>) {
        let mut messages = self.messages.write().unwrap_or_else(|e| e.into_inner());
        if messages.replace(handler).is_some() {
            debug!("message handler replaced");
        }
    }

    /// Registers the handler for `(kind, action)`, replacing any previous one.
    pub fn register_handler(
        &self,
        kind: ResourceKind,
        action: ActionKind,
        handler: Arc<dyn NotificationHandler>,
    ) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        if handlers.insert((kind, action), handler).is_some() {
            debug!(%kind, ?action, "notification handler replaced");
        }
    }

    pub fn has_handler(&self, kind: ResourceKind, action: ActionKind) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&(kind, action))
    }

    /// Dispatches a raw text frame from the push channel.
    pub async fn dispatch_text(&self, frame: &str) -> SyncResult<Dispatch> {
        match serde_json::from_str::<serde_json::Value>(frame) {
            Ok(value) => self.dispatch(&value).await,
            Err(e) => Ok(drop_malformed(format!("invalid json: {e}"))),
        }
    }

    /// Validates `envelope` and runs its handler. Returns `Err` only when
    /// the handler itself fails.
    pub async fn dispatch(&self, envelope: &serde_json::Value) -> SyncResult<Dispatch> {
        let notification = match self.validate(envelope).await {
            Ok(Validated::Notification(n)) => n,
            Ok(Validated::Message(message)) => {
                let Some(handler) = self.message_handler() else {
                    return Ok(no_message_handler());
                };
                debug!(chat = %message.chat_id, message = %message.message_id, "dispatching chat message");
                let changes = handler.message_received(message).await?;
                return Ok(Dispatch::Applied(changes));
            }
            Ok(Validated::Status { message_id, status }) => {
                let Some(handler) = self.message_handler() else {
                    return Ok(no_message_handler());
                };
                debug!(message = %message_id, %status, "dispatching message status");
                let changes = handler.message_status(&message_id, status).await?;
                return Ok(Dispatch::Applied(changes));
            }
            Err(reason) => return Ok(Dispatch::Dropped(reason)),
        };

        let key = (notification.kind, notification.action.kind());
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned();
        let Some(handler) = handler else {
            warn!(kind = %key.0, action = ?key.1, "no handler registered, notification dropped");
            return Ok(Dispatch::Dropped(DropReason::NoHandler));
        };

        debug!(
            kind = %notification.kind,
            action = ?notification.action,
            subject = %notification.subject_id,
            "dispatching notification"
        );
        let changes = handler.handle(&notification).await?;
        Ok(Dispatch::Applied(changes))
    }

    fn message_handler(&self) -> Option<Arc<dyn MessageHandler>> {
        self.messages
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn validate(&self, envelope: &serde_json::Value) -> Result<Validated, DropReason> {
        let envelope: PushEnvelope = serde_json::from_value(envelope.clone())
            .map_err(|e| malformed(format!("invalid envelope: {e}")))?;

        let Some(notification_type) = NotificationType::from_tag(&envelope.notification_type)
        else {
            info!(notification_type = %envelope.notification_type, "unknown notification type ignored");
            return Err(DropReason::UnknownType(envelope.notification_type));
        };
        if notification_type.carries_message() {
            return self.validate_message(notification_type, envelope.message).await;
        }
        self.validate_notification(notification_type, envelope.message)
            .await
            .map(Validated::Notification)
    }

    async fn validate_message(
        &self,
        notification_type: NotificationType,
        body: serde_json::Value,
    ) -> Result<Validated, DropReason> {
        let validated = if notification_type == NotificationType::ChatMessage {
            let incoming: IncomingMessage = serde_json::from_value(body)
                .map_err(|e| malformed(format!("invalid chat message: {e}")))?;
            if incoming.message_id.trim().is_empty() || incoming.chat_id.trim().is_empty() {
                return Err(malformed("chat message without ids".into()));
            }
            Validated::Message(incoming.into_message())
        } else {
            let update: MessageStatusUpdate = serde_json::from_value(body)
                .map_err(|e| malformed(format!("invalid message status: {e}")))?;
            let message_id = update
                .message_id
                .filter(|id| !id.trim().is_empty())
                .ok_or_else(|| malformed("missing message id".into()))?;
            let status = update
                .status
                .ok_or_else(|| malformed("missing delivery status".into()))?;
            let Ok(status) = status.parse::<DeliveryStatus>() else {
                info!(%status, "unknown delivery status ignored");
                return Err(DropReason::UnknownAction(status));
            };
            Validated::Status { message_id, status }
        };

        if self.session.current().await.is_none() {
            debug!(notification_type = notification_type.tag(), "message dropped: signed out");
            return Err(DropReason::SignedOut);
        }
        Ok(validated)
    }

    async fn validate_notification(
        &self,
        notification_type: NotificationType,
        body: serde_json::Value,
    ) -> Result<PendingNotification, DropReason> {
        let kind = notification_type.resource_kind();
        let raw: RawNotification = serde_json::from_value(body)
            .map_err(|e| malformed(format!("invalid message body: {e}")))?;

        let action = raw
            .action
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| malformed("missing action".into()))?;
        let subject_id = raw
            .subject_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| malformed("missing subject id".into()))?;
        let members = raw
            .affected_member_ids
            .ok_or_else(|| malformed("missing affected member ids".into()))?;

        let action = match NotificationAction::parse(&action, raw.status.as_deref()) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => {
                info!(%kind, %action, "unknown notification action ignored");
                return Err(DropReason::UnknownAction(action));
            }
            Err(SyncError::MalformedNotification(detail)) => return Err(malformed(detail)),
            Err(e) => return Err(malformed(e.to_string())),
        };

        let notification = PendingNotification {
            kind,
            action,
            subject_id,
            affected_member_ids: members.into_iter().collect(),
        };

        let Some(session) = self.session.current().await else {
            debug!(%kind, "notification dropped: signed out");
            return Err(DropReason::SignedOut);
        };
        if !notification.affects(&session.user_id) {
            debug!(%kind, subject = %notification.subject_id, "notification not addressed to this user");
            return Err(DropReason::NotAddressed);
        }

        Ok(notification)
    }
}

fn malformed(detail: String) -> DropReason {
    warn!(error = %SyncError::MalformedNotification(detail.clone()), "notification dropped");
    DropReason::Malformed(detail)
}

fn no_message_handler() -> Dispatch {
    warn!("no message handler registered, message dropped");
    Dispatch::Dropped(DropReason::NoHandler)
}

fn drop_malformed(detail: String) -> Dispatch {
    Dispatch::Dropped(malformed(detail))
}
