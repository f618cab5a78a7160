use super::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::router::MessageHandler;
use async_trait::async_trait;
use terracrypt_store::ResourceStore;
use terracrypt_types::{ChangeSet, Chat, DeliveryStatus, Message, Record, ResourceKind, Resource};
use tracing::{debug, warn};

/// Message rows and the chat preview fields they drive.
///
/// Messages have no pull of their own; they arrive over the push channel
/// or from the UI after a send. Every write holds the chat write lock
/// since the parent chat row changes with them. Change sets are reported
/// against the chat.
#[derive(Clone)]
pub struct MessageReconciler {
    ctx: SyncContext,
}

impl MessageReconciler {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    /// Stores a message and refreshes its chat's preview. Incoming unread
    /// messages from other users bump the unread counter once; redelivery
    /// never moves the stored flags backwards.
    pub async fn record(&self, message: &Message) -> SyncResult<ChangeSet> {
        let from_other = match self.ctx.session.current().await {
            Some(session) => !session.is_user(&message.sender_id),
            None => true,
        };
        let _writes = self.ctx.coordinator.lock_writes(ResourceKind::Chat).await;
        let message = message.clone();
        let changes = self
            .ctx
            .with_store("message record", move |store| {
                store_message(store, message, from_other)
            })
            .await?;
        self.ctx.publish(&changes);
        Ok(changes)
    }

    /// Marks every message of a chat read and resets its unread counter.
    pub async fn mark_chat_read(&self, chat_id: &str) -> SyncResult<ChangeSet> {
        let _writes = self.ctx.coordinator.lock_writes(ResourceKind::Chat).await;
        let chat_id = chat_id.to_string();
        let changes = self
            .ctx
            .with_store("chat read", move |store| {
                let mut chat = cached_chat(store, &chat_id)?;
                for mut message in store.messages_for_chat(&chat_id)? {
                    if !message.is_read {
                        message.is_read = true;
                        store.upsert_message(&message)?;
                    }
                }

                let mut changes = ChangeSet::new(ResourceKind::Chat);
                if chat.unread_count > 0 {
                    chat.unread_count = 0;
                    store.upsert(&Record::Chat(chat))?;
                    changes.updated.insert(chat_id);
                }
                Ok(changes)
            })
            .await?;
        self.ctx.publish(&changes);
        Ok(changes)
    }

    /// Applies a delivery acknowledgement. Unknown messages and stale
    /// acknowledgements change nothing.
    pub async fn apply_status(
        &self,
        message_id: &str,
        status: DeliveryStatus,
    ) -> SyncResult<ChangeSet> {
        let _writes = self.ctx.coordinator.lock_writes(ResourceKind::Chat).await;
        let message_id = message_id.to_string();
        let changes = self
            .ctx
            .with_store("message status", move |store| {
                let mut changes = ChangeSet::new(ResourceKind::Chat);
                let Some(mut message) = store.get_message(&message_id)? else {
                    debug!(message = %message_id, %status, "status for uncached message ignored");
                    return Ok(changes);
                };
                if message.acknowledge(status) {
                    store.upsert_message(&message)?;
                    changes.updated.insert(message.chat_id);
                }
                Ok(changes)
            })
            .await?;
        self.ctx.publish(&changes);
        Ok(changes)
    }
}

fn cached_chat(store: &dyn ResourceStore, chat_id: &str) -> SyncResult<Chat> {
    store
        .get(ResourceKind::Chat, chat_id)?
        .and_then(Chat::from_record)
        .ok_or_else(|| SyncError::NotFound(format!("chat {chat_id}")))
}

fn store_message(
    store: &dyn ResourceStore,
    mut message: Message,
    from_other: bool,
) -> SyncResult<ChangeSet> {
    let mut chat = cached_chat(store, &message.chat_id)?;
    let known = store.get_message(&message.message_id)?;
    if let Some(existing) = &known {
        message.is_read |= existing.is_read;
        message.is_sent |= existing.is_sent;
        message.is_delivered |= existing.is_delivered;
    }
    store.upsert_message(&message)?;

    if chat
        .last_message_timestamp
        .is_none_or(|ts| message.timestamp >= ts)
    {
        chat.last_message_content = Some(message.content.clone());
        chat.last_message_timestamp = Some(message.timestamp);
    }
    if known.is_none() && !message.is_read && from_other {
        chat.unread_count = chat.unread_count.saturating_add(1);
    }

    store.upsert(&Record::Chat(chat))?;
    Ok(ChangeSet::new(ResourceKind::Chat).with_updated(message.chat_id))
}

#[async_trait]
impl MessageHandler for MessageReconciler {
    /// A pushed message for a chat that is not cached yet is dropped; the
    /// next chat pull brings the chat with its latest preview.
    async fn message_received(&self, message: Message) -> SyncResult<ChangeSet> {
        match self.record(&message).await {
            Err(SyncError::NotFound(what)) => {
                warn!(message = %message.message_id, %what, "message for uncached chat dropped");
                Ok(ChangeSet::new(ResourceKind::Chat))
            }
            other => other,
        }
    }

    async fn message_status(
        &self,
        message_id: &str,
        status: DeliveryStatus,
    ) -> SyncResult<ChangeSet> {
        self.apply_status(message_id, status).await
    }
}
