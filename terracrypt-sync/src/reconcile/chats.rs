use super::{
    apply_delta, apply_snapshot, ParticipantReconciler, ResourceReconciler, Snapshot, SyncContext,
};
use crate::error::{SyncError, SyncResult};
use crate::notification::{NotificationAction, PendingNotification};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use terracrypt_store::ResourceStore;
use terracrypt_types::{ChangeSet, Record, ResourceKind, Scope};
use tracing::{debug, info, warn};

/// Chats, with their participants and messages as dependents.
///
/// Removing a chat always removes its messages and participants first, in
/// that order, under the chat and participant write locks.
#[derive(Clone)]
pub struct ChatReconciler {
    ctx: SyncContext,
    participants: ParticipantReconciler,
}

/// Rows removed by one cascading chat delete.
#[derive(Debug, Default)]
struct Cascade {
    chat_removed: bool,
    participants: Vec<String>,
    messages: usize,
}

impl ChatReconciler {
    pub fn new(ctx: SyncContext, participants: ParticipantReconciler) -> Self {
        Self { ctx, participants }
    }

    /// Fetches every chat and reconciles the full list.
    pub async fn pull(&self) -> SyncResult<ChangeSet> {
        let token = self.ctx.session.token().await?;
        let records = self
            .ctx
            .gateway
            .fetch_all(ResourceKind::Chat, &token)
            .await?;
        self.reconcile_pull(Snapshot::all(ResourceKind::Chat, records))
            .await
    }

    /// Upserts chats changed since `since`. Never removes rows.
    pub async fn pull_delta(&self, since: DateTime<Utc>) -> SyncResult<ChangeSet> {
        let token = self.ctx.session.token().await?;
        let records = self
            .ctx
            .gateway
            .fetch_delta(ResourceKind::Chat, &token, since)
            .await?;

        let _writes = self.ctx.coordinator.lock_writes(ResourceKind::Chat).await;
        let changes = self
            .ctx
            .with_store("chat delta", move |store| {
                apply_delta(store, ResourceKind::Chat, records, merge_chat)
            })
            .await?;
        self.ctx.publish(&changes);
        Ok(changes)
    }

    /// Pull through the coordinator, bypassing the cooldown.
    pub async fn force_pull(&self) -> SyncResult<ChangeSet> {
        let this = self.clone();
        let outcome = self
            .ctx
            .coordinator
            .force_run(ResourceKind::Chat, move || async move { this.pull().await })
            .await?;
        Ok(outcome.ran().unwrap_or_else(|| ChangeSet::new(ResourceKind::Chat)))
    }

    /// Force-pulls chats, checks `chat_id` arrived, then pulls its members.
    ///
    /// A chat still missing after the pull is logged, not retried. Member
    /// pull failures are logged and do not fail the call.
    pub async fn adopt_new_chat(&self, chat_id: &str) -> SyncResult<ChangeSet> {
        let changes = self.force_pull().await?;

        let lookup = chat_id.to_string();
        let present = self
            .ctx
            .with_store("chat lookup", move |store| {
                Ok(store.get(ResourceKind::Chat, &lookup)?.is_some())
            })
            .await?;
        if !present {
            let err = SyncError::NotFound(format!("chat {chat_id}"));
            warn!(error = %err, "created chat not present after pull");
            return Ok(changes);
        }

        if let Err(e) = self.participants.pull_chat(chat_id).await {
            warn!(chat = chat_id, error = %e, "participant pull for new chat failed");
        }
        Ok(changes)
    }

    /// Removes a chat with its messages and participants. Idempotent.
    pub async fn remove_chat(&self, chat_id: &str) -> SyncResult<ChangeSet> {
        let _writes = self
            .ctx
            .coordinator
            .lock_writes_many(&[ResourceKind::Chat, ResourceKind::Participant])
            .await;
        let target = chat_id.to_string();
        let cascade = self
            .ctx
            .with_store("chat cascade", move |store| cascade_delete(store, &target))
            .await?;

        let mut changes = ChangeSet::new(ResourceKind::Chat);
        if cascade.chat_removed {
            changes.removed.insert(chat_id.to_string());
        }
        self.publish_cascade(&changes, cascade.participants);
        if cascade.chat_removed || cascade.messages > 0 {
            info!(chat = chat_id, messages = cascade.messages, "chat removed");
        } else {
            debug!(chat = chat_id, "chat already absent");
        }
        Ok(changes)
    }

    fn publish_cascade(&self, chats: &ChangeSet, participants: Vec<String>) {
        let mut members = ChangeSet::new(ResourceKind::Participant);
        members.removed.extend(participants);
        self.ctx.publish(&members);
        self.ctx.publish(chats);
    }
}

fn cascade_delete(store: &dyn ResourceStore, chat_id: &str) -> SyncResult<Cascade> {
    let messages = store.delete_messages_for_chat(chat_id)?;

    let mut participants = Vec::new();
    for record in store.list_scope(ResourceKind::Participant, &Scope::Chat(chat_id.to_string()))? {
        if store.delete(ResourceKind::Participant, record.id())? {
            participants.push(record.id().to_string());
        }
    }

    let chat_removed = store.delete(ResourceKind::Chat, chat_id)?;
    Ok(Cascade {
        chat_removed,
        participants,
        messages,
    })
}

/// Server fields win; unread count and last-message preview are local.
fn merge_chat(current: &Record, incoming: Record) -> Record {
    match (current, incoming) {
        (Record::Chat(current), Record::Chat(mut chat)) => {
            chat.unread_count = current.unread_count;
            if chat.last_message_timestamp.is_none() {
                chat.last_message_content = current.last_message_content.clone();
                chat.last_message_timestamp = current.last_message_timestamp;
            }
            Record::Chat(chat)
        }
        (_, incoming) => incoming,
    }
}

#[async_trait]
impl ResourceReconciler for ChatReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Chat
    }

    async fn reconcile_pull(&self, snapshot: Snapshot) -> SyncResult<ChangeSet> {
        let _writes = self
            .ctx
            .coordinator
            .lock_writes_many(&[ResourceKind::Chat, ResourceKind::Participant])
            .await;

        let (changes, removed_participants) = self
            .ctx
            .with_store("chat snapshot", move |store| {
                let mut removed = Vec::new();
                let changes = apply_snapshot(store, snapshot, merge_chat, |id| {
                    let cascade = cascade_delete(store, id)?;
                    removed.extend(cascade.participants);
                    Ok(cascade.chat_removed)
                })?;
                Ok((changes, removed))
            })
            .await?;
        self.publish_cascade(&changes, removed_participants);
        Ok(changes)
    }

    async fn reconcile_push(&self, notification: &PendingNotification) -> SyncResult<ChangeSet> {
        let chat_id = notification.subject_id.as_str();
        match notification.action {
            NotificationAction::Created => self.adopt_new_chat(chat_id).await,
            NotificationAction::Deleted => self.remove_chat(chat_id).await,
            NotificationAction::StatusChanged(status) => {
                debug!(chat = chat_id, %status, "status change on chat ignored");
                Ok(ChangeSet::new(ResourceKind::Chat))
            }
        }
    }
}
