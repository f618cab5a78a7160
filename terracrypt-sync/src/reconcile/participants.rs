use super::{apply_snapshot, take_incoming, ResourceReconciler, Snapshot, SyncContext};
use crate::error::SyncResult;
use crate::notification::{NotificationAction, PendingNotification};
use async_trait::async_trait;
use std::collections::HashSet;
use terracrypt_store::ResourceStore;
use terracrypt_types::{ChangeSet, Participant, Record, ResourceKind, Resource, Scope};
use tracing::{debug, warn};

/// Chat membership rows.
///
/// Snapshots are usually scoped to one chat; rows of chats that are not
/// cached are dropped before reconciliation since a participant cannot
/// outlive its chat.
#[derive(Clone)]
pub struct ParticipantReconciler {
    ctx: SyncContext,
}

impl ParticipantReconciler {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    /// Pulls the member list of one chat.
    pub async fn pull_chat(&self, chat_id: &str) -> SyncResult<ChangeSet> {
        let token = self.ctx.session.token().await?;
        let members = self.ctx.gateway.fetch_chat_members(&token, chat_id).await?;
        let records = members.into_iter().map(Participant::into_record).collect();
        self.reconcile_pull(Snapshot::for_chat(ResourceKind::Participant, chat_id, records))
            .await
    }

    /// Pulls members of every chat the user belongs to.
    pub async fn pull(&self) -> SyncResult<ChangeSet> {
        let token = self.ctx.session.token().await?;
        let records = self
            .ctx
            .gateway
            .fetch_all(ResourceKind::Participant, &token)
            .await?;
        self.reconcile_pull(Snapshot::all(ResourceKind::Participant, records))
            .await
    }

    /// Pulls members chat by chat for every cached chat. Failures are
    /// logged per chat; returns the merged changes and the failure count.
    pub async fn pull_cached_chats(&self) -> SyncResult<(ChangeSet, usize)> {
        let chat_ids: Vec<String> = self
            .ctx
            .with_store("cached chat ids", |store| {
                Ok(store
                    .list_all(ResourceKind::Chat)?
                    .iter()
                    .map(|r| r.id().to_string())
                    .collect())
            })
            .await?;

        let mut changes = ChangeSet::new(ResourceKind::Participant);
        let mut failures = 0;
        for chat_id in chat_ids {
            match self.pull_chat(&chat_id).await {
                Ok(c) => changes.merge(c),
                Err(e) => {
                    failures += 1;
                    warn!(chat = %chat_id, error = %e, "participant pull failed");
                }
            }
        }
        Ok((changes, failures))
    }

    /// Removes every cached member of one chat, leaving the chat itself.
    async fn clear_chat(&self, chat_id: &str) -> SyncResult<ChangeSet> {
        let _writes = self
            .ctx
            .coordinator
            .lock_writes(ResourceKind::Participant)
            .await;
        let scope = Scope::Chat(chat_id.to_string());
        let changes = self
            .ctx
            .with_store("participant clear", move |store| {
                let mut changes = ChangeSet::new(ResourceKind::Participant);
                for record in store.list_scope(ResourceKind::Participant, &scope)? {
                    if store.delete(ResourceKind::Participant, record.id())? {
                        changes.removed.insert(record.id().to_string());
                    }
                }
                Ok(changes)
            })
            .await?;
        self.ctx.publish(&changes);
        Ok(changes)
    }
}

fn without_orphans(store: &dyn ResourceStore, records: Vec<Record>) -> SyncResult<Vec<Record>> {
    let cached: HashSet<String> = store
        .list_all(ResourceKind::Chat)?
        .iter()
        .map(|r| r.id().to_string())
        .collect();
    Ok(records
        .into_iter()
        .filter(|r| match r.chat_id() {
            Some(chat_id) if cached.contains(chat_id) => true,
            _ => {
                debug!(participant = r.id(), "participant of uncached chat skipped");
                false
            }
        })
        .collect())
}

#[async_trait]
impl ResourceReconciler for ParticipantReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Participant
    }

    async fn reconcile_pull(&self, snapshot: Snapshot) -> SyncResult<ChangeSet> {
        let _writes = self
            .ctx
            .coordinator
            .lock_writes(ResourceKind::Participant)
            .await;

        let changes = self
            .ctx
            .with_store("participant snapshot", move |store| {
                let records = without_orphans(store, snapshot.records)?;
                let snapshot = Snapshot { records, ..snapshot };
                apply_snapshot(store, snapshot, take_incoming, |id| {
                    Ok(store.delete(ResourceKind::Participant, id)?)
                })
            })
            .await?;
        self.ctx.publish(&changes);
        Ok(changes)
    }

    /// Member notifications carry the chat id as subject. A deletion
    /// clears the chat's members; anything else re-pulls them.
    async fn reconcile_push(&self, notification: &PendingNotification) -> SyncResult<ChangeSet> {
        let chat_id = notification.subject_id.as_str();
        match notification.action {
            NotificationAction::Deleted => self.clear_chat(chat_id).await,
            NotificationAction::Created | NotificationAction::StatusChanged(_) => {
                self.pull_chat(chat_id).await
            }
        }
    }
}
