use super::{apply_delta, apply_snapshot, ResourceReconciler, Snapshot, SyncContext};
use crate::error::{SyncError, SyncResult};
use crate::notification::{NotificationAction, PendingNotification};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use terracrypt_types::{ChangeSet, Record, RequestStatus, ResourceKind};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Friends plus the set of unanswered incoming friend requests.
///
/// Pending requests are not store rows; their count is exposed through a
/// [`watch`] channel for the UI badge.
#[derive(Clone)]
pub struct FriendReconciler {
    ctx: SyncContext,
    pending: Arc<Mutex<BTreeSet<String>>>,
    pending_tx: Arc<watch::Sender<usize>>,
}

impl FriendReconciler {
    pub fn new(ctx: SyncContext) -> Self {
        let (pending_tx, _) = watch::channel(0);
        Self {
            ctx,
            pending: Arc::new(Mutex::new(BTreeSet::new())),
            pending_tx: Arc::new(pending_tx),
        }
    }

    /// Fetches the full friend list and reconciles it.
    pub async fn pull(&self) -> SyncResult<ChangeSet> {
        let token = self.ctx.session.token().await?;
        let records = self
            .ctx
            .gateway
            .fetch_all(ResourceKind::Friend, &token)
            .await?;
        self.reconcile_pull(Snapshot::all(ResourceKind::Friend, records))
            .await
    }

    /// Upserts friends changed since `since`. Never removes rows.
    pub async fn pull_delta(&self, since: DateTime<Utc>) -> SyncResult<ChangeSet> {
        let token = self.ctx.session.token().await?;
        let records = self
            .ctx
            .gateway
            .fetch_delta(ResourceKind::Friend, &token, since)
            .await?;

        let _writes = self.ctx.coordinator.lock_writes(ResourceKind::Friend).await;
        let changes = self
            .ctx
            .with_store("friend delta", move |store| {
                apply_delta(store, ResourceKind::Friend, records, merge_friend)
            })
            .await?;
        self.ctx.publish(&changes);
        Ok(changes)
    }

    /// Replaces the pending set with the server's list of open requests.
    pub async fn refresh_pending_requests(&self) -> SyncResult<usize> {
        let token = self.ctx.session.token().await?;
        let requests = self.ctx.gateway.fetch_friend_requests(&token).await?;
        let ids: BTreeSet<String> = requests
            .into_iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .map(|r| r.request_id)
            .collect();
        let count = ids.len();
        *self.pending_set() = ids;
        self.pending_tx.send_replace(count);
        Ok(count)
    }

    pub fn pending_request_count(&self) -> usize {
        self.pending_set().len()
    }

    pub fn pending_request_ids(&self) -> Vec<String> {
        self.pending_set().iter().cloned().collect()
    }

    pub fn watch_pending_requests(&self) -> watch::Receiver<usize> {
        self.pending_tx.subscribe()
    }

    /// Records an incoming request. Returns false if it was already known.
    pub(crate) fn track_request(&self, request_id: &str) -> bool {
        let (inserted, count) = {
            let mut pending = self.pending_set();
            (pending.insert(request_id.to_string()), pending.len())
        };
        if inserted {
            self.pending_tx.send_replace(count);
        }
        inserted
    }

    /// Forgets an answered or withdrawn request.
    pub(crate) fn resolve_request(&self, request_id: &str) -> bool {
        let (removed, count) = {
            let mut pending = self.pending_set();
            (pending.remove(request_id), pending.len())
        };
        if removed {
            self.pending_tx.send_replace(count);
        }
        removed
    }

    /// Deletes one cached friend. Absent rows are not an error.
    pub async fn remove_friend(&self, friend_id: &str) -> SyncResult<ChangeSet> {
        let _writes = self.ctx.coordinator.lock_writes(ResourceKind::Friend).await;
        let target = friend_id.to_string();
        let removed = self
            .ctx
            .with_store("friend delete", move |store| {
                Ok(store.delete(ResourceKind::Friend, &target)?)
            })
            .await?;
        let mut changes = ChangeSet::new(ResourceKind::Friend);
        if removed {
            changes.removed.insert(friend_id.to_string());
        }
        self.ctx.publish(&changes);
        Ok(changes)
    }

    /// Pull through the coordinator, bypassing the cooldown.
    pub async fn force_pull(&self) -> SyncResult<ChangeSet> {
        let this = self.clone();
        let outcome = self
            .ctx
            .coordinator
            .force_run(ResourceKind::Friend, move || async move { this.pull().await })
            .await?;
        Ok(outcome.ran().unwrap_or_else(|| ChangeSet::new(ResourceKind::Friend)))
    }

    fn pending_set(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn merge_friend(current: &Record, incoming: Record) -> Record {
    match (current, incoming) {
        (Record::Friend(current), Record::Friend(mut friend)) => {
            friend.created_at = current.created_at;
            Record::Friend(friend)
        }
        (_, incoming) => incoming,
    }
}

#[async_trait]
impl ResourceReconciler for FriendReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Friend
    }

    async fn reconcile_pull(&self, snapshot: Snapshot) -> SyncResult<ChangeSet> {
        let _writes = self.ctx.coordinator.lock_writes(ResourceKind::Friend).await;
        let changes = self
            .ctx
            .with_store("friend snapshot", move |store| {
                apply_snapshot(store, snapshot, merge_friend, |id| {
                    Ok(store.delete(ResourceKind::Friend, id)?)
                })
            })
            .await?;
        self.ctx.publish(&changes);
        Ok(changes)
    }

    async fn reconcile_push(&self, notification: &PendingNotification) -> SyncResult<ChangeSet> {
        let subject = notification.subject_id.as_str();
        match notification.action {
            NotificationAction::StatusChanged(RequestStatus::Pending) => {
                if !self.track_request(subject) {
                    debug!(request = subject, "duplicate pending request notification");
                }
                Ok(ChangeSet::new(ResourceKind::Friend))
            }
            NotificationAction::StatusChanged(RequestStatus::Accepted) => {
                self.resolve_request(subject);
                self.force_pull().await
            }
            NotificationAction::StatusChanged(RequestStatus::Declined) => {
                debug!(request = subject, "declined request ignored");
                Ok(ChangeSet::new(ResourceKind::Friend))
            }
            NotificationAction::Created => {
                let changes = self.force_pull().await?;
                let lookup = subject.to_string();
                let present = self
                    .ctx
                    .with_store("friend lookup", move |store| {
                        Ok(store.get(ResourceKind::Friend, &lookup)?.is_some())
                    })
                    .await?;
                if !present {
                    let err = SyncError::NotFound(format!("friend {subject}"));
                    warn!(error = %err, "created friend not present after pull");
                }
                Ok(changes)
            }
            NotificationAction::Deleted => {
                self.resolve_request(subject);
                self.remove_friend(subject).await
            }
        }
    }
}

