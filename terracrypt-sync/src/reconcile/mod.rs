//! Per-kind reconciliation of pulls and pushes into the local store.
//!
//! A pull snapshot is authoritative for its [`Scope`]: rows missing from it
//! are deleted, rows whose server-owned content is unchanged are not
//! written. Applying the same snapshot twice therefore writes nothing the
//! second time and reports an empty [`ChangeSet`].
//!
//! Store access is synchronous; reconcilers run it on the blocking pool
//! through `SyncContext::with_store` while holding the kind's write lock.

mod chats;
mod friends;
mod messages;
mod participants;

pub use chats::ChatReconciler;
pub use friends::FriendReconciler;
pub use messages::MessageReconciler;
pub use participants::ParticipantReconciler;

use crate::coordinator::SyncCoordinator;
use crate::error::{SyncError, SyncResult};
use crate::notification::PendingNotification;
use crate::observer::ObserverRegistry;
use crate::router::NotificationHandler;
use crate::session::SessionHandle;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use terracrypt_remote::RemoteGateway;
use terracrypt_store::ResourceStore;
use terracrypt_types::{ChangeSet, Record, ResourceKind, Scope};
use tracing::{debug, warn};

/// Collaborators shared by every reconciler.
#[derive(Clone)]
pub struct SyncContext {
    pub store: Arc<dyn ResourceStore>,
    pub gateway: Arc<dyn RemoteGateway>,
    pub coordinator: Arc<SyncCoordinator>,
    pub observers: Arc<ObserverRegistry>,
    pub session: SessionHandle,
}

impl SyncContext {
    /// Hands a non-empty change set to observers.
    pub(crate) fn publish(&self, changes: &ChangeSet) {
        if !changes.is_empty() {
            self.observers.publish(changes);
        }
    }

    /// Runs `work` against the store on the blocking pool. A panic inside
    /// `work` surfaces as [`SyncError::Task`].
    pub(crate) async fn with_store<T, F>(&self, what: &'static str, work: F) -> SyncResult<T>
    where
        F: FnOnce(&dyn ResourceStore) -> SyncResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || work(store.as_ref())).await {
            Ok(result) => result,
            Err(e) => {
                warn!("[SYNC] spawn_blocking panicked during {}: {}", what, e);
                Err(SyncError::Task(format!("{what}: {e}")))
            }
        }
    }
}

/// A full pull result, authoritative for `scope`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub kind: ResourceKind,
    pub scope: Scope,
    pub records: Vec<Record>,
}

impl Snapshot {
    pub fn all(kind: ResourceKind, records: Vec<Record>) -> Self {
        Self {
            kind,
            scope: Scope::All,
            records,
        }
    }

    pub fn for_chat(kind: ResourceKind, chat_id: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            kind,
            scope: Scope::Chat(chat_id.into()),
            records,
        }
    }
}

/// Reconciler contract for one resource kind.
#[async_trait]
pub trait ResourceReconciler: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Applies an authoritative snapshot. Publishes and returns the delta.
    async fn reconcile_pull(&self, snapshot: Snapshot) -> SyncResult<ChangeSet>;

    /// Applies one validated push notification.
    async fn reconcile_push(&self, notification: &PendingNotification) -> SyncResult<ChangeSet>;
}

#[async_trait]
impl<R: ResourceReconciler> NotificationHandler for R {
    async fn handle(&self, notification: &PendingNotification) -> SyncResult<ChangeSet> {
        self.reconcile_push(notification).await
    }
}

/// Writes `records` that differ from the cached rows in `existing`.
/// Returns the ids of cached rows the records did not mention.
fn upsert_changed<M>(
    store: &dyn ResourceStore,
    kind: ResourceKind,
    scope: &Scope,
    records: Vec<Record>,
    mut existing: HashMap<String, Record>,
    merge: &mut M,
    changes: &mut ChangeSet,
) -> SyncResult<Vec<String>>
where
    M: FnMut(&Record, Record) -> Record,
{
    // Later duplicates win.
    let mut incoming: BTreeMap<String, Record> = BTreeMap::new();
    for record in records {
        if record.kind() != kind || !scope.contains(&record) {
            warn!(%kind, id = record.id(), "record outside snapshot scope skipped");
            continue;
        }
        incoming.insert(record.id().to_string(), record);
    }

    for (id, record) in incoming {
        match existing.remove(&id) {
            Some(current) if current.same_content(&record) => {}
            Some(current) => {
                store.upsert(&merge(&current, record))?;
                changes.updated.insert(id);
            }
            None => {
                store.upsert(&record)?;
                changes.added.insert(id);
            }
        }
    }

    Ok(existing.into_keys().collect())
}

fn cached(
    store: &dyn ResourceStore,
    kind: ResourceKind,
    scope: &Scope,
) -> SyncResult<HashMap<String, Record>> {
    Ok(store
        .list_scope(kind, scope)?
        .into_iter()
        .map(|r| (r.id().to_string(), r))
        .collect())
}

/// Full-replace reconciliation of `snapshot` within its scope.
///
/// `merge` builds the stored row from the cached and incoming versions
/// when content differs; `remove` deletes one stale row and reports
/// whether it existed. Callers hold the kind's write lock.
///
/// Writes are not wrapped in a transaction. If one fails midway the rows
/// already written stay, and the error is returned without publishing;
/// the next pull of the same scope converges the cache since unchanged
/// rows are skipped and stale rows are still detected.
pub(crate) fn apply_snapshot<M, D>(
    store: &dyn ResourceStore,
    snapshot: Snapshot,
    mut merge: M,
    mut remove: D,
) -> SyncResult<ChangeSet>
where
    M: FnMut(&Record, Record) -> Record,
    D: FnMut(&str) -> SyncResult<bool>,
{
    let Snapshot {
        kind,
        scope,
        records,
    } = snapshot;
    let mut changes = ChangeSet::new(kind);
    let existing = cached(store, kind, &scope)?;
    let stale = upsert_changed(
        store,
        kind,
        &scope,
        records,
        existing,
        &mut merge,
        &mut changes,
    )?;
    for id in stale {
        if remove(&id)? {
            changes.removed.insert(id);
        }
    }
    debug!(
        %kind,
        added = changes.added.len(),
        updated = changes.updated.len(),
        removed = changes.removed.len(),
        "snapshot applied"
    );
    Ok(changes)
}

/// Upsert-only reconciliation for delta fetches; nothing is removed.
pub(crate) fn apply_delta<M>(
    store: &dyn ResourceStore,
    kind: ResourceKind,
    records: Vec<Record>,
    mut merge: M,
) -> SyncResult<ChangeSet>
where
    M: FnMut(&Record, Record) -> Record,
{
    let mut changes = ChangeSet::new(kind);
    let existing = cached(store, kind, &Scope::All)?;
    upsert_changed(
        store,
        kind,
        &Scope::All,
        records,
        existing,
        &mut merge,
        &mut changes,
    )?;
    Ok(changes)
}

/// Keeps the incoming row as is.
pub(crate) fn take_incoming(_current: &Record, incoming: Record) -> Record {
    incoming
}
