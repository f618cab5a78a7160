//! Single-flight, cooldown-gated execution of pulls per resource kind.
//!
//! Each [`ResourceKind`] owns a slot holding its [`SyncState`] and a write
//! lock. The state lock is only ever held for the check-and-set around a
//! run, never across an await. The write lock serializes reconciliation
//! writes of that kind between pulls and push handlers.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use terracrypt_types::ResourceKind;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Why a run request did not execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another run of the same kind is executing.
    InFlight,
    /// The last successful run completed too recently.
    Cooldown { remaining: Duration },
}

/// Result of a gated run request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome<T> {
    Ran(T),
    Skipped(SkipReason),
}

impl<T> SyncOutcome<T> {
    pub fn is_skipped(&self) -> bool {
        matches!(self, SyncOutcome::Skipped(_))
    }

    pub fn ran(self) -> Option<T> {
        match self {
            SyncOutcome::Ran(v) => Some(v),
            SyncOutcome::Skipped(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SyncOutcome<U> {
        match self {
            SyncOutcome::Ran(v) => SyncOutcome::Ran(f(v)),
            SyncOutcome::Skipped(r) => SyncOutcome::Skipped(r),
        }
    }
}

/// Snapshot of one kind's gating state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncState {
    pub in_flight: bool,
    /// Completion time of the last successful run (monotonic).
    pub last_sync_at: Option<Instant>,
    /// Wall-clock completion time of the last successful run; the
    /// watermark for delta fetches.
    pub last_sync_wall: Option<DateTime<Utc>>,
    pub cooldown: Duration,
}

impl SyncState {
    fn new(cooldown: Duration) -> Self {
        Self {
            in_flight: false,
            last_sync_at: None,
            last_sync_wall: None,
            cooldown,
        }
    }

    fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        let last = self.last_sync_at?;
        let elapsed = now.saturating_duration_since(last);
        (elapsed < self.cooldown).then(|| self.cooldown - elapsed)
    }
}

struct Slot {
    state: Mutex<SyncState>,
    writes: Arc<AsyncMutex<()>>,
}

impl Slot {
    fn state(&self) -> MutexGuard<'_, SyncState> {
        // A poisoned lock only means a panic mid check-and-set; the state
        // itself is plain data and stays usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Clears `in_flight` however the run ends, including panic or abort.
struct InFlightGuard {
    slot: Arc<Slot>,
}

impl InFlightGuard {
    fn complete(&self) {
        let mut state = self.slot.state();
        state.last_sync_at = Some(Instant::now());
        state.last_sync_wall = Some(Utc::now());
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.slot.state().in_flight = false;
    }
}

/// Gatekeeper for every pull, whatever triggered it.
pub struct SyncCoordinator {
    slots: [Arc<Slot>; 3],
}

impl SyncCoordinator {
    pub fn new(cooldown: Duration) -> Self {
        let slot = || {
            Arc::new(Slot {
                state: Mutex::new(SyncState::new(cooldown)),
                writes: Arc::new(AsyncMutex::new(())),
            })
        };
        Self {
            slots: [slot(), slot(), slot()],
        }
    }

    fn slot(&self, kind: ResourceKind) -> &Arc<Slot> {
        &self.slots[kind.index()]
    }

    pub fn state(&self, kind: ResourceKind) -> SyncState {
        *self.slot(kind).state()
    }

    /// Runs `op` unless a run of `kind` is in flight or the cooldown since
    /// the last successful run has not elapsed.
    ///
    /// The operation executes on its own task: a caller that stops
    /// awaiting does not cancel it, and `in_flight` is cleared when the
    /// task finishes.
    pub async fn try_run<T, F, Fut>(&self, kind: ResourceKind, op: F) -> SyncResult<SyncOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.run_gated(kind, false, op).await
    }

    /// Like [`try_run`](Self::try_run) but ignores the cooldown and resets
    /// it. A run already in flight still wins; the forced request is skipped.
    pub async fn force_run<T, F, Fut>(
        &self,
        kind: ResourceKind,
        op: F,
    ) -> SyncResult<SyncOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.run_gated(kind, true, op).await
    }

    async fn run_gated<T, F, Fut>(
        &self,
        kind: ResourceKind,
        forced: bool,
        op: F,
    ) -> SyncResult<SyncOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let slot = Arc::clone(self.slot(kind));
        {
            let mut state = slot.state();
            if state.in_flight {
                debug!(%kind, forced, "sync skipped: already in flight");
                return Ok(SyncOutcome::Skipped(SkipReason::InFlight));
            }
            if !forced && let Some(remaining) = state.cooldown_remaining(Instant::now()) {
                debug!(%kind, ?remaining, "sync skipped: cooling down");
                return Ok(SyncOutcome::Skipped(SkipReason::Cooldown { remaining }));
            }
            if forced {
                // Forced runs restart the cooldown clock.
                state.last_sync_at = None;
            }
            state.in_flight = true;
        }

        let guard = InFlightGuard { slot };
        let fut = op();
        let task = tokio::spawn(async move {
            let result = fut.await;
            if result.is_ok() {
                guard.complete();
            }
            drop(guard);
            result
        });

        match task.await {
            Ok(result) => {
                if let Err(e) = &result {
                    warn!(%kind, error = %e, "sync run failed");
                }
                result.map(SyncOutcome::Ran)
            }
            Err(e) => Err(SyncError::Task(e.to_string())),
        }
    }

    /// Exclusive write access to the cached rows of `kind`.
    pub async fn lock_writes(&self, kind: ResourceKind) -> OwnedMutexGuard<()> {
        Arc::clone(&self.slot(kind).writes).lock_owned().await
    }

    /// Write locks for several kinds, always acquired in [`ResourceKind`]
    /// order so that overlapping callers cannot deadlock.
    pub async fn lock_writes_many(&self, kinds: &[ResourceKind]) -> Vec<OwnedMutexGuard<()>> {
        let mut ordered = kinds.to_vec();
        ordered.sort();
        ordered.dedup();
        let mut guards = Vec::with_capacity(ordered.len());
        for kind in ordered {
            guards.push(self.lock_writes(kind).await);
        }
        guards
    }
}
