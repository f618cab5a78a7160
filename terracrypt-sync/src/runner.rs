//! Background sync loop.
//!
//! The runner owns the push queue, so notifications are reconciled one at a
//! time in arrival order. It also runs the periodic delta fetch and
//! executes commands sent through a [`SyncHandle`].

use crate::coordinator::SyncOutcome;
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::router::Dispatch;
use std::sync::Arc;
use terracrypt_types::ResourceKind;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Kinds refreshed on every poll tick. Participants follow their chats.
const POLLED_KINDS: [ResourceKind; 2] = [ResourceKind::Friend, ResourceKind::Chat];

/// Commands accepted by the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncCommand {
    /// Pull `kind` unless it is in flight or cooling down.
    SyncNow { kind: ResourceKind },
    /// Pull `kind` ignoring the cooldown.
    ForceSync { kind: ResourceKind },
    /// Stop the runner.
    Shutdown,
}

/// Cloneable handle for feeding the runner.
#[derive(Clone)]
pub struct SyncHandle {
    command_tx: mpsc::Sender<SyncCommand>,
    push_tx: mpsc::Sender<serde_json::Value>,
}

impl SyncHandle {
    pub async fn send(&self, cmd: SyncCommand) -> SyncResult<()> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }

    pub async fn sync_now(&self, kind: ResourceKind) -> SyncResult<()> {
        self.send(SyncCommand::SyncNow { kind }).await
    }

    pub async fn force_sync(&self, kind: ResourceKind) -> SyncResult<()> {
        self.send(SyncCommand::ForceSync { kind }).await
    }

    /// Queues one push envelope for dispatch.
    pub async fn push(&self, envelope: serde_json::Value) -> SyncResult<()> {
        self.push_tx
            .send(envelope)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }

    /// Queues a raw text frame; frames that are not JSON are dropped here.
    pub async fn push_frame(&self, frame: &str) -> SyncResult<()> {
        match serde_json::from_str(frame) {
            Ok(envelope) => self.push(envelope).await,
            Err(e) => {
                warn!("[SYNC] Dropping non-JSON push frame: {}", e);
                Ok(())
            }
        }
    }

    pub async fn shutdown(&self) -> SyncResult<()> {
        self.send(SyncCommand::Shutdown).await
    }
}

pub struct SyncRunner {
    engine: Arc<SyncEngine>,
    command_rx: mpsc::Receiver<SyncCommand>,
    push_rx: mpsc::Receiver<serde_json::Value>,
}

/// Creates a runner for `engine` and the handle that drives it.
pub fn create_sync_runner(engine: Arc<SyncEngine>) -> (SyncHandle, SyncRunner) {
    let config = engine.config();
    let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
    let (push_tx, push_rx) = mpsc::channel(config.push_buffer.max(1));
    (
        SyncHandle {
            command_tx,
            push_tx,
        },
        SyncRunner {
            engine,
            command_rx,
            push_rx,
        },
    )
}

impl SyncRunner {
    /// Runs until [`SyncCommand::Shutdown`] or until every handle is dropped.
    pub async fn run(mut self) {
        let mut poll = tokio::time::interval(self.engine.config().poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the cold start already pulled.
        poll.tick().await;

        info!("[SYNC] Runner started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        info!("[SYNC] Command channel closed, runner stopping");
                        break;
                    };
                    debug!("[SYNC] Received command: {:?}", cmd);
                    match cmd {
                        SyncCommand::Shutdown => {
                            info!("[SYNC] Runner shutting down");
                            break;
                        }
                        SyncCommand::SyncNow { kind } => {
                            report(kind, "sync", self.engine.refresh(kind).await);
                        }
                        SyncCommand::ForceSync { kind } => {
                            report(kind, "forced sync", self.engine.force_refresh(kind).await);
                        }
                    }
                }

                Some(envelope) = self.push_rx.recv() => {
                    self.handle_push(&envelope).await;
                }

                _ = poll.tick() => {
                    debug!("[SYNC] Poll interval tick");
                    for kind in POLLED_KINDS {
                        report(kind, "delta sync", self.engine.refresh_delta(kind).await);
                    }
                }
            }
        }
    }

    async fn handle_push(&self, envelope: &serde_json::Value) {
        match self.engine.dispatch(envelope).await {
            Ok(Dispatch::Applied(changes)) => {
                debug!("[SYNC] Push applied to {}: {} change(s)", changes.kind, changes.len());
            }
            Ok(Dispatch::Dropped(reason)) => {
                debug!("[SYNC] Push dropped: {:?}", reason);
            }
            Err(e) => {
                warn!("[SYNC] Push reconciliation failed: {}", e);
            }
        }
    }
}

fn report(
    kind: ResourceKind,
    what: &str,
    result: SyncResult<SyncOutcome<terracrypt_types::ChangeSet>>,
) {
    match result {
        Ok(SyncOutcome::Ran(changes)) => {
            debug!("[SYNC] {} of {} finished: {} change(s)", what, kind, changes.len());
        }
        Ok(SyncOutcome::Skipped(reason)) => {
            debug!("[SYNC] {} of {} skipped: {:?}", what, kind, reason);
        }
        Err(e) => {
            warn!("[SYNC] {} of {} failed: {}", what, kind, e);
        }
    }
}
