//! Weighted progress for the cold-start sequence.
//!
//! Steps run strictly in order. Progress is the completed weight over the
//! total weight, as a percentage; it only moves forward and reaches exactly
//! 100 when every step has finished. The first failing step stops the
//! sequence.

use crate::error::{SyncError, SyncResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// One unit of cold-start work.
pub struct Step {
    pub id: String,
    pub label: String,
    pub weight: u32,
    action: BoxFuture<'static, SyncResult<()>>,
}

impl Step {
    pub fn new<F>(id: impl Into<String>, label: impl Into<String>, weight: u32, action: F) -> Self
    where
        F: Future<Output = SyncResult<()>> + Send + 'static,
    {
        Self {
            id: id.into(),
            label: label.into(),
            weight,
            action: action.boxed(),
        }
    }

    /// A step whose failure is logged and counted as completed.
    pub fn non_critical<F>(
        id: impl Into<String>,
        label: impl Into<String>,
        weight: u32,
        action: F,
    ) -> Self
    where
        F: Future<Output = SyncResult<()>> + Send + 'static,
    {
        let id = id.into();
        let step_id = id.clone();
        Self::new(id, label, weight, async move {
            if let Err(e) = action.await {
                warn!(step = %step_id, error = %e, "non-critical step failed");
            }
            Ok::<(), SyncError>(())
        })
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

/// A progress event.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    /// Step being worked on; `None` on the final success event.
    pub step_id: Option<String>,
    pub label: String,
    pub percent: f64,
    pub is_complete: bool,
    pub error: Option<String>,
}

/// `completed / total * 100`, or 0 when there is no weight at all.
pub fn percent_complete(completed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    completed as f64 / total as f64 * 100.0
}

/// Runs one step sequence at a time.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    running: AtomicBool,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs `steps` in order, emitting an event when each starts and ends.
    ///
    /// Returns the final event. A step failure emits a final event with
    /// `error` set and returns [`SyncError::Step`]. A second concurrent run
    /// is rejected with [`SyncError::AlreadyRunning`]. Events are dropped
    /// if the receiver has gone away; the sequence keeps running.
    pub async fn run(&self, steps: Vec<Step>, events: mpsc::Sender<Progress>) -> SyncResult<Progress> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SyncError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.running);

        let total: u64 = steps.iter().map(|s| u64::from(s.weight)).sum();
        let mut completed: u64 = 0;

        for step in steps {
            let Step {
                id,
                label,
                weight,
                action,
            } = step;

            emit(
                &events,
                Progress {
                    step_id: Some(id.clone()),
                    label: label.clone(),
                    percent: percent_complete(completed, total),
                    is_complete: false,
                    error: None,
                },
            )
            .await;

            if let Err(e) = action.await {
                let message = e.to_string();
                warn!(step = %id, error = %message, "cold-start step failed");
                let failed = Progress {
                    step_id: Some(id.clone()),
                    label,
                    percent: percent_complete(completed, total),
                    is_complete: false,
                    error: Some(message.clone()),
                };
                emit(&events, failed).await;
                return Err(SyncError::Step { step: id, message });
            }

            completed += u64::from(weight);
            emit(
                &events,
                Progress {
                    step_id: Some(id),
                    label,
                    percent: percent_complete(completed, total),
                    is_complete: false,
                    error: None,
                },
            )
            .await;
        }

        let done = Progress {
            step_id: None,
            label: "Ready".to_string(),
            percent: 100.0,
            is_complete: true,
            error: None,
        };
        emit(&events, done.clone()).await;
        info!("cold start complete");
        Ok(done)
    }

    /// Runs `steps` on a new task and returns its event stream.
    pub fn spawn(
        self: &Arc<Self>,
        steps: Vec<Step>,
        buffer: usize,
    ) -> (mpsc::Receiver<Progress>, JoinHandle<SyncResult<Progress>>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let tracker = Arc::clone(self);
        let handle = tokio::spawn(async move { tracker.run(steps, tx).await });
        (rx, handle)
    }
}

async fn emit(events: &mpsc::Sender<Progress>, progress: Progress) {
    let _ = events.send(progress).await;
}
