//! Client-side cache synchronization for Terracrypt.
//!
//! Keeps the locally mirrored friends, chats and participants consistent
//! with the backend from three sources: on-demand pulls, periodic delta
//! fetches and push notifications.
//!
//! # Architecture
//!
//! - [`SyncCoordinator`] gates every pull per kind (single-flight + cooldown)
//! - [`NotificationRouter`] validates push envelopes and routes them to a handler
//! - [`FriendReconciler`], [`ChatReconciler`], [`ParticipantReconciler`] apply
//!   pulls and pushes to the store through one entry point per kind;
//!   [`MessageReconciler`] handles pushed messages and acknowledgements
//! - [`ObserverRegistry`] fans change sets out to UI subscribers
//! - [`ProgressTracker`] runs the weighted cold-start sequence
//! - [`SyncEngine`] wires all of the above; [`SyncRunner`] drives it in the background

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod notification;
pub mod observer;
pub mod progress;
pub mod reconcile;
pub mod router;
pub mod runner;
pub mod session;

pub use config::SyncConfig;
pub use coordinator::{SkipReason, SyncCoordinator, SyncOutcome, SyncState};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use notification::{ActionKind, NotificationAction, PendingNotification};
pub use observer::{ObserverCallback, ObserverRegistry, SubscriptionId};
pub use progress::{percent_complete, Progress, ProgressTracker, Step};
pub use reconcile::{
    ChatReconciler, FriendReconciler, MessageReconciler, ParticipantReconciler,
    ResourceReconciler, Snapshot, SyncContext,
};
pub use router::{
    Dispatch, DropReason, MessageHandler, NotificationHandler, NotificationRouter,
};
pub use runner::{create_sync_runner, SyncCommand, SyncHandle, SyncRunner};
pub use session::SessionHandle;
