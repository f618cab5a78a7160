//! The sync engine facade wired up for the UI layer.

use crate::config::SyncConfig;
use crate::coordinator::{SyncCoordinator, SyncOutcome};
use crate::error::{SyncError, SyncResult};
use crate::notification::ActionKind;
use crate::observer::{ObserverRegistry, SubscriptionId};
use crate::progress::{Progress, ProgressTracker, Step};
use crate::reconcile::{
    ChatReconciler, FriendReconciler, MessageReconciler, ParticipantReconciler, SyncContext,
};
use crate::router::{Dispatch, NotificationHandler, NotificationRouter};
use crate::session::SessionHandle;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use terracrypt_remote::{NewChat, RemoteGateway};
use terracrypt_store::ResourceStore;
use terracrypt_types::{
    ChangeSet, Chat, DeliveryStatus, Friend, Message, Participant, Resource, ResourceKind, Scope,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Owns the coordinator, reconcilers, router and progress tracker.
pub struct SyncEngine {
    config: SyncConfig,
    ctx: SyncContext,
    friends: FriendReconciler,
    chats: ChatReconciler,
    participants: ParticipantReconciler,
    messages: MessageReconciler,
    router: NotificationRouter,
    progress: Arc<ProgressTracker>,
}

impl SyncEngine {
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn ResourceStore>,
        gateway: Arc<dyn RemoteGateway>,
        session: SessionHandle,
    ) -> Self {
        let ctx = SyncContext {
            store,
            gateway,
            coordinator: Arc::new(SyncCoordinator::new(config.cooldown())),
            observers: Arc::new(ObserverRegistry::new()),
            session: session.clone(),
        };
        let participants = ParticipantReconciler::new(ctx.clone());
        let friends = FriendReconciler::new(ctx.clone());
        let chats = ChatReconciler::new(ctx.clone(), participants.clone());
        let messages = MessageReconciler::new(ctx.clone());

        let router = NotificationRouter::new(session);
        let friend_handler: Arc<dyn NotificationHandler> = Arc::new(friends.clone());
        let chat_handler: Arc<dyn NotificationHandler> = Arc::new(chats.clone());
        let member_handler: Arc<dyn NotificationHandler> = Arc::new(participants.clone());
        for action in [ActionKind::Created, ActionKind::Deleted, ActionKind::StatusChanged] {
            router.register_handler(ResourceKind::Friend, action, Arc::clone(&friend_handler));
            router.register_handler(ResourceKind::Participant, action, Arc::clone(&member_handler));
        }
        router.register_handler(ResourceKind::Chat, ActionKind::Created, Arc::clone(&chat_handler));
        router.register_handler(ResourceKind::Chat, ActionKind::Deleted, chat_handler);
        router.register_message_handler(Arc::new(messages.clone()));

        Self {
            config,
            ctx,
            friends,
            chats,
            participants,
            messages,
            router,
            progress: Arc::new(ProgressTracker::new()),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.ctx.coordinator
    }

    pub fn observers(&self) -> &ObserverRegistry {
        &self.ctx.observers
    }

    pub fn router(&self) -> &NotificationRouter {
        &self.router
    }

    pub fn session(&self) -> &SessionHandle {
        &self.ctx.session
    }

    pub fn friends(&self) -> &FriendReconciler {
        &self.friends
    }

    pub fn chats(&self) -> &ChatReconciler {
        &self.chats
    }

    pub fn participants(&self) -> &ParticipantReconciler {
        &self.participants
    }

    pub fn messages(&self) -> &MessageReconciler {
        &self.messages
    }

    pub fn subscribe<F>(&self, kind: ResourceKind, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.ctx.observers.subscribe(kind, callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.ctx.observers.unsubscribe(id)
    }

    // ── Pulls ──

    fn pull_op(&self, kind: ResourceKind) -> BoxFuture<'static, SyncResult<ChangeSet>> {
        match kind {
            ResourceKind::Friend => {
                let friends = self.friends.clone();
                async move { friends.pull().await }.boxed()
            }
            ResourceKind::Chat => {
                let chats = self.chats.clone();
                async move { chats.pull().await }.boxed()
            }
            ResourceKind::Participant => {
                let participants = self.participants.clone();
                async move { participants.pull().await }.boxed()
            }
        }
    }

    /// Full pull of `kind`, subject to single-flight and cooldown.
    pub async fn refresh(&self, kind: ResourceKind) -> SyncResult<SyncOutcome<ChangeSet>> {
        let op = self.pull_op(kind);
        self.ctx.coordinator.try_run(kind, move || op).await
    }

    /// Full pull of `kind` ignoring the cooldown (manual refresh).
    pub async fn force_refresh(&self, kind: ResourceKind) -> SyncResult<SyncOutcome<ChangeSet>> {
        let op = self.pull_op(kind);
        self.ctx.coordinator.force_run(kind, move || op).await
    }

    /// Delta fetch since the last successful sync of `kind`; falls back to
    /// a full pull when `kind` has never synced or has no delta endpoint.
    pub async fn refresh_delta(&self, kind: ResourceKind) -> SyncResult<SyncOutcome<ChangeSet>> {
        let since = self.ctx.coordinator.state(kind).last_sync_wall;
        let op: BoxFuture<'static, SyncResult<ChangeSet>> = match (kind, since) {
            (ResourceKind::Friend, Some(since)) => {
                let friends = self.friends.clone();
                async move { friends.pull_delta(since).await }.boxed()
            }
            (ResourceKind::Chat, Some(since)) => {
                let chats = self.chats.clone();
                async move { chats.pull_delta(since).await }.boxed()
            }
            _ => self.pull_op(kind),
        };
        self.ctx.coordinator.try_run(kind, move || op).await
    }

    /// Scoped member pull of one chat. Ignores the cooldown but not an
    /// in-flight participant sync.
    pub async fn refresh_participants(&self, chat_id: &str) -> SyncResult<SyncOutcome<ChangeSet>> {
        let participants = self.participants.clone();
        let chat_id = chat_id.to_string();
        self.ctx
            .coordinator
            .force_run(ResourceKind::Participant, move || async move {
                participants.pull_chat(&chat_id).await
            })
            .await
    }

    // ── Push ──

    pub async fn dispatch(&self, envelope: &serde_json::Value) -> SyncResult<Dispatch> {
        self.router.dispatch(envelope).await
    }

    pub async fn dispatch_text(&self, frame: &str) -> SyncResult<Dispatch> {
        self.router.dispatch_text(frame).await
    }

    // ── Actions ──

    /// Creates a chat remotely, then pulls it and its members into the cache.
    pub async fn create_chat(&self, chat: &NewChat) -> SyncResult<String> {
        let token = self.ctx.session.token().await?;
        let chat_id = self.ctx.gateway.create_chat(&token, chat).await?;
        info!(chat = %chat_id, "chat created");
        self.chats.adopt_new_chat(&chat_id).await?;
        Ok(chat_id)
    }

    pub async fn send_friend_request(&self, receiver_id: &str) -> SyncResult<()> {
        let token = self.ctx.session.token().await?;
        self.ctx
            .gateway
            .send_friend_request(&token, receiver_id)
            .await?;
        Ok(())
    }

    pub async fn accept_friend_request(&self, request_id: &str) -> SyncResult<ChangeSet> {
        let token = self.ctx.session.token().await?;
        self.ctx
            .gateway
            .accept_friend_request(&token, request_id)
            .await?;
        self.friends.resolve_request(request_id);
        self.friends.force_pull().await
    }

    pub async fn reject_friend_request(&self, request_id: &str) -> SyncResult<()> {
        let token = self.ctx.session.token().await?;
        self.ctx
            .gateway
            .reject_friend_request(&token, request_id)
            .await?;
        self.friends.resolve_request(request_id);
        Ok(())
    }

    pub async fn delete_chat(&self, chat_id: &str) -> SyncResult<ChangeSet> {
        let token = self.ctx.session.token().await?;
        self.ctx.gateway.delete_chat(&token, chat_id).await?;
        self.chats.remove_chat(chat_id).await
    }

    pub async fn leave_chat(&self, chat_id: &str) -> SyncResult<ChangeSet> {
        let token = self.ctx.session.token().await?;
        self.ctx.gateway.leave_chat(&token, chat_id).await?;
        self.chats.remove_chat(chat_id).await
    }

    pub async fn delete_friend(&self, user_id: &str) -> SyncResult<ChangeSet> {
        let token = self.ctx.session.token().await?;
        self.ctx.gateway.delete_friend(&token, user_id).await?;
        self.friends.remove_friend(user_id).await
    }

    // ── Messages ──

    /// Stores a message and refreshes its chat's preview. Incoming unread
    /// messages from other users bump the unread counter.
    pub async fn record_message(&self, message: &Message) -> SyncResult<ChangeSet> {
        self.messages.record(message).await
    }

    /// Marks every message of a chat read and resets its unread counter.
    pub async fn mark_chat_read(&self, chat_id: &str) -> SyncResult<ChangeSet> {
        self.messages.mark_chat_read(chat_id).await
    }

    /// Applies a delivery acknowledgement for one cached message.
    pub async fn acknowledge_message(
        &self,
        message_id: &str,
        status: DeliveryStatus,
    ) -> SyncResult<ChangeSet> {
        self.messages.apply_status(message_id, status).await
    }

    // ── Cached reads ──

    pub fn cached_friends(&self) -> SyncResult<Vec<Friend>> {
        self.cached(ResourceKind::Friend, &Scope::All)
    }

    pub fn cached_chats(&self) -> SyncResult<Vec<Chat>> {
        self.cached(ResourceKind::Chat, &Scope::All)
    }

    pub fn cached_participants(&self, chat_id: &str) -> SyncResult<Vec<Participant>> {
        self.cached(ResourceKind::Participant, &Scope::Chat(chat_id.to_string()))
    }

    pub fn cached_messages(&self, chat_id: &str) -> SyncResult<Vec<Message>> {
        Ok(self.ctx.store.messages_for_chat(chat_id)?)
    }

    pub fn pending_request_count(&self) -> usize {
        self.friends.pending_request_count()
    }

    fn cached<R: Resource>(&self, kind: ResourceKind, scope: &Scope) -> SyncResult<Vec<R>> {
        Ok(self
            .ctx
            .store
            .list_scope(kind, scope)?
            .into_iter()
            .filter_map(R::from_record)
            .collect())
    }

    // ── Cold start ──

    /// The default cold-start sequence: database, session, friends, chats,
    /// then a non-critical participant sync.
    pub fn cold_start_steps(self: &Arc<Self>) -> Vec<Step> {
        let engine = Arc::clone(self);
        let database = Step::new("database", "Opening local cache", 10, async move {
            engine
                .ctx
                .with_store("cache readiness", |store| Ok(store.ready()?))
                .await
        });

        let engine = Arc::clone(self);
        let session = Step::new("session", "Verifying session", 15, async move {
            let token = engine.ctx.session.token().await?;
            let user_id = engine.ctx.gateway.verify_session(&token).await?;
            if let Some(current) = engine.ctx.session.current().await
                && !current.is_user(&user_id)
            {
                warn!(session = %current.user_id, server = %user_id, "session user differs from server");
            }
            Ok::<(), SyncError>(())
        });

        let engine = Arc::clone(self);
        let friends = Step::new("friends", "Syncing friends", 20, async move {
            engine.force_refresh(ResourceKind::Friend).await?;
            if let Err(e) = engine.friends.refresh_pending_requests().await {
                warn!(error = %e, "pending friend requests unavailable");
            }
            Ok::<(), SyncError>(())
        });

        let engine = Arc::clone(self);
        let chats = Step::new("chats", "Syncing chats", 20, async move {
            engine.force_refresh(ResourceKind::Chat).await?;
            Ok::<(), SyncError>(())
        });

        let engine = Arc::clone(self);
        let participants =
            Step::non_critical("participants", "Syncing chat members", 15, async move {
                let members = engine.participants.clone();
                engine
                    .ctx
                    .coordinator
                    .force_run(ResourceKind::Participant, move || async move {
                        let (changes, failures) = members.pull_cached_chats().await?;
                        if failures > 0 {
                            warn!(failures, "some chat member lists failed to sync");
                        }
                        Ok::<_, SyncError>(changes)
                    })
                    .await?;
                Ok::<(), SyncError>(())
            });

        vec![database, session, friends, chats, participants]
    }

    /// Runs [`cold_start_steps`](Self::cold_start_steps), streaming
    /// progress into `events`.
    pub async fn cold_start(self: &Arc<Self>, events: mpsc::Sender<Progress>) -> SyncResult<Progress> {
        let steps = self.cold_start_steps();
        self.progress.run(steps, events).await
    }

    pub fn cold_start_running(&self) -> bool {
        self.progress.is_running()
    }
}
