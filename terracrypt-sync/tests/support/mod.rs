#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use terracrypt_remote::{GatewayError, GatewayResult, NewChat, RemoteGateway};
use terracrypt_store::{MemoryStore, ResourceStore, StoreError, StoreResult};
use terracrypt_sync::{SessionHandle, SyncConfig, SyncEngine};
use terracrypt_types::*;
use tokio::sync::Semaphore;

pub const ME: &str = "u-1";
pub const TOKEN: &str = "tok";

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
}

pub fn friend(id: &str) -> Friend {
    Friend {
        id: id.into(),
        user_id: id.into(),
        username: format!("{id}_name"),
        name: format!("Friend {id}"),
        email: format!("{id}@example.com"),
        picture: None,
        status: FriendStatus::Accepted,
        is_favorite: false,
        created_at: fixed_time(),
        updated_at: fixed_time(),
    }
}

pub fn chat(id: &str, members: &[&str]) -> Chat {
    Chat {
        chat_id: id.into(),
        name: format!("chat {id}"),
        creator_id: ME.into(),
        is_group: members.len() > 2,
        unread_count: 0,
        last_message_content: None,
        last_message_timestamp: None,
        participant_ids: members.iter().map(|m| m.to_string()).collect(),
    }
}

pub fn participant(chat_id: &str, user_id: &str) -> Participant {
    Participant {
        id: Participant::compose_id(chat_id, user_id),
        user_id: user_id.into(),
        chat_id: chat_id.into(),
        role: ParticipantRole::Member,
        joined_at: fixed_time(),
        left_at: None,
        is_active: true,
    }
}

pub fn message(id: &str, chat_id: &str, sender: &str, ts: i64) -> Message {
    Message {
        message_id: id.into(),
        chat_id: chat_id.into(),
        sender_id: sender.into(),
        content: format!("message {id}"),
        timestamp: ts,
        is_read: false,
        is_sent: true,
        is_delivered: true,
        reply_to_message_id: None,
    }
}

pub fn envelope(kind: &str, action: &str, subject: &str, members: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "type": kind,
        "message": {
            "action": action,
            "subjectId": subject,
            "affectedMemberIds": members,
        }
    })
}

pub fn request_status(subject: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "request-notification",
        "message": {
            "action": "status_changed",
            "subjectId": subject,
            "affectedMemberIds": [ME],
            "status": status,
        }
    })
}

/// A `chat` envelope as the push channel delivers it.
pub fn chat_message(id: &str, chat_id: &str, sender: &str, sent_at: DateTime<Utc>) -> serde_json::Value {
    serde_json::json!({
        "type": "chat",
        "message": {
            "message_id": id,
            "chat_id": chat_id,
            "sender_id": sender,
            "content": format!("pushed {id}"),
            "sent_at": sent_at.to_rfc3339(),
        }
    })
}

pub fn message_status(message_id: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "message-status",
        "message": {
            "message_id": message_id,
            "status": status,
            "timestamp": fixed_time().to_rfc3339(),
        }
    })
}

#[derive(Default)]
struct FakeData {
    friends: Vec<Friend>,
    chats: Vec<Chat>,
    members: BTreeMap<String, Vec<Participant>>,
    requests: Vec<FriendRequest>,
    failing: HashSet<ResourceKind>,
    next_chat_id: Option<String>,
    visible_after_create: bool,
}

/// In-memory backend with call counters, failure injection and an
/// optional gate that holds `fetch_all` until permits are added.
pub struct FakeGateway {
    data: Mutex<FakeData>,
    fetch_calls: [AtomicUsize; 3],
    delta_calls: [AtomicUsize; 3],
    member_calls: AtomicUsize,
    gate: Mutex<Option<Arc<Semaphore>>>,
    pub actions: Mutex<Vec<String>>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            data: Mutex::new(FakeData {
                visible_after_create: true,
                ..FakeData::default()
            }),
            fetch_calls: Default::default(),
            delta_calls: Default::default(),
            member_calls: AtomicUsize::new(0),
            gate: Mutex::new(None),
            actions: Mutex::new(Vec::new()),
        }
    }
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_friends(&self, friends: Vec<Friend>) {
        self.data.lock().unwrap().friends = friends;
    }

    pub fn set_chats(&self, chats: Vec<Chat>) {
        self.data.lock().unwrap().chats = chats;
    }

    pub fn set_members(&self, chat_id: &str, members: Vec<Participant>) {
        self.data
            .lock()
            .unwrap()
            .members
            .insert(chat_id.to_string(), members);
    }

    pub fn set_requests(&self, requests: Vec<FriendRequest>) {
        self.data.lock().unwrap().requests = requests;
    }

    pub fn set_failing(&self, kind: ResourceKind, failing: bool) {
        let mut data = self.data.lock().unwrap();
        if failing {
            data.failing.insert(kind);
        } else {
            data.failing.remove(&kind);
        }
    }

    /// Id returned by the next `create_chat`, and whether the chat shows up
    /// in later pulls.
    pub fn on_create(&self, chat_id: &str, visible: bool) {
        let mut data = self.data.lock().unwrap();
        data.next_chat_id = Some(chat_id.to_string());
        data.visible_after_create = visible;
    }

    /// Blocks every `fetch_all` until the returned semaphore gets permits.
    pub fn hold(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn fetch_calls(&self, kind: ResourceKind) -> usize {
        self.fetch_calls[kind.index()].load(Ordering::SeqCst)
    }

    pub fn delta_calls(&self, kind: ResourceKind) -> usize {
        self.delta_calls[kind.index()].load(Ordering::SeqCst)
    }

    pub fn member_calls(&self) -> usize {
        self.member_calls.load(Ordering::SeqCst)
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    fn record(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }

    fn check_token(token: &str) -> GatewayResult<()> {
        if token == TOKEN {
            Ok(())
        } else {
            Err(GatewayError::Auth("invalid token".into()))
        }
    }

    fn snapshot(&self, kind: ResourceKind) -> GatewayResult<Vec<Record>> {
        let data = self.data.lock().unwrap();
        if data.failing.contains(&kind) {
            return Err(GatewayError::Transport("connection reset".into()));
        }
        Ok(match kind {
            ResourceKind::Friend => data.friends.iter().cloned().map(Record::Friend).collect(),
            ResourceKind::Chat => data.chats.iter().cloned().map(Record::Chat).collect(),
            ResourceKind::Participant => data
                .members
                .values()
                .flatten()
                .cloned()
                .map(Record::Participant)
                .collect(),
        })
    }
}

#[async_trait]
impl RemoteGateway for FakeGateway {
    async fn verify_session(&self, token: &str) -> GatewayResult<String> {
        Self::check_token(token)?;
        Ok(ME.to_string())
    }

    async fn fetch_all(&self, kind: ResourceKind, token: &str) -> GatewayResult<Vec<Record>> {
        Self::check_token(token)?;
        self.fetch_calls[kind.index()].fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| GatewayError::Transport("gate closed".into()))?;
            permit.forget();
        }
        self.snapshot(kind)
    }

    async fn fetch_delta(
        &self,
        kind: ResourceKind,
        token: &str,
        _since: DateTime<Utc>,
    ) -> GatewayResult<Vec<Record>> {
        Self::check_token(token)?;
        self.delta_calls[kind.index()].fetch_add(1, Ordering::SeqCst);
        self.snapshot(kind)
    }

    async fn fetch_chat_members(
        &self,
        token: &str,
        chat_id: &str,
    ) -> GatewayResult<Vec<Participant>> {
        Self::check_token(token)?;
        self.member_calls.fetch_add(1, Ordering::SeqCst);
        let data = self.data.lock().unwrap();
        if data.failing.contains(&ResourceKind::Participant) {
            return Err(GatewayError::Transport("connection reset".into()));
        }
        data.members
            .get(chat_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("chat {chat_id}")))
    }

    async fn fetch_friend_requests(&self, token: &str) -> GatewayResult<Vec<FriendRequest>> {
        Self::check_token(token)?;
        Ok(self.data.lock().unwrap().requests.clone())
    }

    async fn create_chat(&self, token: &str, new_chat: &NewChat) -> GatewayResult<String> {
        Self::check_token(token)?;
        let mut data = self.data.lock().unwrap();
        let chat_id = data
            .next_chat_id
            .take()
            .unwrap_or_else(|| format!("c-{}", data.chats.len() + 1));
        if data.visible_after_create {
            let mut members: Vec<&str> = vec![ME];
            members.extend(new_chat.members.iter().map(|m| m.user_id.as_str()));
            let mut created = chat(&chat_id, &members);
            created.name = new_chat.name.clone();
            created.is_group = new_chat.is_group;
            data.chats.push(created);
            let participants = members.iter().map(|m| participant(&chat_id, m)).collect();
            data.members.insert(chat_id.clone(), participants);
        }
        drop(data);
        self.record(format!("create_chat:{chat_id}"));
        Ok(chat_id)
    }

    async fn send_friend_request(&self, token: &str, receiver_id: &str) -> GatewayResult<()> {
        Self::check_token(token)?;
        self.record(format!("send_request:{receiver_id}"));
        Ok(())
    }

    async fn accept_friend_request(&self, token: &str, request_id: &str) -> GatewayResult<()> {
        Self::check_token(token)?;
        self.record(format!("accept:{request_id}"));
        Ok(())
    }

    async fn reject_friend_request(&self, token: &str, request_id: &str) -> GatewayResult<()> {
        Self::check_token(token)?;
        self.record(format!("reject:{request_id}"));
        Ok(())
    }

    async fn delete_chat(&self, token: &str, chat_id: &str) -> GatewayResult<()> {
        Self::check_token(token)?;
        self.record(format!("delete_chat:{chat_id}"));
        Ok(())
    }

    async fn leave_chat(&self, token: &str, chat_id: &str) -> GatewayResult<()> {
        Self::check_token(token)?;
        self.record(format!("leave_chat:{chat_id}"));
        Ok(())
    }

    async fn delete_friend(&self, token: &str, user_id: &str) -> GatewayResult<()> {
        Self::check_token(token)?;
        self.record(format!("delete_friend:{user_id}"));
        Ok(())
    }
}

/// Memory store that can fail upserts after a number of successful
/// ones, or panic on the next upsert.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    upserts_left: Mutex<Option<usize>>,
    panic_next: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Lets `ok` more upserts through, then fails each one after.
    pub fn fail_upserts_after(&self, ok: usize) {
        *self.upserts_left.lock().unwrap() = Some(ok);
    }

    pub fn heal(&self) {
        *self.upserts_left.lock().unwrap() = None;
        self.panic_next.store(false, Ordering::SeqCst);
    }

    pub fn panic_on_next_upsert(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    fn check_upsert(&self) -> StoreResult<()> {
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("store crashed mid-write");
        }
        let mut left = self.upserts_left.lock().unwrap();
        match left.as_mut() {
            Some(0) => Err(StoreError::Integrity("disk full".into())),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl ResourceStore for FaultyStore {
    fn list_all(&self, kind: ResourceKind) -> StoreResult<Vec<Record>> {
        self.inner.list_all(kind)
    }

    fn get(&self, kind: ResourceKind, id: &str) -> StoreResult<Option<Record>> {
        self.inner.get(kind, id)
    }

    fn upsert(&self, record: &Record) -> StoreResult<()> {
        self.check_upsert()?;
        self.inner.upsert(record)
    }

    fn delete(&self, kind: ResourceKind, id: &str) -> StoreResult<bool> {
        self.inner.delete(kind, id)
    }

    fn clear(&self, kind: ResourceKind) -> StoreResult<()> {
        self.inner.clear(kind)
    }

    fn upsert_message(&self, message: &Message) -> StoreResult<()> {
        self.check_upsert()?;
        self.inner.upsert_message(message)
    }

    fn get_message(&self, message_id: &str) -> StoreResult<Option<Message>> {
        self.inner.get_message(message_id)
    }

    fn messages_for_chat(&self, chat_id: &str) -> StoreResult<Vec<Message>> {
        self.inner.messages_for_chat(chat_id)
    }

    fn delete_messages_for_chat(&self, chat_id: &str) -> StoreResult<usize> {
        self.inner.delete_messages_for_chat(chat_id)
    }
}

pub fn signed_in() -> SessionHandle {
    SessionHandle::signed_in(Session::new(ME, TOKEN))
}

pub struct Harness {
    pub engine: Arc<SyncEngine>,
    pub gateway: Arc<FakeGateway>,
    pub store: Arc<MemoryStore>,
}

pub fn harness() -> Harness {
    harness_with(SyncConfig::default(), signed_in())
}

pub fn harness_with(config: SyncConfig, session: SessionHandle) -> Harness {
    let gateway = FakeGateway::new();
    let store = Arc::new(MemoryStore::new());
    let engine = Arc::new(SyncEngine::new(
        config,
        store.clone(),
        gateway.clone(),
        session,
    ));
    Harness {
        engine,
        gateway,
        store,
    }
}

pub struct FaultyHarness {
    pub engine: Arc<SyncEngine>,
    pub gateway: Arc<FakeGateway>,
    pub store: Arc<FaultyStore>,
}

pub fn faulty_harness() -> FaultyHarness {
    let gateway = FakeGateway::new();
    let store = FaultyStore::new();
    let engine = Arc::new(SyncEngine::new(
        SyncConfig::default(),
        store.clone(),
        gateway.clone(),
        signed_in(),
    ));
    FaultyHarness {
        engine,
        gateway,
        store,
    }
}

/// Records every change set delivered for `kind`.
pub fn record_changes(engine: &SyncEngine, kind: ResourceKind) -> Arc<Mutex<Vec<ChangeSet>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.subscribe(kind, move |changes| {
        sink.lock().unwrap().push(changes.clone());
        Ok(())
    });
    seen
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
