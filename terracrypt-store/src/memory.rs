//! In-process store backed by ordered maps.

use crate::error::StoreResult;
use crate::ResourceStore;
use std::collections::BTreeMap;
use std::sync::RwLock;
use terracrypt_types::{Message, Record, ResourceKind};

#[derive(Default)]
struct Tables {
    records: [BTreeMap<String, Record>; 3],
    messages: BTreeMap<String, Message>,
}

/// Store that keeps every row in memory. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total message count, across all chats.
    pub fn message_count(&self) -> usize {
        self.tables.read().unwrap().messages.len()
    }
}

impl ResourceStore for MemoryStore {
    fn list_all(&self, kind: ResourceKind) -> StoreResult<Vec<Record>> {
        let tables = self.tables.read().unwrap();
        Ok(tables.records[kind.index()].values().cloned().collect())
    }

    fn get(&self, kind: ResourceKind, id: &str) -> StoreResult<Option<Record>> {
        let tables = self.tables.read().unwrap();
        Ok(tables.records[kind.index()].get(id).cloned())
    }

    fn upsert(&self, record: &Record) -> StoreResult<()> {
        let mut tables = self.tables.write().unwrap();
        tables.records[record.kind().index()].insert(record.id().to_string(), record.clone());
        Ok(())
    }

    fn delete(&self, kind: ResourceKind, id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().unwrap();
        Ok(tables.records[kind.index()].remove(id).is_some())
    }

    fn clear(&self, kind: ResourceKind) -> StoreResult<()> {
        let mut tables = self.tables.write().unwrap();
        if kind == ResourceKind::Chat {
            tables.messages.clear();
            tables.records[ResourceKind::Participant.index()].clear();
        }
        tables.records[kind.index()].clear();
        Ok(())
    }

    fn upsert_message(&self, message: &Message) -> StoreResult<()> {
        let mut tables = self.tables.write().unwrap();
        tables
            .messages
            .insert(message.message_id.clone(), message.clone());
        Ok(())
    }

    fn get_message(&self, message_id: &str) -> StoreResult<Option<Message>> {
        let tables = self.tables.read().unwrap();
        Ok(tables.messages.get(message_id).cloned())
    }

    fn messages_for_chat(&self, chat_id: &str) -> StoreResult<Vec<Message>> {
        let tables = self.tables.read().unwrap();
        let mut messages: Vec<Message> = tables
            .messages
            .values()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    fn delete_messages_for_chat(&self, chat_id: &str) -> StoreResult<usize> {
        let mut tables = self.tables.write().unwrap();
        let before = tables.messages.len();
        tables.messages.retain(|_, m| m.chat_id != chat_id);
        Ok(before - tables.messages.len())
    }
}
