use crate::kind::ResourceKind;
use crate::records::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which slice of a collection a pull snapshot is authoritative for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// The whole collection.
    All,
    /// Only rows belonging to one chat (participants of that chat, or the chat itself).
    Chat(String),
}

impl Scope {
    pub fn contains(&self, record: &Record) -> bool {
        match self {
            Scope::All => true,
            Scope::Chat(chat_id) => record.chat_id() == Some(chat_id.as_str()),
        }
    }
}

/// Ids touched by one reconciliation pass, reported to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub kind: ResourceKind,
    pub added: BTreeSet<String>,
    pub updated: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl ChangeSet {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            added: BTreeSet::new(),
            updated: BTreeSet::new(),
            removed: BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }

    pub fn with_added(mut self, id: impl Into<String>) -> Self {
        self.added.insert(id.into());
        self
    }

    pub fn with_updated(mut self, id: impl Into<String>) -> Self {
        self.updated.insert(id.into());
        self
    }

    pub fn with_removed(mut self, id: impl Into<String>) -> Self {
        self.removed.insert(id.into());
        self
    }

    /// Folds `other` into `self`. Both must describe the same kind.
    pub fn merge(&mut self, other: ChangeSet) {
        debug_assert_eq!(self.kind, other.kind);
        self.added.extend(other.added);
        self.updated.extend(other.updated);
        self.removed.extend(other.removed);
    }
}
