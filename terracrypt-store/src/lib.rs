//! Local cache storage for the Terracrypt client.
//!
//! The store is the "last known" copy of server state. It never decides
//! what is current; reconcilers in `terracrypt-sync` overwrite it from
//! pull snapshots and push notifications.
//!
//! # Architecture
//!
//! - [`ResourceStore`] is the synchronous CRUD surface the sync engine consumes
//! - [`MemoryStore`] keeps everything in process (tests, ephemeral sessions)
//! - [`SqliteStore`] persists rows as JSON in SQLite with foreign keys from
//!   messages and participants to their chat

mod error;
mod memory;
mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use terracrypt_types::{Message, Record, ResourceKind, Scope};

/// Per-kind persistence for mirrored rows.
///
/// Implementations must not perform network I/O. All methods are
/// idempotent: deleting an absent row returns `Ok(false)`, upserting an
/// identical row is a no-op as far as observers can tell.
pub trait ResourceStore: Send + Sync {
    /// Cheap readiness check used by the cold-start sequence.
    fn ready(&self) -> StoreResult<()> {
        Ok(())
    }

    fn list_all(&self, kind: ResourceKind) -> StoreResult<Vec<Record>>;

    fn get(&self, kind: ResourceKind, id: &str) -> StoreResult<Option<Record>>;

    fn upsert(&self, record: &Record) -> StoreResult<()>;

    /// Removes one row. Returns whether a row existed.
    fn delete(&self, kind: ResourceKind, id: &str) -> StoreResult<bool>;

    /// Removes every row of `kind`. Clearing chats also clears their
    /// messages and participants.
    fn clear(&self, kind: ResourceKind) -> StoreResult<()>;

    /// Rows of `kind` that fall inside `scope`.
    fn list_scope(&self, kind: ResourceKind, scope: &Scope) -> StoreResult<Vec<Record>> {
        let rows = self.list_all(kind)?;
        Ok(rows.into_iter().filter(|r| scope.contains(r)).collect())
    }

    fn upsert_message(&self, message: &Message) -> StoreResult<()>;

    fn get_message(&self, message_id: &str) -> StoreResult<Option<Message>>;

    /// Messages of one chat, oldest first.
    fn messages_for_chat(&self, chat_id: &str) -> StoreResult<Vec<Message>>;

    /// Returns the number of messages removed.
    fn delete_messages_for_chat(&self, chat_id: &str) -> StoreResult<usize>;
}
