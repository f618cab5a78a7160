//! SQLite-backed store.
//!
//! Each mirrored collection has its own table with the row serialized as
//! JSON in `data`. Participant and message rows reference their chat with
//! a foreign key and no cascade, so children have to be removed before
//! the chat they belong to.

use crate::error::{StoreError, StoreResult};
use crate::ResourceStore;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use terracrypt_types::{Chat, Friend, Message, Participant, Record, ResourceKind, Scope};
use tracing::debug;

/// Durable store backed by a single SQLite connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens or creates a store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        initialize_schema(&conn)?;
        debug!("opened cache database at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn initialize_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS friends (
            id   TEXT PRIMARY KEY,
            data TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chats (
            chat_id TEXT PRIMARY KEY,
            data    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS participants (
            id      TEXT PRIMARY KEY,
            chat_id TEXT NOT NULL REFERENCES chats(chat_id),
            data    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_participants_chat ON participants(chat_id);

        CREATE TABLE IF NOT EXISTS messages (
            message_id TEXT PRIMARY KEY,
            chat_id    TEXT NOT NULL REFERENCES chats(chat_id),
            timestamp  INTEGER NOT NULL,
            data       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id, timestamp);
        "#,
    )?;
    Ok(())
}

fn table(kind: ResourceKind) -> (&'static str, &'static str) {
    match kind {
        ResourceKind::Friend => ("friends", "id"),
        ResourceKind::Chat => ("chats", "chat_id"),
        ResourceKind::Participant => ("participants", "id"),
    }
}

fn decode(kind: ResourceKind, data: &str) -> StoreResult<Record> {
    Ok(match kind {
        ResourceKind::Friend => Record::Friend(serde_json::from_str::<Friend>(data)?),
        ResourceKind::Chat => Record::Chat(serde_json::from_str::<Chat>(data)?),
        ResourceKind::Participant => {
            Record::Participant(serde_json::from_str::<Participant>(data)?)
        }
    })
}

/// Maps foreign key failures to [`StoreError::Integrity`] so callers can
/// tell ordering mistakes from I/O failures.
fn map_constraint(err: rusqlite::Error, context: &str) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Integrity(format!("{context}: {err}"))
        }
        _ => StoreError::Sqlite(err),
    }
}

impl ResourceStore for SqliteStore {
    fn ready(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    fn list_all(&self, kind: ResourceKind) -> StoreResult<Vec<Record>> {
        let (name, key) = table(kind);
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("SELECT data FROM {name} ORDER BY {key}"))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.iter().map(|data| decode(kind, data)).collect()
    }

    fn list_scope(&self, kind: ResourceKind, scope: &Scope) -> StoreResult<Vec<Record>> {
        let chat_id = match (kind, scope) {
            (_, Scope::All) => return self.list_all(kind),
            (ResourceKind::Participant, Scope::Chat(chat_id)) => chat_id,
            (ResourceKind::Chat, Scope::Chat(chat_id)) => {
                return Ok(self.get(kind, chat_id)?.into_iter().collect());
            }
            (ResourceKind::Friend, Scope::Chat(_)) => return Ok(Vec::new()),
        };
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT data FROM participants WHERE chat_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![chat_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.iter().map(|data| decode(kind, data)).collect()
    }

    fn get(&self, kind: ResourceKind, id: &str) -> StoreResult<Option<Record>> {
        let (name, key) = table(kind);
        let conn = self.conn.lock().unwrap();
        let data: Option<String> = conn
            .query_row(
                &format!("SELECT data FROM {name} WHERE {key} = ?1"),
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|d| decode(kind, &d)).transpose()
    }

    fn upsert(&self, record: &Record) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        match record {
            Record::Friend(f) => {
                conn.execute(
                    "INSERT INTO friends (id, data) VALUES (?1, ?2)
                     ON CONFLICT(id) DO UPDATE SET data = excluded.data",
                    params![f.id, serde_json::to_string(f)?],
                )?;
            }
            Record::Chat(c) => {
                conn.execute(
                    "INSERT INTO chats (chat_id, data) VALUES (?1, ?2)
                     ON CONFLICT(chat_id) DO UPDATE SET data = excluded.data",
                    params![c.chat_id, serde_json::to_string(c)?],
                )?;
            }
            Record::Participant(p) => {
                conn.execute(
                    "INSERT INTO participants (id, chat_id, data) VALUES (?1, ?2, ?3)
                     ON CONFLICT(id) DO UPDATE SET chat_id = excluded.chat_id, data = excluded.data",
                    params![p.id, p.chat_id, serde_json::to_string(p)?],
                )
                .map_err(|e| map_constraint(e, &format!("participant {}", p.id)))?;
            }
        }
        Ok(())
    }

    fn delete(&self, kind: ResourceKind, id: &str) -> StoreResult<bool> {
        let (name, key) = table(kind);
        let conn = self.conn.lock().unwrap();
        let n = conn
            .execute(&format!("DELETE FROM {name} WHERE {key} = ?1"), params![id])
            .map_err(|e| map_constraint(e, &format!("{kind} {id}")))?;
        Ok(n > 0)
    }

    fn clear(&self, kind: ResourceKind) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        if kind == ResourceKind::Chat {
            tx.execute("DELETE FROM messages", [])?;
            tx.execute("DELETE FROM participants", [])?;
        }
        let (name, _) = table(kind);
        tx.execute(&format!("DELETE FROM {name}"), [])?;
        tx.commit()?;
        Ok(())
    }

    fn upsert_message(&self, message: &Message) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO messages (message_id, chat_id, timestamp, data) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(message_id) DO UPDATE SET
                chat_id = excluded.chat_id,
                timestamp = excluded.timestamp,
                data = excluded.data",
            params![
                message.message_id,
                message.chat_id,
                message.timestamp,
                serde_json::to_string(message)?
            ],
        )
        .map_err(|e| map_constraint(e, &format!("message {}", message.message_id)))?;
        Ok(())
    }

    fn get_message(&self, message_id: &str) -> StoreResult<Option<Message>> {
        let conn = self.conn.lock().unwrap();
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM messages WHERE message_id = ?1",
                params![message_id],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|d| serde_json::from_str(&d).map_err(StoreError::from))
            .transpose()
    }

    fn messages_for_chat(&self, chat_id: &str) -> StoreResult<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT data FROM messages WHERE chat_id = ?1 ORDER BY timestamp, message_id",
        )?;
        let rows = stmt
            .query_map(params![chat_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|data| serde_json::from_str(data).map_err(StoreError::from))
            .collect()
    }

    fn delete_messages_for_chat(&self, chat_id: &str) -> StoreResult<usize> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM messages WHERE chat_id = ?1", params![chat_id])?;
        Ok(n)
    }
}
