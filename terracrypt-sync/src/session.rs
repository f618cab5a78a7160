//! Shared handle to the signed-in session.

use crate::error::{SyncError, SyncResult};
use std::sync::Arc;
use terracrypt_types::Session;
use tokio::sync::RwLock;

/// Cloneable view of the current session, shared by the engine and router.
/// Token refresh and sign-in live elsewhere; they only call [`set`](Self::set)
/// and [`clear`](Self::clear).
#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(session))),
        }
    }

    pub async fn set(&self, session: Session) {
        *self.inner.write().await = Some(session);
    }

    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }

    pub async fn current(&self) -> Option<Session> {
        self.inner.read().await.clone()
    }

    pub async fn user_id(&self) -> Option<String> {
        self.inner.read().await.as_ref().map(|s| s.user_id.clone())
    }

    /// Bearer token for remote calls, or [`SyncError::AuthRequired`].
    pub async fn token(&self) -> SyncResult<String> {
        self.inner
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or(SyncError::AuthRequired)
    }
}
