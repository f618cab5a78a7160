//! The remote collaborator consumed by the sync engine.

use crate::error::GatewayResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use terracrypt_types::{FriendRequest, Participant, Record, ResourceKind};

/// Member entry of a chat-creation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChatMember {
    pub user_id: String,
    pub is_admin: bool,
}

/// Body of a chat-creation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChat {
    pub name: String,
    pub is_group: bool,
    pub members: Vec<NewChatMember>,
}

/// Pull and action RPCs against the authoritative backend.
///
/// Every call takes the bearer token explicitly; the gateway holds no
/// session state. Timeouts are the gateway's responsibility and surface
/// as [`crate::GatewayError::Transport`].
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Confirms the token is accepted and returns the user id it belongs to.
    async fn verify_session(&self, token: &str) -> GatewayResult<String>;

    /// Full collection for `kind`. For participants this is every member
    /// of every chat the user belongs to.
    async fn fetch_all(&self, kind: ResourceKind, token: &str) -> GatewayResult<Vec<Record>>;

    /// Rows of `kind` created or changed after `since`.
    async fn fetch_delta(
        &self,
        kind: ResourceKind,
        token: &str,
        since: DateTime<Utc>,
    ) -> GatewayResult<Vec<Record>>;

    async fn fetch_chat_members(&self, token: &str, chat_id: &str)
    -> GatewayResult<Vec<Participant>>;

    /// Incoming friend requests still awaiting an answer.
    async fn fetch_friend_requests(&self, token: &str) -> GatewayResult<Vec<FriendRequest>>;

    /// Returns the new chat's id.
    async fn create_chat(&self, token: &str, chat: &NewChat) -> GatewayResult<String>;

    async fn send_friend_request(&self, token: &str, receiver_id: &str) -> GatewayResult<()>;

    async fn accept_friend_request(&self, token: &str, request_id: &str) -> GatewayResult<()>;

    async fn reject_friend_request(&self, token: &str, request_id: &str) -> GatewayResult<()>;

    async fn delete_chat(&self, token: &str, chat_id: &str) -> GatewayResult<()>;

    async fn leave_chat(&self, token: &str, chat_id: &str) -> GatewayResult<()>;

    async fn delete_friend(&self, token: &str, user_id: &str) -> GatewayResult<()>;
}
