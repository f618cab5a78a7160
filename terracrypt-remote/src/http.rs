//! HTTP gateway for the `/api/v1` REST surface.
//!
//! Maps backend DTOs onto the shared model and HTTP status codes onto the
//! [`GatewayError`] taxonomy: 401/403 are auth failures, 404 is not-found,
//! 5xx and network failures are transport errors, anything else is `Api`.

use crate::config::RemoteConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{NewChat, RemoteGateway};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use terracrypt_types::{
    Chat, Friend, FriendRequest, FriendStatus, Participant, ParticipantRole, Record,
    RequestStatus, ResourceKind,
};
use tracing::{debug, warn};

// ── Wire DTOs ──

/// List endpoints answer either with a bare array or `{ "data": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> ListBody<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListBody::Bare(v) | ListBody::Wrapped { data: v } => v,
        }
    }
}

#[derive(Deserialize)]
struct ApiUser {
    user_id: String,
}

#[derive(Deserialize)]
struct ApiFriend {
    user_id: String,
    username: String,
    name: String,
    email: String,
    #[serde(default)]
    picture: Option<String>,
    #[serde(default)]
    is_favorite: Option<bool>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl ApiFriend {
    fn into_friend(self) -> Friend {
        let status = self
            .status
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(FriendStatus::Accepted);
        let now = Utc::now();
        Friend {
            id: self.user_id.clone(),
            user_id: self.user_id,
            username: self.username,
            name: self.name,
            email: self.email,
            picture: self.picture,
            status,
            is_favorite: self.is_favorite.unwrap_or(false),
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        }
    }
}

#[derive(Deserialize)]
struct ApiFriendRequest {
    request_id: String,
    receiver_id: String,
    status: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    sender: ApiUser,
}

#[derive(Deserialize)]
struct ApiChat {
    chat_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    creator_id: Option<String>,
    #[serde(default)]
    is_group: Option<bool>,
    #[serde(default)]
    participants: Option<Vec<String>>,
}

impl ApiChat {
    fn into_chat(self) -> Chat {
        Chat {
            chat_id: self.chat_id,
            name: self.name.unwrap_or_else(|| "Unnamed Chat".to_string()),
            creator_id: self.creator_id.unwrap_or_else(|| "unknown".to_string()),
            is_group: self.is_group.unwrap_or(false),
            unread_count: 0,
            last_message_content: None,
            last_message_timestamp: None,
            participant_ids: self.participants.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct ApiChatMember {
    user: ApiUser,
    #[serde(default)]
    is_admin: bool,
    #[serde(default)]
    joined_at: Option<String>,
}

impl ApiChatMember {
    fn into_participant(self, chat_id: &str) -> Participant {
        // Unparseable join times fall back to a fixed instant so repeated
        // pulls of the same member compare equal.
        let joined_at = self
            .joined_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Participant {
            id: Participant::compose_id(chat_id, &self.user.user_id),
            user_id: self.user.user_id,
            chat_id: chat_id.to_string(),
            role: if self.is_admin {
                ParticipantRole::Admin
            } else {
                ParticipantRole::Member
            },
            joined_at,
            left_at: None,
            is_active: true,
        }
    }
}

#[derive(Deserialize)]
struct CreateChatResponse {
    chat_id: String,
}

#[derive(Serialize)]
struct FriendRequestPayload<'a> {
    receiver_id: &'a str,
    sender_id: &'a str,
}

// ── Client ──

/// reqwest-backed [`RemoteGateway`].
pub struct HttpGateway {
    client: Client,
    config: RemoteConfig,
}

impl HttpGateway {
    pub fn new(config: RemoteConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        token: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> GatewayResult<reqwest::Response> {
        let mut req = self
            .client
            .request(method.clone(), self.url(path))
            .bearer_auth(token);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        debug!("{method} {path} -> {status}");
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(classify(status, path, body))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        query: &[(&str, String)],
    ) -> GatewayResult<T> {
        let resp = self.send(Method::GET, path, token, query, None).await?;
        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn fetch_friends(&self, token: &str, query: &[(&str, String)]) -> GatewayResult<Vec<Record>> {
        let body: ListBody<ApiFriend> = self.get_json("/friends", token, query).await?;
        Ok(body
            .into_vec()
            .into_iter()
            .map(|f| Record::Friend(f.into_friend()))
            .collect())
    }

    async fn fetch_chats(&self, token: &str, query: &[(&str, String)]) -> GatewayResult<Vec<Chat>> {
        let body: ListBody<ApiChat> = self.get_json("/chats", token, query).await?;
        Ok(body.into_vec().into_iter().map(ApiChat::into_chat).collect())
    }

    async fn fetch_all_members(&self, token: &str) -> GatewayResult<Vec<Record>> {
        let chats = self.fetch_chats(token, &[]).await?;
        let mut records = Vec::new();
        for chat in &chats {
            let members = self.fetch_chat_members(token, &chat.chat_id).await?;
            records.extend(members.into_iter().map(Record::Participant));
        }
        Ok(records)
    }
}

fn classify(status: StatusCode, path: &str, body: String) -> GatewayError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GatewayError::Auth(format!("{path}: {status}"))
        }
        StatusCode::NOT_FOUND => GatewayError::NotFound(path.to_string()),
        s if s.is_server_error() => GatewayError::Transport(format!("{path}: {status} {body}")),
        s => GatewayError::Api {
            status: s.as_u16(),
            body,
        },
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn verify_session(&self, token: &str) -> GatewayResult<String> {
        let user: ApiUser = self.get_json("/users/me", token, &[]).await?;
        Ok(user.user_id)
    }

    async fn fetch_all(&self, kind: ResourceKind, token: &str) -> GatewayResult<Vec<Record>> {
        match kind {
            ResourceKind::Friend => self.fetch_friends(token, &[]).await,
            ResourceKind::Chat => Ok(self
                .fetch_chats(token, &[])
                .await?
                .into_iter()
                .map(Record::Chat)
                .collect()),
            ResourceKind::Participant => self.fetch_all_members(token).await,
        }
    }

    async fn fetch_delta(
        &self,
        kind: ResourceKind,
        token: &str,
        since: DateTime<Utc>,
    ) -> GatewayResult<Vec<Record>> {
        let query = [("since", since.to_rfc3339())];
        match kind {
            ResourceKind::Friend => self.fetch_friends(token, &query).await,
            ResourceKind::Chat => Ok(self
                .fetch_chats(token, &query)
                .await?
                .into_iter()
                .map(Record::Chat)
                .collect()),
            // The members endpoint has no change feed.
            ResourceKind::Participant => self.fetch_all_members(token).await,
        }
    }

    async fn fetch_chat_members(
        &self,
        token: &str,
        chat_id: &str,
    ) -> GatewayResult<Vec<Participant>> {
        let body: ListBody<ApiChatMember> = self
            .get_json(&format!("/chats/{chat_id}/members"), token, &[])
            .await?;
        Ok(body
            .into_vec()
            .into_iter()
            .map(|m| m.into_participant(chat_id))
            .collect())
    }

    async fn fetch_friend_requests(&self, token: &str) -> GatewayResult<Vec<FriendRequest>> {
        let body: ListBody<ApiFriendRequest> = self
            .get_json("/friends/request/pending", token, &[])
            .await?;
        let mut requests = Vec::new();
        for r in body.into_vec() {
            let status = match r.status.parse::<RequestStatus>() {
                Ok(s) => s,
                Err(e) => {
                    warn!("skipping friend request {}: {e}", r.request_id);
                    continue;
                }
            };
            requests.push(FriendRequest {
                request_id: r.request_id,
                sender_id: r.sender.user_id,
                receiver_id: r.receiver_id,
                status,
                created_at: r.created_at,
            });
        }
        Ok(requests)
    }

    async fn create_chat(&self, token: &str, chat: &NewChat) -> GatewayResult<String> {
        let body = serde_json::to_value(chat)?;
        let resp = self
            .send(Method::POST, "/chats", token, &[], Some(&body))
            .await?;
        let created: CreateChatResponse = serde_json::from_str(&resp.text().await?)?;
        debug!("created chat {}", created.chat_id);
        Ok(created.chat_id)
    }

    async fn send_friend_request(&self, token: &str, receiver_id: &str) -> GatewayResult<()> {
        let sender_id = self.verify_session(token).await?;
        let body = serde_json::to_value(FriendRequestPayload {
            receiver_id,
            sender_id: &sender_id,
        })?;
        self.send(Method::POST, "/friends/request", token, &[], Some(&body))
            .await?;
        Ok(())
    }

    async fn accept_friend_request(&self, token: &str, request_id: &str) -> GatewayResult<()> {
        self.send(
            Method::PUT,
            &format!("/friends/request/{request_id}/accept"),
            token,
            &[],
            None,
        )
        .await?;
        Ok(())
    }

    async fn reject_friend_request(&self, token: &str, request_id: &str) -> GatewayResult<()> {
        self.send(
            Method::PUT,
            &format!("/friends/request/{request_id}/reject"),
            token,
            &[],
            None,
        )
        .await?;
        Ok(())
    }

    async fn delete_chat(&self, token: &str, chat_id: &str) -> GatewayResult<()> {
        self.send(Method::DELETE, &format!("/chats/{chat_id}"), token, &[], None)
            .await?;
        Ok(())
    }

    async fn leave_chat(&self, token: &str, chat_id: &str) -> GatewayResult<()> {
        self.send(Method::POST, &format!("/chats/{chat_id}/leave"), token, &[], None)
            .await?;
        Ok(())
    }

    async fn delete_friend(&self, token: &str, user_id: &str) -> GatewayResult<()> {
        self.send(Method::DELETE, &format!("/friends/{user_id}"), token, &[], None)
            .await?;
        Ok(())
    }
}
