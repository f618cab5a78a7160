//! Remote side of the Terracrypt client cache.
//!
//! Provides:
//! - The [`RemoteGateway`] trait the sync engine pulls through
//! - [`HttpGateway`], a reqwest client for the `/api/v1` REST surface
//! - Push-channel envelope types ([`PushEnvelope`], [`RawNotification`],
//!   [`IncomingMessage`], [`MessageStatusUpdate`])

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod push;

pub use config::RemoteConfig;
pub use error::{GatewayError, GatewayResult};
pub use gateway::{NewChat, NewChatMember, RemoteGateway};
pub use http::HttpGateway;
pub use push::{
    IncomingMessage, MessageStatusUpdate, NotificationType, PushEnvelope, RawNotification,
};
