//! Shared domain model for the Terracrypt client cache.
//!
//! The sync engine mirrors three server-owned collections locally:
//! friends, chats and chat participants. Messages ride along with their
//! chat and are removed together with it.
//!
//! # Architecture
//!
//! - [`ResourceKind`] tags every sync, notification and store table
//! - [`Record`] is the type-erased row exchanged between store, gateway and reconcilers
//! - [`ChangeSet`] is what observers receive after a reconciliation pass

mod change;
mod error;
mod kind;
mod records;
mod session;

pub use change::{ChangeSet, Scope};
pub use error::{ParseError, ParseResult};
pub use kind::ResourceKind;
pub use records::{
    Chat, DeliveryStatus, Friend, FriendRequest, FriendStatus, Message, Participant,
    ParticipantRole, Record, RequestStatus, Resource,
};
pub use session::Session;
