//! Parse errors for the string-tagged enums in the model.

use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown resource kind: {0}")]
    UnknownKind(String),

    #[error("unknown friend status: {0}")]
    UnknownFriendStatus(String),

    #[error("unknown request status: {0}")]
    UnknownRequestStatus(String),

    #[error("unknown delivery status: {0}")]
    UnknownDeliveryStatus(String),

    #[error("unknown participant role: {0}")]
    UnknownRole(String),
}
