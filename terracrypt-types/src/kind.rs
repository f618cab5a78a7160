use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which mirrored collection a sync, notification or store call targets.
///
/// The declaration order doubles as the lock order when more than one
/// kind has to be written in a single pass (a chat delete touches
/// participants too).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Friend,
    Chat,
    Participant,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Friend,
        ResourceKind::Chat,
        ResourceKind::Participant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Friend => "friend",
            ResourceKind::Chat => "chat",
            ResourceKind::Participant => "participant",
        }
    }

    /// Dense index into per-kind arrays.
    pub fn index(&self) -> usize {
        match self {
            ResourceKind::Friend => 0,
            ResourceKind::Chat => 1,
            ResourceKind::Participant => 2,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "friend" | "friends" => Ok(ResourceKind::Friend),
            "chat" | "chats" => Ok(ResourceKind::Chat),
            "participant" | "participants" | "member" | "members" => {
                Ok(ResourceKind::Participant)
            }
            other => Err(ParseError::UnknownKind(other.to_string())),
        }
    }
}
