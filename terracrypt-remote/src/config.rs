//! Remote gateway configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`crate::HttpGateway`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the chat backend (e.g., "https://dev.v1.terracrypt.cc").
    pub api_base_url: String,

    /// Per-request timeout in seconds. Timeouts surface as transport errors.
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://dev.v1.terracrypt.cc".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl RemoteConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
