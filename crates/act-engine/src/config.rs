//! Engine tunables.
//!
//! Durations are stored in milliseconds so the struct deserializes
//! directly from the server's TOML file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long the transport may take to accept one outbound message.
    pub send_timeout_ms: u64,

    /// How long a send waits for its own echo before failing.
    pub echo_timeout_ms: u64,

    /// Reply timeout handlers use when the act itself names none.
    pub default_timeout_ms: u64,

    /// Upper bound for any single wait. Longer waits are rejected.
    pub max_wait_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            send_timeout_ms: 5_000,
            echo_timeout_ms: 5_000,
            default_timeout_ms: 1_000,
            max_wait_ms: 10 * 60 * 1_000,
        }
    }
}

impl EngineConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn echo_timeout(&self) -> Duration {
        Duration::from_millis(self.echo_timeout_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}
