//! Configuration for the act server.
//!
//! Sources, later ones overriding earlier ones:
//!
//! 1. built-in defaults,
//! 2. an optional TOML file (`--config`),
//! 3. environment variables:
//!    - `ACT_BIND_ADDR`          (default: "0.0.0.0")
//!    - `ACT_PORT`               (default: "9100")
//!    - `ACT_MAX_CLIENTS`        (default: "256")
//!    - `ACT_COUNTERPARTY_ADDR`  (default: "127.0.0.1:9200")
//!    - `ACT_SESSION_ALIAS`      (default: "fix-client")
//! 4. command-line flags (applied in `main`).

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use act_engine::EngineConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IP address / interface the act listener binds to.
    pub bind_addr: String,

    /// TCP port of the act listener.
    pub port: u16,

    /// Maximum number of simultaneously connected act clients.
    pub max_clients: usize,

    /// `host:port` of the downstream counterparty.
    pub counterparty_addr: String,

    /// Session alias stamped on every message of the counterparty session.
    pub session_alias: String,

    /// Correlation engine tunables (`[engine]` table).
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0".to_string(),
            port: 9100,
            max_clients: 256,
            counterparty_addr: "127.0.0.1:9200".to_string(),
            session_alias: "fix-client".to_string(),
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    /// Defaults, then `path` (if any), then the environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                Self::from_toml_str(&text)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => Config::default(),
        };

        config.apply_env()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env(&mut self) -> anyhow::Result<()> {
        self.bind_addr = read_env_or("ACT_BIND_ADDR", self.bind_addr.clone())?;
        self.port = read_env_or("ACT_PORT", self.port)?;
        self.max_clients = read_env_or("ACT_MAX_CLIENTS", self.max_clients)?;
        self.counterparty_addr = read_env_or("ACT_COUNTERPARTY_ADDR", self.counterparty_addr.clone())?;
        self.session_alias = read_env_or("ACT_SESSION_ALIAS", self.session_alias.clone())?;
        Ok(())
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn read_env_or<T>(key: &str, current: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {val:?}")),
        Err(_) => Ok(current),
    }
}
