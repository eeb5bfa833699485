// src/config.rs
use config::{Config, ConfigError, Environment};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Scylla,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub storage: StorageBackend,
    pub scylla_node: String,
    /// Cash a portfolio starts with when its first trade opens it.
    pub initial_wallet: Decimal,
    pub max_commit_retries: u32,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3030)),
            storage: StorageBackend::Memory,
            scylla_node: "127.0.0.1:9042".to_string(),
            initial_wallet: Decimal::new(25000, 0),
            max_commit_retries: 3,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Defaults overridden by `LEDGER_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_env(Environment::with_prefix("LEDGER"))
    }

    fn from_env(env: Environment) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        Config::builder()
            .set_default("bind_addr", defaults.bind_addr.to_string())?
            .set_default("storage", "memory")?
            .set_default("scylla_node", defaults.scylla_node)?
            .set_default("initial_wallet", defaults.initial_wallet.to_string())?
            .set_default("max_commit_retries", i64::from(defaults.max_commit_retries))?
            .set_default("log_level", defaults.log_level)?
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
