//! Server configuration
//!
//! Layered as CLI > environment > `.solarflow/config.json` > defaults. Every
//! layer is a [`ServerConfig`] with optional fields; [`ServerConfig::merge`]
//! lets the higher layer win field by field.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

use solarflow_core::state::db::DEFAULT_DB_PATH;

pub const CONFIG_PATH: &str = ".solarflow/config.json";
pub const ENV_PATH: &str = ".solarflow/.env";

const DEFAULT_BIND: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_LOG_FILTER: &str = "solarflow=info,solarflow_core=info,solarflow_server=info";
const DEFAULT_EVENT_CAPACITY: usize = 100;

/// One configuration layer
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, ToSchema)]
pub struct ServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_capacity: Option<usize>,
}

impl ServerConfig {
    /// Load a config file; a missing or unreadable file is an empty layer
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), "Ignoring malformed config: {}", e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), std::io::Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(path, content).await
    }

    /// Layer from `SOLARFLOW_*` variables and `RUST_LOG`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            bind: lookup("SOLARFLOW_BIND"),
            port: lookup("SOLARFLOW_PORT").and_then(|p| p.trim().parse().ok()),
            db_path: lookup("SOLARFLOW_DB"),
            log_filter: lookup("RUST_LOG"),
            event_capacity: None,
        }
    }

    /// Overlay `other` onto `self`; set fields in `other` win
    pub fn merge(&mut self, other: ServerConfig) {
        if other.bind.is_some() {
            self.bind = other.bind;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.db_path.is_some() {
            self.db_path = other.db_path;
        }
        if other.log_filter.is_some() {
            self.log_filter = other.log_filter;
        }
        if other.event_capacity.is_some() {
            self.event_capacity = other.event_capacity;
        }
    }

    pub fn resolve(self) -> ResolvedConfig {
        ResolvedConfig {
            bind: self.bind.unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: self.port.unwrap_or(DEFAULT_PORT),
            db_path: PathBuf::from(self.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string())),
            log_filter: self
                .log_filter
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            event_capacity: self.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY).max(1),
        }
    }
}

/// Effective configuration after all layers are applied
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResolvedConfig {
    pub bind: String,
    pub port: u16,
    #[schema(value_type = String)]
    pub db_path: PathBuf,
    pub log_filter: String,
    pub event_capacity: usize,
}

impl ResolvedConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
