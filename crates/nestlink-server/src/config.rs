//! Server configuration.
//!
//! Loaded from an optional `nestlink.toml` plus `NESTLINK_*` environment
//! overrides (double underscore as the section separator, e.g.
//! `NESTLINK_SERVER__PORT=8080`).

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub storage: StorageSection,
    pub invites: InviteSection,
    pub logging: LoggingSection,
    pub auth: AuthSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Per-request deadline in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 10,
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub backend: StorageBackend,
    /// Required when `backend = "postgres"`.
    pub database_url: Option<String>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            database_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InviteSection {
    /// Upper bound on `maxUses` per token.
    pub max_uses_ceiling: u32,
}

impl Default for InviteSection {
    fn default() -> Self {
        Self {
            max_uses_ceiling: nestlink_invites::DEFAULT_MAX_USES_CEILING,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Principals accepted by the static identity resolver.
///
/// Stands in for the external identity provider in development; a real
/// deployment plugs its own resolver into the server builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub principals: Vec<StaticPrincipal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticPrincipal {
    /// Bearer token presented in the Authorization header.
    pub bearer: String,
    /// Stable principal id supplied by the identity provider.
    pub id: uuid::Uuid,
    #[serde(default)]
    pub admin: bool,
}

/// Load configuration from `path` (optional) and the environment.
///
/// # Errors
///
/// Returns an error if the file or environment values fail to parse.
pub fn load_config(path: Option<&str>) -> Result<ServerConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::with_name(path).required(false));
    }

    builder
        .add_source(
            config::Environment::with_prefix("NESTLINK")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}
