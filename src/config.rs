//! Application configuration management with security considerations.
//!
//! All values come from environment variables and are loaded once at startup
//! through [`init_config`]. Components never read [`APP_CONFIG`] directly in
//! their hot paths; the values they need are handed to them when they are
//! built in `main.rs`.
//!
//! # Security Notes
//! - Sensitive fields are clearly marked and should never be logged
//! - Production environments should use secure secret management systems

use anyhow::Context;
use envconfig::Envconfig;
use std::{str::FromStr, sync::OnceLock, time::Duration};

/// Which backing keeps the deduplication keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupBackend {
    /// Process local map, enough for a single instance
    Memory,
    /// SQLite file shared by every instance running on the host
    Sqlite,
}

impl FromStr for DedupBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown dedup backend: {other}")),
        }
    }
}

/// Application configuration with security-aware field management.
///
/// # Security Requirements
/// - All `SENSITIVE` fields must be stored securely (encrypted at rest)
/// - Never log or expose sensitive values
/// - Rotate sensitive credentials regularly
#[derive(Envconfig, Clone)]
pub struct AppConfig {
    /// Environment name to deploy the app (NON-SENSITIVE)
    /// Values: "local", "dev", "staging", "prod"
    #[envconfig(default = "local")]
    pub env: String,

    /// Host address for web server binding (NON-SENSITIVE)
    #[envconfig(default = "0.0.0.0")]
    pub server_host: String,

    /// Port for web server binding (NON-SENSITIVE)
    #[envconfig(default = "8080")]
    pub server_port: u16,

    /// Path to SSL private key file (SENSITIVE PATH)
    /// Security: File should have 600 permissions
    #[envconfig(default = "server.key")]
    pub private_key_path: String,

    /// Path to SSL certificate file (NON-SENSITIVE)
    #[envconfig(default = "server.crt")]
    pub certificate_path: String,

    /// 🔒 SENSITIVE: Logfire write token. Without it logs go to stdout
    pub logfire_token: Option<String>,

    /// 🔒 SENSITIVE: Shared secret used by the call-center to sign deliveries.
    /// When unset, signatures are not checked
    pub webhook_signing_secret: Option<String>,

    /// Dedup store backing (NON-SENSITIVE)
    /// Values: "memory", "sqlite"
    #[envconfig(default = "memory")]
    pub dedup_backend: DedupBackend,

    /// SQLite url used when `dedup_backend` is "sqlite" (NON-SENSITIVE)
    #[envconfig(default = "sqlite:data/dedup.db?mode=rwc")]
    pub dedup_db_url: String,

    /// Seconds a deduplication key is remembered
    #[envconfig(default = "600")]
    pub dedup_ttl_secs: u64,

    /// Seconds between sweeps of expired deduplication keys
    #[envconfig(default = "60")]
    pub dedup_sweep_interval_secs: u64,

    /// Width in seconds of the arrival bucket mixed into synthesized event ids
    #[envconfig(default = "60")]
    pub synthetic_id_bucket_secs: u64,

    /// Upper bound in seconds for each outbound API call
    #[envconfig(default = "5")]
    pub outbound_timeout_secs: u64,

    /// Call-center REST API base url (NON-SENSITIVE)
    #[envconfig(default = "https://api.aircall.io")]
    pub call_center_base_url: String,

    /// Call-center API key id (SEMI-SENSITIVE)
    pub call_center_api_id: String,

    /// 🔒 SENSITIVE: Call-center API key secret
    pub call_center_api_token: String,

    /// CRM / marketing REST API base url (NON-SENSITIVE)
    pub crm_base_url: String,

    /// 🔒 SENSITIVE: CRM bearer token
    pub crm_api_token: String,

    /// CRM campaign fired for missed calls (NON-SENSITIVE)
    pub crm_missed_call_campaign_id: String,
}

impl AppConfig {
    /// Checks if running in production environment
    pub fn is_prod(&self) -> bool {
        self.env.to_lowercase() == "prod"
    }

    /// A zero TTL would forget every key at once, so it is clamped to 1s.
    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_secs.max(1))
    }

    pub fn dedup_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.dedup_sweep_interval_secs.max(1))
    }

    pub fn synthetic_id_bucket(&self) -> Duration {
        Duration::from_secs(self.synthetic_id_bucket_secs.max(1))
    }

    pub fn outbound_timeout(&self) -> Duration {
        Duration::from_secs(self.outbound_timeout_secs.max(1))
    }
}

/// Global application configuration instance, set once by [`init_config`].
pub static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Loads the configuration from the environment into [`APP_CONFIG`].
pub fn init_config() -> anyhow::Result<()> {
    let app_config = AppConfig::init_from_env()
        .context("failed to load application configuration from environment")?;

    APP_CONFIG
        .set(app_config)
        .map_err(|_| anyhow::anyhow!("application configuration was already initialized"))
}
