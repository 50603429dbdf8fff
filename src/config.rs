use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub shares: ShareConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    #[allow(dead_code)]
    pub pool_size: usize,
}

/// CSV of allowed origins; `*` means "echo the request's Origin" (§6).
#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
        }
    }
}

/// CSV of admin usernames; empty or containing `*` means every authenticated
/// user is an admin (§4.1 "Admin predicate").
#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    #[serde(default)]
    pub admin_users: Vec<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            admin_users: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShareConfig {
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    #[serde(default = "default_max_ttl_secs")]
    pub max_ttl_secs: u64,
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
            max_ttl_secs: default_max_ttl_secs(),
            default_ttl_secs: default_ttl_secs(),
            base_url: None,
        }
    }
}

fn default_max_payload_bytes() -> usize {
    8_388_608
}
fn default_max_ttl_secs() -> u64 {
    3600
}
fn default_ttl_secs() -> u64 {
    600
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub per_second: u64,
    pub burst_size: u32,
}

impl AppConfig {
    /// Validate configuration invariants that aren't enforceable by serde alone.
    pub fn validate(&self) -> Result<(), String> {
        if self.database.path.as_os_str().is_empty() {
            return Err("database.path must be set".to_string());
        }
        if self.shares.max_payload_bytes == 0 {
            return Err("shares.max_payload_bytes must be greater than zero".to_string());
        }
        if self.shares.default_ttl_secs < 60 {
            return Err("shares.default_ttl_secs must be at least 60".to_string());
        }
        if self.shares.max_ttl_secs < self.shares.default_ttl_secs {
            return Err(
                "shares.max_ttl_secs must be at least shares.default_ttl_secs".to_string(),
            );
        }
        Ok(())
    }

    /// `ADMIN_USERS` empty or containing `*` means every authenticated user
    /// is an admin — a documented dev-mode default (§9 "Wildcard admin
    /// semantics"), logged so operators notice it in production.
    pub fn warn_if_dev_mode(&self) {
        if self.admin.admin_users.is_empty()
            || self.admin.admin_users.iter().any(|u| u == "*")
        {
            tracing::warn!(
                "ADMIN_USERS is empty or wildcard: every authenticated user is an admin"
            );
        }
    }

    pub fn load(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        let path = config_path.unwrap_or("config.toml");
        builder = builder.add_source(File::with_name(path).required(false));

        // Overlay with environment variables (HANDOFF__SERVER__PORT=3001, etc.)
        // ALLOWED_ORIGINS and ADMIN_USERS are CSV per §6, so both are parsed
        // as comma-separated lists rather than single scalars.
        builder = builder.add_source(
            Environment::with_prefix("HANDOFF")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("cors.allowed_origins")
                .with_list_parse_key("admin.admin_users")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
