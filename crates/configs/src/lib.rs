//! # configs
//!
//! Layered configuration for the report desk:
//! built-in defaults, then an optional `report-desk.toml` (path taken from
//! `REPORT_DESK_CONFIG` when set), then `REPORT_DESK__SECTION__KEY`
//! environment variables. A `.env` file is read first if present.
//!
//! Id lists may be given in the environment as comma separated values, e.g.
//! `REPORT_DESK__DESK__REPORTS_CHANNEL_IDS=111,222`.

use std::collections::HashMap;

use config::{Config, Environment, File, FileFormat};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const CONFIG_PATH_ENV: &str = "REPORT_DESK_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "report-desk.toml";
const ENV_PREFIX: &str = "REPORT_DESK";
const LIST_KEYS: [&str; 4] = [
    "desk.reports_channel_ids",
    "desk.staff_ping_user_ids",
    "desk.tv_staff_ping_user_ids",
    "desk.vod_staff_ping_user_ids",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting `{key}`: {problem}")]
    Invalid { key: &'static str, problem: &'static str },
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PlatformConfig {
    /// Bot token; not needed by the dry-run gateway
    pub token: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    pub staff_channel_id: i64,
    pub support_channel_id: Option<i64>,
    pub reports_channel_ids: Vec<i64>,
    pub staff_ping_user_ids: Vec<i64>,
    pub tv_staff_ping_user_ids: Vec<i64>,
    pub vod_staff_ping_user_ids: Vec<i64>,
    pub staff_role_id: i64,
    pub public_updates: bool,
    pub responses_channel_id: Option<i64>,
    pub modlogs_channel_id: Option<i64>,
    pub tickets_category_id: Option<i64>,
    pub message_link_base: String,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            staff_channel_id: 0,
            support_channel_id: None,
            reports_channel_ids: Vec::new(),
            staff_ping_user_ids: Vec::new(),
            tv_staff_ping_user_ids: Vec::new(),
            vod_staff_ping_user_ids: Vec::new(),
            staff_role_id: 0,
            public_updates: true,
            responses_channel_id: None,
            modlogs_channel_id: None,
            tickets_category_id: None,
            message_link_base: "https://discord.com/channels".into(),
        }
    }
}

impl DeskConfig {
    /// Members pinged for new TV reports; the shared list when unset.
    pub fn tv_staff_pings(&self) -> &[i64] {
        if self.tv_staff_ping_user_ids.is_empty() {
            &self.staff_ping_user_ids
        } else {
            &self.tv_staff_ping_user_ids
        }
    }

    pub fn vod_staff_pings(&self) -> &[i64] {
        if self.vod_staff_ping_user_ids.is_empty() {
            &self.staff_ping_user_ids
        } else {
            &self.vod_staff_ping_user_ids
        }
    }

    /// Where resolutions are announced, if anywhere.
    pub fn responses_channel(&self) -> Option<i64> {
        self.responses_channel_id.filter(|_| self.public_updates)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://data/reports.sqlite3?mode=rwc".into(), max_connections: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiveboardConfig {
    pub refresh_secs: u64,
    pub max_rows: usize,
}

impl Default for LiveboardConfig {
    fn default() -> Self {
        Self { refresh_secs: 180, max_rows: 20 }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { format: LogFormat::Pretty, filter: "info".into() }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub platform: PlatformConfig,
    pub desk: DeskConfig,
    pub database: DatabaseConfig,
    pub liveboard: LiveboardConfig,
    pub telemetry: TelemetryConfig,
}

fn environment(vars: Option<HashMap<String, String>>) -> Environment {
    let env = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .list_separator(",")
        .try_parsing(true);
    LIST_KEYS.iter().fold(env, |env, key| env.with_list_parse_key(key)).source(vars)
}

impl AppConfig {
    /// Loads from `.env`, the config file and the process environment, then
    /// validates.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        debug!(%path, "reading configuration");

        let config = Config::builder()
            .add_source(File::new(&path, FileFormat::Toml).required(false))
            .add_source(environment(None))
            .build()?;
        Self::finish(config)
    }

    /// Same layering with explicit inputs instead of the filesystem and
    /// process environment.
    pub fn from_parts(toml: &str, vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .add_source(environment(Some(vars)))
            .build()?;
        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self, ConfigError> {
        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let desk = &self.desk;
        if desk.staff_channel_id <= 0 {
            return Err(ConfigError::Invalid { key: "desk.staff_channel_id", problem: "must be a positive id" });
        }
        if desk.reports_channel_ids.is_empty() {
            return Err(ConfigError::Invalid { key: "desk.reports_channel_ids", problem: "must list at least one channel" });
        }
        if desk.reports_channel_ids.iter().any(|id| *id <= 0) {
            return Err(ConfigError::Invalid { key: "desk.reports_channel_ids", problem: "ids must be positive" });
        }
        if desk.staff_role_id <= 0 {
            return Err(ConfigError::Invalid { key: "desk.staff_role_id", problem: "must be a positive id" });
        }
        if desk.public_updates && desk.responses_channel_id.map_or(true, |id| id <= 0) {
            return Err(ConfigError::Invalid {
                key: "desk.responses_channel_id",
                problem: "is required while desk.public_updates is on",
            });
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid { key: "database.max_connections", problem: "must be at least 1" });
        }
        if self.liveboard.refresh_secs == 0 {
            return Err(ConfigError::Invalid { key: "liveboard.refresh_secs", problem: "must be at least 1" });
        }
        if self.liveboard.max_rows == 0 {
            return Err(ConfigError::Invalid { key: "liveboard.max_rows", problem: "must be at least 1" });
        }
        Ok(())
    }
}
