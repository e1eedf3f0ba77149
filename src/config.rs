use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::scheduler::SchedulerConfig;
use crate::storage::sqlite::MEMORY_DSN;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TransientConfig {
    pub server: ServerConfig,
    pub auth: Option<AuthConfig>,
    pub dump: DumpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    pub port: u16,
    pub tag: String,
    pub dsn: String,
    pub data_folder: PathBuf,
    pub schemas_folder: PathBuf,
    pub access_log: bool,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1".to_string(),
            port: 8000,
            tag: "default".to_string(),
            dsn: MEMORY_DSN.to_string(),
            data_folder: PathBuf::from("/transientdb/data"),
            schemas_folder: PathBuf::from("/transientdb/schemas"),
            access_log: false,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    pub interval_minutes: i64,
    pub record_count: u64,
    pub tick_seconds: u64,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 15,
            record_count: 1000,
            tick_seconds: 60,
        }
    }
}

impl TransientConfig {
    /// Scheduler settings; a negative interval counts as its absolute value
    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick: Duration::from_secs(self.dump.tick_seconds.max(1)),
            interval: Duration::from_secs(self.dump.interval_minutes.unsigned_abs() * 60),
            page_size: self.dump.record_count.max(1),
            data_dir: self.server.data_folder.clone(),
        }
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth.as_ref().map(|a| a.token.as_str()).filter(|t| !t.is_empty())
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("transientdb.toml")
}

/// Load the configuration file; a missing file yields the defaults
pub fn load_config(path: Option<&Path>) -> anyhow::Result<TransientConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(TransientConfig::default());
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: TransientConfig = toml::from_str(&contents)?;
    Ok(config)
}
