use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Default User-Agent, matching a mainstream browser so range requests are
/// served the same content a browser would get.
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0";

/// Global configuration loaded from `~/.config/rdm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RdmConfig {
    /// Seconds allowed for connection establishment per attempt.
    pub connect_timeout_secs: u64,
    /// Seconds without inbound data before a segment is force-migrated.
    pub read_timeout_secs: u64,
    /// Progress/migration tick cadence in milliseconds.
    pub tick_interval_ms: u64,
    /// Poll cadence while a segment waits for an idle takeover route.
    pub idle_poll_ms: u64,
    /// User-Agent sent on every probe and segment request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for RdmConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            read_timeout_secs: 300,
            tick_interval_ms: 1000,
            idle_poll_ms: 500,
            user_agent: default_user_agent(),
        }
    }
}

impl RdmConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: RdmConfig = toml::from_str(&data)?;
    Ok(cfg)
}
