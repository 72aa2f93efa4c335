use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::core::bluetooth::CommandTimeouts;
use crate::core::bluetooth::constants::{
    DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_PAIRING_TIMEOUT_MS,
};

const CONFIG_DIR_NAME: &str = "ember-poker";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound for scan, connect and discovery, in seconds.
    pub connect_timeout_secs: u64,

    /// Time to wait for one read or write completion, in milliseconds.
    pub command_timeout_ms: u64,

    /// Time to wait for each step of the pairing handshake, in milliseconds.
    pub pairing_timeout_ms: u64,

    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            pairing_timeout_ms: DEFAULT_PAIRING_TIMEOUT_MS,
            log_level: "info".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn command_timeouts(&self) -> CommandTimeouts {
        CommandTimeouts {
            command: Duration::from_millis(self.command_timeout_ms),
            pairing: Duration::from_millis(self.pairing_timeout_ms),
        }
    }

    /// `<config dir>/ember-poker/config.json`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the config from `path`, or from the default location when no path
    /// is given. A missing file yields the defaults.
    pub async fn load_config(path: Option<&Path>) -> Result<Self> {
        let file_path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => {
                    warn!("No config directory on this platform, using default.");
                    return Ok(Self::default());
                }
            },
        };
        let file_path_str = file_path.to_string_lossy().into_owned();

        if !file_path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path_str);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(&file_path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", file_path_str);
        Ok(config)
    }
}
