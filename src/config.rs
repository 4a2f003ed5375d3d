use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::error::{Error, Result};
use crate::store::write_json_atomic;

pub const CONFIG_FILE: &str = "config.json";
pub const DATA_DIR_ENV: &str = "TASKERS_DATA_DIR";
pub const LOG_FILE: &str = "taskers.log";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where tasks, accounts, the session and the log live.
    pub data_dir: PathBuf,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Consecutive wrong passwords before log in is refused.
    pub max_login_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_filter: "info".to_string(),
            max_login_attempts: 5,
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("taskers"))
        .unwrap_or_else(|| PathBuf::from(".taskers"))
}

impl Config {
    /// Resolves the data directory (explicit override, then
    /// `TASKERS_DATA_DIR`, then the platform default) and loads
    /// `config.json` from it, writing a default one on first run.
    pub fn load(dir_override: Option<&Path>) -> Result<Self> {
        let dir = dir_override
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(default_data_dir);
        Self::load_from(&dir)
    }

    pub fn load_from(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            let config = Config {
                data_dir: dir.to_path_buf(),
                ..Config::default()
            };
            config.save()?;
            info!(path = %path.display(), "wrote default config");
            return Ok(config);
        }

        let data = fs::read_to_string(&path)?;
        let mut config: Config = serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        // the directory we were loaded from wins over a stale value in the file
        config.data_dir = dir.to_path_buf();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        write_json_atomic(&self.data_dir.join(CONFIG_FILE), &json)?;
        Ok(())
    }
}
