//! Daemon configuration loading.
//!
//! Configuration lives in `~/.sidekick/config.toml`. The launcher and
//! companion settings have no meaningful defaults, so a missing or malformed
//! file is a startup error rather than something to paper over.

use crate::error::{Result, SidekickError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_RELATIVE_PATH: &str = ".sidekick/config.toml";

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_resume_gap_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Process name of the launcher application to observe.
    pub launcher_process: String,
    /// Full path to the companion executable.
    pub companion_path: PathBuf,
    /// Process name of the companion, used to query for running instances.
    pub companion_process: String,
    /// How often the process table is polled for creation/termination events.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Wall-clock gap between monitor ticks that is treated as a resume.
    #[serde(default = "default_resume_gap_secs")]
    pub resume_gap_secs: u64,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(SidekickError::ConfigNotFound(path.to_path_buf()));
        }
        let content =
            fs_err::read_to_string(path).map_err(|err| SidekickError::ConfigMalformed {
                path: path.to_path_buf(),
                details: err.to_string(),
            })?;
        toml::from_str::<Config>(&content).map_err(|err| SidekickError::ConfigMalformed {
            path: path.to_path_buf(),
            details: err.to_string(),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn resume_gap(&self) -> Duration {
        Duration::from_secs(self.resume_gap_secs)
    }
}

/// Returns the default configuration path (`~/.sidekick/config.toml`).
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(SidekickError::HomeDirNotFound)?;
    Ok(home.join(DEFAULT_CONFIG_RELATIVE_PATH))
}
