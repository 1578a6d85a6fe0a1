//! Configuration loading and management

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::state::StatusSettings;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// JSON file holding the "live mirroring enabled" flag
    pub state_file: PathBuf,

    /// Address the ingestion server binds to
    pub bind_addr: IpAddr,

    /// Preferred ingestion port; the next few ports are tried if it is taken
    pub port: u16,

    /// Placeholder and track prefix
    pub status: StatusSettings,

    /// Chat-client bridge accepting profile text, `None` for dry run
    pub profile_url: Option<String>,

    pub profile_timeout: Duration,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match lookup("NOWPLAYING_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = lookup("HOME").context("HOME is not set")?;
                PathBuf::from(home).join(".local").join("share").join("nowplaying")
            }
        };

        let state_file = lookup("NOWPLAYING_STATE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("music_state.json"));

        let bind_addr = match lookup("NOWPLAYING_BIND") {
            Some(addr) => addr.parse::<IpAddr>().context("invalid NOWPLAYING_BIND")?,
            None => IpAddr::from([0, 0, 0, 0]),
        };

        let port = match lookup("NOWPLAYING_PORT") {
            Some(port) => port.parse::<u16>().context("invalid NOWPLAYING_PORT")?,
            None => 8888,
        };

        let defaults = StatusSettings::default();
        let status = StatusSettings {
            placeholder: lookup("NOWPLAYING_PLACEHOLDER").unwrap_or(defaults.placeholder),
            prefix: lookup("NOWPLAYING_PREFIX").unwrap_or(defaults.prefix),
        };

        let profile_url = lookup("NOWPLAYING_PROFILE_URL").filter(|url| !url.trim().is_empty());

        let profile_timeout = match lookup("NOWPLAYING_PROFILE_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse::<u64>()
                    .context("invalid NOWPLAYING_PROFILE_TIMEOUT_SECS")?,
            ),
            None => Duration::from_secs(10),
        };

        Ok(Self {
            data_dir,
            state_file,
            bind_addr,
            port,
            status,
            profile_url,
            profile_timeout,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }

    /// Ports tried in order when binding the ingestion server
    pub fn candidate_ports(&self) -> Vec<u16> {
        (0..4).filter_map(|offset| self.port.checked_add(offset)).collect()
    }
}
