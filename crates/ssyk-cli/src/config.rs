//! `~/.sasayaki/config.toml` -- settings that don't belong in the identity
//! file or the store: which hub to dial, and our own display name.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Persisted CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `host:port` of the relay hub to connect to.
    pub hub_address: String,
    /// Our own display name, shown to peers accepting a contact request.
    pub display_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hub_address: "127.0.0.1:7745".to_string(),
            display_name: "anonymous".to_string(),
        }
    }
}

impl Config {
    /// Load `path`, or fall back to defaults if it doesn't exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config at {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config at {}", path.display()))
    }

    /// Write `self` to `path` as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = toml::to_string_pretty(self).context("serializing config")?;
        std::fs::write(path, raw).with_context(|| format!("writing config at {}", path.display()))
    }
}
