//! Window manager configuration
//!
//! `~/.config/area/window.toml`, created with the defaults on first run.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use area_window::wm::settings::{Behavior, Settings, StyleMetrics};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub style: StyleMetrics,
    pub behavior: Behavior,
    pub desktop: DesktopConfig,
}

/// Settings of the driver's own workspace bookkeeping
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    /// Number of workspaces
    pub workspaces: u32,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self { workspaces: 4 }
    }
}

impl Config {
    /// Read `window.toml`. A missing file yields the defaults and is written
    /// out so there is something to edit.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No window manager config at {:?}, using defaults", path);
                if let Err(e) = Self::write_defaults(&path) {
                    warn!("Could not write default config: {:#}", e);
                }
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        let config = Self::parse(&text)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        info!("Loaded window manager config from {:?}", path);
        debug!("{:?}", config);
        Ok(config)
    }

    /// Parse a TOML document; absent sections and keys keep their defaults
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Settings handed to every managed window
    pub fn settings(&self) -> Settings {
        Settings {
            style: self.style,
            behavior: self.behavior,
        }
    }

    fn path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("No user config directory")?;
        Ok(base.join("area").join("window.toml"))
    }

    fn write_defaults(path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let text = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize the default config")?;
        fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote default config to {:?}", path);
        Ok(())
    }
}
