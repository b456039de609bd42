//! Persisted operator settings, stored as `settings.toml` in the platform
//! config directory.
//!
//! Loading never fails: a missing file yields defaults and a malformed file is
//! logged and replaced by defaults on the next save.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;

const CONFIG_FILE: &str = "settings.toml";

/// Default host address
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8188";
/// Default cap on the floating panel width in pixels
pub const DEFAULT_MAX_WIDTH: u32 = 800;
/// Smallest configurable max width
pub const MIN_MAX_WIDTH: u32 = 400;
/// Largest configurable max width
pub const MAX_MAX_WIDTH: u32 = 1800;

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_width() -> u32 {
    DEFAULT_MAX_WIDTH
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the host, e.g. `http://127.0.0.1:8188`.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Restore the panel's last position and size.
    #[serde(default = "default_true")]
    pub remember_window_position: bool,

    /// Raw configured value; read it through [`Settings::max_width`].
    #[serde(default = "default_max_width")]
    pub max_width: u32,

    /// Keyboard shortcuts in the expanded viewer.
    #[serde(default = "default_true")]
    pub keyboard_shortcuts: bool,

    /// Identifier announced on the host event bus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            remember_window_position: true,
            max_width: DEFAULT_MAX_WIDTH,
            keyboard_shortcuts: true,
            client_id: None,
        }
    }
}

impl Settings {
    /// `<config dir>/nf-preview/settings.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "nf-preview").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Panel max width clamped to the supported range.
    pub fn max_width(&self) -> u32 {
        self.max_width.clamp(MIN_MAX_WIDTH, MAX_MAX_WIDTH)
    }

    pub fn set_max_width(&mut self, width: u32) {
        self.max_width = width.clamp(MIN_MAX_WIDTH, MAX_MAX_WIDTH);
    }

    /// Returns the configured client id, generating and storing one if absent.
    pub fn ensure_client_id(&mut self) -> &str {
        self.client_id
            .get_or_insert_with(|| format!("{:032x}", rand::random::<u128>()))
    }

    /// Reads settings from `path`, falling back to defaults on any problem.
    pub fn load_from(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("no settings at {:?}, using defaults", path);
                return Self::default();
            }
            Err(err) => {
                warn!(error = ?err, "Failed to read settings from {:?}", path);
                return Self::default();
            }
        };
        match Self::parse(&text) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(error = ?err, "Ignoring malformed settings at {:?}", path);
                Self::default()
            }
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.server_url, "http://127.0.0.1:8188");
        assert!(settings.remember_window_position);
        assert!(settings.keyboard_shortcuts);
        assert_eq!(settings.max_width(), 800);
    }

    #[test]
    fn test_max_width_is_clamped() {
        let mut settings = Settings {
            max_width: 50,
            ..Settings::default()
        };
        assert_eq!(settings.max_width(), 400);
        settings.max_width = 5000;
        assert_eq!(settings.max_width(), 1800);
        settings.set_max_width(1200);
        assert_eq!(settings.max_width, 1200);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings = Settings::parse("keyboard_shortcuts = false\n").unwrap();
        assert!(!settings.keyboard_shortcuts);
        assert!(settings.remember_window_position);
        assert_eq!(settings.server_url, DEFAULT_SERVER_URL);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut settings = Settings::default();
        settings.set_max_width(1024);
        settings.remember_window_position = false;
        settings.ensure_client_id();
        settings.save_to(&path).unwrap();

        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn test_missing_or_malformed_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert_eq!(Settings::load_from(&missing), Settings::default());

        let broken = dir.path().join(CONFIG_FILE);
        fs::write(&broken, "max_width = \"wide\"").unwrap();
        assert_eq!(Settings::load_from(&broken), Settings::default());
    }

    #[test]
    fn test_client_id_is_stable_once_generated() {
        let mut settings = Settings::default();
        let first = settings.ensure_client_id().to_string();
        assert_eq!(first.len(), 32);
        assert_eq!(settings.ensure_client_id(), first);
    }
}
