use crate::error::{OverlayError, Result};
use crate::keys::KeyCombo;
use crate::position::OverlayPosition;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Added to the playback time before looking up loaded captions.
    pub offset_seconds: f64,
    /// Shortcut that toggles the overlay, e.g. `Mod+Shift+S`.
    pub shortcut: String,
    /// JSON file backing the persisted store. Kept in memory when unset.
    pub store: Option<PathBuf>,
    /// Where the overlay sits until it has been dragged.
    pub default_position: OverlayPosition,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            offset_seconds: 0.0,
            shortcut: KeyCombo::default().to_string(),
            store: None,
            default_position: OverlayPosition::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&data)
    }

    pub fn from_toml(data: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(data).map_err(|err| OverlayError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.offset_seconds.is_finite() {
            return Err(OverlayError::Config(format!(
                "offset_seconds must be finite, got {}",
                self.offset_seconds
            )));
        }
        self.key_combo()?;
        Ok(())
    }

    pub fn key_combo(&self) -> Result<KeyCombo> {
        self.shortcut.parse()
    }
}
