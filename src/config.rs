//! Configuration management for the dashboard renderer.
//!
//! Handles loading, saving, and validating configuration from JSON files.

use crate::render::{Ditherer, PaletteKind, Size};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "/opt/epaper-renderer/config.json";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// URL of the dashboard page to render
    #[serde(default)]
    pub dashboard_url: String,

    /// Device display width in pixels
    #[serde(default = "default_display_width")]
    pub display_width: u32,

    /// Device display height in pixels
    #[serde(default = "default_display_height")]
    pub display_height: u32,

    /// Browser viewport width override; defaults to the render target width
    #[serde(default)]
    pub viewport_width: Option<u32>,

    /// Browser viewport height override; defaults to the render target height
    #[serde(default)]
    pub viewport_height: Option<u32>,

    /// Display rotation in degrees (0, 90, 180, 270)
    #[serde(default)]
    pub rotation: u16,

    /// Horizontal mirror
    #[serde(default)]
    pub mirror_h: bool,

    /// Vertical mirror
    #[serde(default)]
    pub mirror_v: bool,

    /// Panel color palette
    #[serde(default = "default_palette")]
    pub palette: PaletteKind,

    /// Error-diffusion kernel
    #[serde(default = "default_ditherer")]
    pub ditherer: Ditherer,

    /// Total screenshot capture timeout in seconds
    #[serde(default = "default_capture_timeout_secs")]
    pub capture_timeout_secs: u64,

    /// Web server port
    #[serde(default = "default_web_port")]
    pub web_port: u16,

    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
}

fn default_display_width() -> u32 {
    800
}

fn default_display_height() -> u32 {
    480
}

fn default_palette() -> PaletteKind {
    PaletteKind::BlackWhiteRed
}

fn default_ditherer() -> Ditherer {
    Ditherer::Atkinson
}

fn default_capture_timeout_secs() -> u64 {
    30
}

fn default_web_port() -> u16 {
    8888
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dashboard_url: String::new(),
            display_width: default_display_width(),
            display_height: default_display_height(),
            viewport_width: None,
            viewport_height: None,
            rotation: 0,
            mirror_h: false,
            mirror_v: false,
            palette: default_palette(),
            ditherer: default_ditherer(),
            capture_timeout_secs: default_capture_timeout_secs(),
            web_port: default_web_port(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file atomically
    ///
    /// Write-to-temp-then-rename: the file on disk is always either the old
    /// or the new config, never a partial write.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)?;

        std::fs::rename(&tmp_path, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            ConfigError::ReadError(e)
        })?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.dashboard_url.trim().is_empty() {
            let url = Url::parse(self.dashboard_url.trim()).map_err(|e| {
                ConfigError::ValidationError(format!(
                    "dashboard_url '{}' is not an absolute URL: {}",
                    self.dashboard_url, e
                ))
            })?;
            if url.cannot_be_a_base() {
                return Err(ConfigError::ValidationError(format!(
                    "dashboard_url '{}' is not a fetchable URL",
                    self.dashboard_url
                )));
            }
        }

        if !matches!(self.rotation, 0 | 90 | 180 | 270) {
            return Err(ConfigError::ValidationError(
                "rotation must be 0, 90, 180, or 270".to_string(),
            ));
        }

        if self.web_port == 0 {
            return Err(ConfigError::ValidationError(
                "web_port must be greater than 0".to_string(),
            ));
        }

        if self.display_width == 0 || self.display_height == 0 {
            return Err(ConfigError::ValidationError(
                "display dimensions must be positive".to_string(),
            ));
        }

        if self.viewport_width == Some(0) || self.viewport_height == Some(0) {
            return Err(ConfigError::ValidationError(
                "viewport dimensions must be positive".to_string(),
            ));
        }

        if self.capture_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "capture_timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Check if a dashboard URL is configured
    pub fn has_dashboard_url(&self) -> bool {
        !self.dashboard_url.trim().is_empty()
    }

    /// Parsed dashboard URL
    pub fn dashboard_url(&self) -> Result<Url, ConfigError> {
        Url::parse(self.dashboard_url.trim()).map_err(|e| {
            ConfigError::ValidationError(format!(
                "dashboard_url '{}' is not an absolute URL: {}",
                self.dashboard_url, e
            ))
        })
    }

    /// Configured device resolution
    pub fn display_size(&self) -> Size {
        Size::new(self.display_width, self.display_height)
    }

    /// Browser viewport for a given render target, honoring the override
    pub fn viewport_for(&self, target: Size) -> Size {
        Size::new(
            self.viewport_width.unwrap_or(target.width),
            self.viewport_height.unwrap_or(target.height),
        )
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_relative_dashboard_url() {
        let config = Config {
            dashboard_url: "/dashboard/1".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_rotation() {
        let config = Config {
            rotation: 45,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_port_and_dimensions() {
        let config = Config {
            web_port: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            display_width: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            viewport_height: Some(0),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn viewport_override_takes_precedence() {
        let config = Config {
            viewport_width: Some(1600),
            viewport_height: Some(960),
            ..Config::default()
        };
        let target = Size::new(800, 480);
        assert_eq!(config.viewport_for(target), Size::new(1600, 960));

        let config = Config::default();
        assert_eq!(config.viewport_for(target), target);
    }

    #[test]
    fn config_json_round_trips() {
        let config = Config {
            dashboard_url: "http://dashboard.local/board/3".to_string(),
            rotation: 90,
            mirror_h: true,
            palette: PaletteKind::BlackWhite,
            ditherer: Ditherer::FloydSteinberg,
            ..Config::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.dashboard_url, config.dashboard_url);
        assert_eq!(parsed.rotation, 90);
        assert!(parsed.mirror_h);
        assert_eq!(parsed.palette, PaletteKind::BlackWhite);
        assert_eq!(parsed.ditherer, Ditherer::FloydSteinberg);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let parsed: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.display_size(), Size::new(800, 480));
        assert_eq!(parsed.web_port, 8888);
        assert_eq!(parsed.palette, PaletteKind::BlackWhiteRed);
        assert_eq!(parsed.ditherer, Ditherer::Atkinson);
    }
}
