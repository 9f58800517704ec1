//! Configuration management for the capture engine.
//!
//! Loads configuration from TOML files and provides runtime defaults.

use crate::error::CaptureError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub scroll: ScrollConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub payload: PayloadConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Humanized scroll cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// Delay before the first tick
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_min_delay")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_min_distance")]
    pub min_distance_px: u32,

    #[serde(default = "default_max_distance")]
    pub max_distance_px: u32,

    /// Chance per tick of an extended reading pause (0.0 - 1.0)
    #[serde(default = "default_pause_probability")]
    pub pause_probability: f64,

    #[serde(default = "default_min_pause")]
    pub min_pause_ms: u64,

    #[serde(default = "default_max_pause")]
    pub max_pause_ms: u64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay(),
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
            min_distance_px: default_min_distance(),
            max_distance_px: default_max_distance(),
            pause_probability: default_pause_probability(),
            min_pause_ms: default_min_pause(),
            max_pause_ms: default_max_pause(),
        }
    }
}

/// DOM heuristic thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Ancestor levels walked when looking for a post container
    #[serde(default = "default_max_ancestor_depth")]
    pub max_ancestor_depth: usize,

    #[serde(default = "default_container_min_height")]
    pub container_min_height: f64,

    #[serde(default = "default_container_max_height")]
    pub container_max_height: f64,

    /// Container text must be longer than this
    #[serde(default = "default_container_min_text")]
    pub container_min_text: usize,

    /// Text candidates must be shorter than this
    #[serde(default = "default_candidate_max_len")]
    pub candidate_max_len: usize,

    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,

    /// Minimum text length for DOM-derived posts
    #[serde(default = "default_min_dom_text_len")]
    pub min_dom_text_len: usize,

    /// Minimum text length for connector posts merged at export
    #[serde(default = "default_min_external_text_len")]
    pub min_external_text_len: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_ancestor_depth: default_max_ancestor_depth(),
            container_min_height: default_container_min_height(),
            container_max_height: default_container_max_height(),
            container_min_text: default_container_min_text(),
            candidate_max_len: default_candidate_max_len(),
            max_text_len: default_max_text_len(),
            min_dom_text_len: default_min_dom_text_len(),
            min_external_text_len: default_min_external_text_len(),
        }
    }
}

/// Structured payload search limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_min_payload_text_len")]
    pub min_text_len: usize,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            min_text_len: default_min_payload_text_len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// URL substring identifying the feed API endpoint
    #[serde(default = "default_api_path")]
    pub api_path: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_path: default_api_path(),
        }
    }
}

// Default value functions for serde
fn default_log_level() -> String {
    "info".to_string()
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_min_delay() -> u64 {
    800
}

fn default_max_delay() -> u64 {
    1200
}

fn default_min_distance() -> u32 {
    300
}

fn default_max_distance() -> u32 {
    800
}

fn default_pause_probability() -> f64 {
    0.08
}

fn default_min_pause() -> u64 {
    1500
}

fn default_max_pause() -> u64 {
    4000
}

fn default_max_ancestor_depth() -> usize {
    20
}

fn default_container_min_height() -> f64 {
    100.0
}

fn default_container_max_height() -> f64 {
    2000.0
}

fn default_container_min_text() -> usize {
    50
}

fn default_candidate_max_len() -> usize {
    2000
}

fn default_max_text_len() -> usize {
    3000
}

fn default_min_dom_text_len() -> usize {
    15
}

fn default_min_external_text_len() -> usize {
    10
}

fn default_max_depth() -> usize {
    15
}

fn default_min_payload_text_len() -> usize {
    5
}

fn default_api_path() -> String {
    "/api/graphql/".to_string()
}

impl CaptureConfig {
    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_config_path())
    }

    /// Load configuration from a specific path, falling back to defaults
    pub fn load_from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("feed-capture")
            .join("config.toml")
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<(), CaptureError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert_eq!(config.payload.max_depth, 15);
        assert_eq!(config.extraction.max_ancestor_depth, 20);
        assert_eq!(config.extraction.min_dom_text_len, 15);
        assert_eq!(config.network.api_path, "/api/graphql/");
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_str = r#"
[general]
log_level = "debug"

[scroll]
min_delay_ms = 500
pause_probability = 0.0
"#;

        let config: CaptureConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.scroll.min_delay_ms, 500);
        assert_eq!(config.scroll.max_delay_ms, 1200);
        assert_eq!(config.scroll.pause_probability, 0.0);
        assert_eq!(config.extraction.container_max_height, 2000.0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = CaptureConfig::default();
        config.network.api_path = "/api/feed/".to_string();
        config.save_to_path(&path).unwrap();

        let loaded = CaptureConfig::load_from_path(&path);
        assert_eq!(loaded.network.api_path, "/api/feed/");
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let config = CaptureConfig::load_from_path(&path);
        assert_eq!(config.payload.max_depth, 15);
    }
}
