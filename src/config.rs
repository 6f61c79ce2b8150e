//! Engine configuration
//!
//! `StreamConfig` is the validated, immutable policy handed to the streamer.
//! `OverlaySettings` is its on-disk form, persisted as JSON next to the
//! other application settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default number of cached frames
pub const DEFAULT_MAX_CACHE_SIZE: usize = 100;
/// Default preload horizon in frames
pub const DEFAULT_PRELOAD_FRAMES: usize = 5;
/// Default time-to-live of a cached frame in seconds
pub const DEFAULT_CACHE_TIMEOUT_SECS: f64 = 30.0;

/// Streaming policy
///
/// Only constructible through [`StreamConfig::new`] (or `Default`), so a
/// zero-capacity cache or non-positive TTL can never reach the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamConfig {
    max_cache_size: usize,
    preload_frames: usize,
    cache_timeout: Duration,
}

impl StreamConfig {
    pub fn new(
        max_cache_size: usize,
        preload_frames: usize,
        cache_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if max_cache_size == 0 {
            return Err(ConfigError::InvalidCacheSize(max_cache_size));
        }
        if cache_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(0.0));
        }
        Ok(Self {
            max_cache_size,
            preload_frames,
            cache_timeout,
        })
    }

    /// Build from a timeout expressed in (possibly fractional) seconds
    pub fn from_secs(
        max_cache_size: usize,
        preload_frames: usize,
        cache_timeout_secs: f64,
    ) -> Result<Self, ConfigError> {
        if !cache_timeout_secs.is_finite() || cache_timeout_secs <= 0.0 {
            return Err(ConfigError::InvalidTimeout(cache_timeout_secs));
        }
        Self::new(
            max_cache_size,
            preload_frames,
            Duration::from_secs_f64(cache_timeout_secs),
        )
    }

    pub fn max_cache_size(&self) -> usize {
        self.max_cache_size
    }

    pub fn preload_frames(&self) -> usize {
        self.preload_frames
    }

    pub fn cache_timeout(&self) -> Duration {
        self.cache_timeout
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            preload_frames: DEFAULT_PRELOAD_FRAMES,
            cache_timeout: Duration::from_secs_f64(DEFAULT_CACHE_TIMEOUT_SECS),
        }
    }
}

/// Serialized streaming policy (validated into [`StreamConfig`] on use)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,
    #[serde(default = "default_preload_frames")]
    pub preload_frames: usize,
    #[serde(default = "default_cache_timeout_secs")]
    pub cache_timeout_secs: f64,
}

fn default_max_cache_size() -> usize {
    DEFAULT_MAX_CACHE_SIZE
}

fn default_preload_frames() -> usize {
    DEFAULT_PRELOAD_FRAMES
}

fn default_cache_timeout_secs() -> f64 {
    DEFAULT_CACHE_TIMEOUT_SECS
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            preload_frames: DEFAULT_PRELOAD_FRAMES,
            cache_timeout_secs: DEFAULT_CACHE_TIMEOUT_SECS,
        }
    }
}

impl StreamSettings {
    pub fn to_config(&self) -> Result<StreamConfig, ConfigError> {
        StreamConfig::from_secs(
            self.max_cache_size,
            self.preload_frames,
            self.cache_timeout_secs,
        )
    }
}

impl From<StreamConfig> for StreamSettings {
    fn from(config: StreamConfig) -> Self {
        Self {
            max_cache_size: config.max_cache_size,
            preload_frames: config.preload_frames,
            cache_timeout_secs: config.cache_timeout.as_secs_f64(),
        }
    }
}

/// Overlay settings persisted to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySettings {
    /// Render target width in pixels
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    /// Render target height in pixels
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
    /// Streaming policy
    #[serde(default)]
    pub stream: StreamSettings,
}

fn default_viewport_width() -> u32 {
    1920
}

fn default_viewport_height() -> u32 {
    1080
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            stream: StreamSettings::default(),
        }
    }
}

impl OverlaySettings {
    /// Get the settings file path
    pub fn file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "karaoke-stream", "KaraokeStream")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Load settings from file, or return defaults if not found
    pub fn load() -> Self {
        Self::file_path()
            .and_then(|path| Self::load_from_file(&path).ok())
            .unwrap_or_default()
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save settings to a specific file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    /// Validated streaming policy
    pub fn stream_config(&self) -> Result<StreamConfig, ConfigError> {
        self.stream.to_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.max_cache_size(), 100);
        assert_eq!(config.preload_frames(), 5);
        assert_eq!(config.cache_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_zero_cache_size() {
        let err = StreamConfig::new(0, 5, Duration::from_secs(1)).unwrap_err();
        assert_eq!(err, ConfigError::InvalidCacheSize(0));
    }

    #[test]
    fn test_rejects_bad_timeouts() {
        assert!(StreamConfig::new(10, 5, Duration::ZERO).is_err());
        assert!(StreamConfig::from_secs(10, 5, -1.0).is_err());
        assert!(StreamConfig::from_secs(10, 5, f64::NAN).is_err());
        assert!(StreamConfig::from_secs(10, 0, 0.5).is_ok());
    }

    #[test]
    fn test_settings_partial_json_uses_defaults() {
        let settings: OverlaySettings =
            serde_json::from_str(r#"{"viewport_width": 1280, "stream": {"max_cache_size": 8}}"#)
                .unwrap();
        assert_eq!(settings.viewport_width, 1280);
        assert_eq!(settings.viewport_height, 1080);
        let config = settings.stream_config().unwrap();
        assert_eq!(config.max_cache_size(), 8);
        assert_eq!(config.preload_frames(), DEFAULT_PRELOAD_FRAMES);
    }

    #[test]
    fn test_negative_preload_is_a_parse_error() {
        let result: Result<OverlaySettings, _> =
            serde_json::from_str(r#"{"stream": {"preload_frames": -1}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_file_roundtrip() {
        let path = std::env::temp_dir()
            .join(format!("karaoke-stream-settings-{}", std::process::id()))
            .join("settings.json");
        let mut settings = OverlaySettings::default();
        settings.stream.cache_timeout_secs = 2.5;
        settings.save_to_file(&path).unwrap();

        let loaded = OverlaySettings::load_from_file(&path).unwrap();
        assert_eq!(loaded, settings);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
