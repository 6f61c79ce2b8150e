//! Error types
//!
//! Collaborator faults (`RenderError`) are converted into `StreamError` at the
//! streamer boundary, so callers only ever see a frame, an absence, or one of
//! these values.

/// Rejected configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `max_cache_size` must be at least 1
    InvalidCacheSize(usize),
    /// `cache_timeout` must be a positive, finite number of seconds
    InvalidTimeout(f64),
    Io(String),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidCacheSize(size) => {
                write!(f, "max cache size must be positive, got {}", size)
            }
            ConfigError::InvalidTimeout(secs) => {
                write!(f, "cache timeout must be a positive duration, got {}s", secs)
            }
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Rejected subtitle or karaoke record
#[derive(Debug, Clone, PartialEq)]
pub enum DataError {
    /// Start must be non-negative and strictly before end
    InvalidTiming { start: f64, end: f64 },
    /// `syllable_timings.len()` disagrees with `syllable_count`
    SyllableMismatch { count: usize, timings: usize },
    NegativeDuration { index: usize, duration: f64 },
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::InvalidTiming { start, end } => {
                write!(f, "invalid timing: start {}s, end {}s", start, end)
            }
            DataError::SyllableMismatch { count, timings } => write!(
                f,
                "syllable count {} does not match {} syllable timings",
                count, timings
            ),
            DataError::NegativeDuration { index, duration } => {
                write!(f, "syllable {} has negative duration {}s", index, duration)
            }
        }
    }
}

impl std::error::Error for DataError {}

/// Failure reported by the rasterizer or the GPU surface
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// Backing library or device is missing
    Unavailable(String),
    /// The graphics context went away mid-operation
    ContextLost(String),
    /// Pixel data does not match the declared dimensions
    InvalidBitmap(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Unavailable(e) => write!(f, "renderer unavailable: {}", e),
            RenderError::ContextLost(e) => write!(f, "graphics context lost: {}", e),
            RenderError::InvalidBitmap(e) => write!(f, "invalid bitmap: {}", e),
        }
    }
}

impl std::error::Error for RenderError {}

/// Typed failure of a frame request
#[derive(Debug, Clone, PartialEq)]
pub enum StreamError {
    /// Rasterizer failed; nothing was uploaded or cached
    Rasterize(RenderError),
    /// Texture upload failed; textures created for the request were released
    Upload(RenderError),
    InvalidSampleRate(f64),
    /// `cleanup()` already ran
    ShutDown,
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::Rasterize(e) => write!(f, "rasterization failed: {}", e),
            StreamError::Upload(e) => write!(f, "texture upload failed: {}", e),
            StreamError::InvalidSampleRate(rate) => {
                write!(f, "sample rate must be positive and finite, got {}", rate)
            }
            StreamError::ShutDown => write!(f, "texture streamer has been cleaned up"),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Rasterize(e) | StreamError::Upload(e) => Some(e),
            _ => None,
        }
    }
}
