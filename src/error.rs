use thiserror::Error;

/// Main error type for the Hyper-Image library
#[derive(Error, Debug)]
pub enum HyperImageError {
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Video processing error: {0}")]
    Video(#[from] VideoError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Errors raised while decoding or combining source frames
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Failed to load frame {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Frame {path} is {actual:?}, expected {expected:?} (height, width)")]
    SizeMismatch {
        path: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Failed to write {path}: {reason}")]
    WriteFailed { path: String, reason: String },
}

/// Video-specific errors
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Frame {index} is {actual:?}, video expects {expected:?} (width, height)")]
    SizeMismatch {
        index: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Video encoding failed: {reason}")]
    EncodingFailed { reason: String },

    #[error("Video decoding failed for {path}: {reason}")]
    DecodingFailed { path: String, reason: String },

    #[error("Could not probe {path}: {reason}")]
    ProbeFailed { path: String, reason: String },

    #[error("FFmpeg not found on PATH")]
    FfmpegUnavailable,
}

/// Configuration errors: bad parameters, filenames or directory layout
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Window width must be odd and at least 1, got {width}")]
    InvalidWindowWidth { width: usize },

    #[error("Need at least two videos to combine, got {count}")]
    NotEnoughVideos { count: usize },

    #[error("Malformed frame filename '{name}': {reason}")]
    MalformedFilename { name: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to parse configuration file {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Required directory does not exist: {path}")]
    MissingDirectory { path: String },
}

/// Convenience type alias for Results using HyperImageError
pub type Result<T> = std::result::Result<T, HyperImageError>;

impl HyperImageError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Whether the failure is confined to one window, clip or video.
    ///
    /// Recoverable errors are logged and the run moves on to the next sibling;
    /// everything else aborts the operation that raised it.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Frame(FrameError::LoadFailed { .. }) => true,
            Self::Frame(FrameError::SizeMismatch { .. }) => true,
            Self::Video(VideoError::SizeMismatch { .. }) => true,
            Self::Video(VideoError::DecodingFailed { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(ConfigError::MissingDirectory { path }) => {
                format!("Directory '{}' does not exist. Check dataset.base_dir and dataset.directories.", path)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            Self::Config(ConfigError::InvalidWindowWidth { width }) => {
                format!("Window width {} is not allowed. Use an odd number such as 1, 3 or 5.", width)
            }
            Self::Video(VideoError::FfmpegUnavailable) => {
                "FFmpeg is required for video output. Please install FFmpeg and make sure it is on PATH.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_failures_are_recoverable() {
        let err: HyperImageError = FrameError::LoadFailed {
            path: "c_001.jpg".to_string(),
            reason: "truncated".to_string(),
        }
        .into();
        assert!(err.is_recoverable());

        let err: HyperImageError = ConfigError::InvalidWindowWidth { width: 4 }.into();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_messages_name_the_offending_input() {
        let err: HyperImageError = ConfigError::MalformedFilename {
            name: "frame.jpg".to_string(),
            reason: "no index token".to_string(),
        }
        .into();
        assert!(err.to_string().contains("frame.jpg"));

        let err: HyperImageError = ConfigError::InvalidWindowWidth { width: 4 }.into();
        assert!(err.user_message().contains('4'));
    }
}
