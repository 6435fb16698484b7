//! Error taxonomy for the tracking core.

/// Errors raised by frame sources, the motion pipeline and session setup.
///
/// `FrameUnavailable` is the only recoverable variant: the session skips the
/// cycle and carries on. Everything else ends the session.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("frame unavailable: {reason}")]
    FrameUnavailable { reason: String },

    #[error(
        "frame dimensions changed mid-session: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}"
    )]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("frame source error: {message}")]
    Source { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl TrackerError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::FrameUnavailable {
            reason: reason.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    pub fn source(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    pub fn dimension_mismatch(expected: (u32, u32), actual: (u32, u32)) -> Self {
        Self::DimensionMismatch {
            expected_width: expected.0,
            expected_height: expected.1,
            actual_width: actual.0,
            actual_height: actual.1,
        }
    }

    /// True for errors the session recovers from by skipping the cycle.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::FrameUnavailable { .. })
    }
}
