//! Error type shared by every stage of the render pipeline.

use std::fmt::{Display, Formatter};

/// Error type for configuration, preprocessing, mixing and export.
#[derive(Debug)]
pub enum MixError {
    Io(std::io::Error),
    InvalidConfig(String),
    EmptyTrackList,
    ZeroLoudnessWeight,
    Decode(String),
    Encode(String),
    EmptySource(String),
    SampleRateMismatch {
        path: String,
        expected: u32,
        found: u32,
    },
    InsufficientBeats {
        found: usize,
    },
    InvalidTempo(f64),
    InvalidBeats(String),
    CrossfadeTooShort {
        overlap: usize,
        first: usize,
        second: usize,
    },
    ExternalTool(String),
}

impl Display for MixError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::InvalidConfig(err) => write!(f, "invalid config: {}", err),
            Self::EmptyTrackList => write!(f, "config does not contain any tracks"),
            Self::ZeroLoudnessWeight => write!(f, "total relative loudness must be positive"),
            Self::Decode(err) => write!(f, "decode error: {}", err),
            Self::Encode(err) => write!(f, "encode error: {}", err),
            Self::EmptySource(path) => write!(f, "source contains no samples: {}", path),
            Self::SampleRateMismatch {
                path,
                expected,
                found,
            } => write!(
                f,
                "{} has sample rate {} Hz, expected {} Hz",
                path, found, expected
            ),
            Self::InsufficientBeats { found } => {
                write!(f, "at least 2 beats are required, found {}", found)
            }
            Self::InvalidTempo(bpm) => write!(f, "tempo must be positive, got {} bpm", bpm),
            Self::InvalidBeats(err) => write!(f, "invalid beat grid: {}", err),
            Self::CrossfadeTooShort {
                overlap,
                first,
                second,
            } => write!(
                f,
                "crossfade overlap of {} samples exceeds input lengths ({} and {})",
                overlap, first, second
            ),
            Self::ExternalTool(err) => write!(f, "external tool failed: {}", err),
        }
    }
}

impl std::error::Error for MixError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MixError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for MixError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidConfig(value.to_string())
    }
}

impl From<symphonia::core::errors::Error> for MixError {
    fn from(value: symphonia::core::errors::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<hound::Error> for MixError {
    fn from(value: hound::Error) -> Self {
        match value {
            hound::Error::IoError(err) => Self::Io(err),
            other => Self::Encode(other.to_string()),
        }
    }
}
