//! Error types for radar fetching and decoding.

use thiserror::Error;

/// Result type alias using RadarError.
pub type RadarResult<T> = Result<T, RadarError>;

/// Primary error type for a fetch-and-decode cycle.
///
/// A single failing frame aborts the whole cycle, so every variant is
/// fatal for the fetch that produced it.
#[derive(Debug, Error)]
pub enum RadarError {
    // === Transport Errors ===
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    // === Decode Errors ===
    #[error("archive error: {0}")]
    Archive(String),

    #[error("format error: {0}")]
    Format(#[from] FormatError),

    // === Setup Errors ===
    #[error("projection error: {0}")]
    Projection(String),

    // === Infrastructure Errors ===
    #[error("decode task failed: {0}")]
    Task(String),
}

/// Coarse classification of a [`RadarError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Archive,
    Format,
    Projection,
    Internal,
}

impl RadarError {
    /// Create an Archive error from anything displayable.
    pub fn archive(err: impl std::fmt::Display) -> Self {
        Self::Archive(err.to_string())
    }

    /// Create a Transport error from anything displayable.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RadarError::Transport(_) | RadarError::UnexpectedStatus { .. } => ErrorKind::Transport,
            RadarError::Archive(_) => ErrorKind::Archive,
            RadarError::Format(_) => ErrorKind::Format,
            RadarError::Projection(_) => ErrorKind::Projection,
            RadarError::Task(_) => ErrorKind::Internal,
        }
    }

    /// The frame-level error, if this is a format failure.
    pub fn as_format(&self) -> Option<&FormatError> {
        match self {
            RadarError::Format(e) => Some(e),
            _ => None,
        }
    }
}

/// Frame-level decode failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("header too short: expected {expected} bytes, got {actual}")]
    HeaderTooShort { expected: usize, actual: usize },

    #[error("missing header terminator: expected 0x03, found {}", describe_byte(*.found))]
    MissingTerminator { found: Option<u8> },

    #[error("invalid {field} field: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("coordinate out of range: ({x}, {y}) outside {width}x{height} grid")]
    CoordinateOutOfRange {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("truncated payload: row {row} needs {expected} bytes")]
    TruncatedPayload { row: u32, expected: usize },
}

impl FormatError {
    /// Create an InvalidField error.
    pub fn invalid_field(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            value: value.into(),
        }
    }
}

fn describe_byte(found: Option<u8>) -> String {
    match found {
        Some(b) => format!("{:#04x}", b),
        None => "end of stream".to_string(),
    }
}
