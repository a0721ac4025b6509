//! Error types
//!
//! Writer-side failures come in two flavours: [`MediaError`] when bytes could
//! not be produced (malformed descriptor, compressor or sink failure) and
//! [`LogError`] when the caller broke a precondition of the log. Neither ever
//! leaves a partially written header or unit behind.

use std::fmt;
use std::io;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Encoding or compression failure
    Media(MediaError),
    /// Broadcast log precondition violation
    Log(LogError),
}

/// Failure to produce encoded bytes
#[derive(Debug)]
pub enum MediaError {
    /// Compressor or byte sink failed
    Encoding(io::Error),
    /// AVCDecoderConfigurationRecord could not be parsed
    InvalidAvcConfig,
    /// AudioSpecificConfig could not be parsed
    InvalidAacConfig,
    /// Tag payload exceeds the 24-bit FLV data size field
    TagTooLarge(usize),
}

/// Misuse of the broadcast log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    /// A unit was written before any header
    HeaderNotWritten,
    /// A unit references a stream index with no descriptor
    UnknownStream(usize),
    /// `write_header` was called with an empty descriptor list
    NoStreams,
    /// The log was closed
    Closed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Media(e) => write!(f, "Media error: {}", e),
            Error::Log(e) => write!(f, "Log error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Media(e) => Some(e),
            Error::Log(e) => Some(e),
        }
    }
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::Encoding(e) => write!(f, "Encoding failed: {}", e),
            MediaError::InvalidAvcConfig => write!(f, "Invalid AVC decoder configuration"),
            MediaError::InvalidAacConfig => write!(f, "Invalid AAC audio specific config"),
            MediaError::TagTooLarge(size) => write!(f, "Tag data too large: {} bytes", size),
        }
    }
}

impl std::error::Error for MediaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MediaError::Encoding(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogError::HeaderNotWritten => write!(f, "Unit written before header"),
            LogError::UnknownStream(idx) => write!(f, "No stream descriptor at index {}", idx),
            LogError::NoStreams => write!(f, "Header requires at least one stream"),
            LogError::Closed => write!(f, "Broadcast log is closed"),
        }
    }
}

impl std::error::Error for LogError {}

impl From<MediaError> for Error {
    fn from(e: MediaError) -> Self {
        Error::Media(e)
    }
}

impl From<LogError> for Error {
    fn from(e: LogError) -> Self {
        Error::Log(e)
    }
}

impl From<io::Error> for MediaError {
    fn from(e: io::Error) -> Self {
        MediaError::Encoding(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Media(MediaError::Encoding(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_maps_to_encoding() {
        let err: Error = io::Error::new(io::ErrorKind::WriteZero, "sink full").into();
        assert!(matches!(err, Error::Media(MediaError::Encoding(_))));
        assert!(err.to_string().contains("sink full"));
    }

    #[test]
    fn test_log_error_display() {
        let err: Error = LogError::UnknownStream(3).into();
        assert_eq!(err.to_string(), "Log error: No stream descriptor at index 3");
    }
}
