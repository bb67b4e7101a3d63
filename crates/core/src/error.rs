// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for Aurocast.
//!
//! Mirrors the shape of a typical streaming-pipeline error enum: distinct
//! variants per failure domain so callers can branch on error kind instead
//! of parsing strings.

use thiserror::Error;

/// Main error type for Aurocast operations.
#[derive(Debug, Error)]
pub enum AurocastError {
    /// Configuration or parameter validation error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Runtime processing error during normal operation (track open/read/send failures).
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Network-related error (socket, HTTP, reconnect).
    #[error("network error: {0}")]
    Network(String),

    /// Codec error (MP3 decode/encode failure, unsupported format).
    #[error("codec error: {0}")]
    Codec(String),

    /// Container/tag parse error (ID3, MP3 sync, Vorbis comment, etc).
    #[error("parse error: {0}")]
    Parse(String),

    /// I/O error (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource exhaustion or allocation failure (e.g. crossfade ring realloc).
    #[error("resource exhaustion: {0}")]
    Resource(String),
}

/// Convenience alias for Results using `AurocastError`.
pub type Result<T> = std::result::Result<T, AurocastError>;

impl From<String> for AurocastError {
    fn from(s: String) -> Self {
        Self::Runtime(s)
    }
}

impl From<&str> for AurocastError {
    fn from(s: &str) -> Self {
        Self::Runtime(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_by_variant() {
        assert_eq!(
            AurocastError::Configuration("bad bitrate".into()).to_string(),
            "configuration error: bad bitrate"
        );
        assert_eq!(AurocastError::Network("timeout".into()).to_string(), "network error: timeout");
    }

    #[test]
    fn string_conversion_defaults_to_runtime() {
        let err: AurocastError = "oops".into();
        assert!(matches!(err, AurocastError::Runtime(_)));
    }
}
