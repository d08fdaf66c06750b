// Error types surfaced to the web layer

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error category handed to callers alongside a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidUrl,
    UnsupportedPlatform,
    PrivateOrUnavailable,
    /// Login or cookie file needed
    AuthenticationRequired,
    /// Normally degrades silently; only raised when yt-dlp itself refuses
    MuxerUnavailable,
    ExtractionFailed,
    CacheIoError,
    ToolNotFound,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid_url",
            Self::UnsupportedPlatform => "unsupported_platform",
            Self::PrivateOrUnavailable => "private_or_unavailable",
            Self::AuthenticationRequired => "authentication_required",
            Self::MuxerUnavailable => "muxer_unavailable",
            Self::ExtractionFailed => "extraction_failed",
            Self::CacheIoError => "cache_io_error",
            Self::ToolNotFound => "tool_not_found",
        }
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    /// URL is malformed or does not look like a video on its platform
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Video is private or unavailable: {0}")]
    PrivateOrUnavailable(String),

    #[error("Login required, provide a valid cookies.txt: {0}")]
    AuthenticationRequired(String),

    #[error("FFmpeg is not installed: {0}")]
    MuxerUnavailable(String),

    /// Generic or unmatched yt-dlp failure
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Cache I/O error at {}: {source}", path.display())]
    CacheIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// yt-dlp binary not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl(_) => ErrorKind::InvalidUrl,
            Self::UnsupportedPlatform(_) => ErrorKind::UnsupportedPlatform,
            Self::PrivateOrUnavailable(_) => ErrorKind::PrivateOrUnavailable,
            Self::AuthenticationRequired(_) => ErrorKind::AuthenticationRequired,
            Self::MuxerUnavailable(_) => ErrorKind::MuxerUnavailable,
            Self::ExtractionFailed(_) => ErrorKind::ExtractionFailed,
            Self::CacheIo { .. } => ErrorKind::CacheIoError,
            Self::ToolNotFound(_) => ErrorKind::ToolNotFound,
        }
    }

    pub fn cache_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::CacheIo {
            path: path.into(),
            source,
        }
    }

    /// Serializable form for the web layer
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// `{ "kind": ..., "message": ... }` body returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = DownloadError::AuthenticationRequired("login".into());
        assert_eq!(err.kind(), ErrorKind::AuthenticationRequired);

        let err = DownloadError::cache_io("/tmp/x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(err.kind(), ErrorKind::CacheIoError);
        assert!(err.to_string().contains("/tmp/x"));
    }

    #[test]
    fn response_serializes_snake_case_kind() {
        let response = DownloadError::PrivateOrUnavailable("gone".into()).to_response();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["kind"], "private_or_unavailable");
        assert_eq!(json["message"], "Video is private or unavailable: gone");
        assert_eq!(ErrorKind::PrivateOrUnavailable.as_str(), "private_or_unavailable");
    }
}
