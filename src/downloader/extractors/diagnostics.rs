// Failure diagnostics - maps raw yt-dlp output to a stable error kind
//
// yt-dlp only reports failures as text on stderr. The adapters call
// `translate` on every raw extraction failure so callers see a useful kind.

use crate::downloader::errors::{DownloadError, ErrorKind};
use crate::downloader::platform::PlatformId;
use crate::downloader::utils::error_context;

const MUXER_PATTERNS: &[&str] = &["ffmpeg is not installed", "ffmpeg not found", "ffprobe"];

/// Matched before the login patterns; YouTube says "Private video. Sign in
/// if you've been granted access".
const PRIVATE_PHRASES: &[&str] = &["private video", "video is private"];

const AUTH_PATTERNS: &[&str] = &[
    "login required",
    "log in",
    "sign in",
    "cookies",
    "age-restricted",
    "members only",
];

const UNAVAILABLE_PATTERNS: &[&str] = &[
    "private",
    "unavailable",
    "no longer available",
    "has been removed",
    "copyright",
];

/// Classify raw library output. Case-insensitive substring match.
pub fn classify(output: &str) -> ErrorKind {
    let lower = output.to_lowercase();
    let matches = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

    if matches(MUXER_PATTERNS) {
        ErrorKind::MuxerUnavailable
    } else if matches(PRIVATE_PHRASES) {
        ErrorKind::PrivateOrUnavailable
    } else if matches(AUTH_PATTERNS) {
        ErrorKind::AuthenticationRequired
    } else if matches(UNAVAILABLE_PATTERNS) {
        ErrorKind::PrivateOrUnavailable
    } else if lower.contains("unsupported url") {
        ErrorKind::UnsupportedPlatform
    } else if lower.contains("is not a valid url") {
        ErrorKind::InvalidUrl
    } else {
        ErrorKind::ExtractionFailed
    }
}

/// Rewrite a raw `ExtractionFailed` into its classified form. Errors that
/// already carry a specific kind pass through untouched.
pub fn translate(platform: PlatformId, error: DownloadError) -> DownloadError {
    let DownloadError::ExtractionFailed(raw) = error else {
        return error;
    };

    let kind = classify(&raw);
    let context = error_context(&raw).unwrap_or_else(|| raw.trim().to_string());
    let name = platform.display_name();
    tracing::debug!(platform = name, kind = kind.as_str(), "Classified extraction failure");

    match kind {
        ErrorKind::MuxerUnavailable => DownloadError::MuxerUnavailable(context),
        ErrorKind::AuthenticationRequired => {
            DownloadError::AuthenticationRequired(format!("{}: {}", name, context))
        }
        ErrorKind::PrivateOrUnavailable => {
            DownloadError::PrivateOrUnavailable(format!("{}: {}", name, context))
        }
        ErrorKind::UnsupportedPlatform => DownloadError::UnsupportedPlatform(context),
        ErrorKind::InvalidUrl => DownloadError::InvalidUrl(context),
        _ => DownloadError::ExtractionFailed(format!("{}: {}", name, context)),
    }
}
