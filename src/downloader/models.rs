// Common data models for the downloader

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::format_selector::QualityOption;
use super::platform::PlatformId;
use super::quality::QualitySpec;

/// Preview data for one URL. Built per request and never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub thumbnail: Option<String>,
    pub duration_seconds: Option<u64>,
    pub uploader: Option<String>,
    /// Player URL derived from the source URL, no network involved
    pub embed_url: String,
    pub original_url: String,
    pub platform: PlatformId,
    pub muxer_available: bool,
    pub is_short: bool,
    pub qualities: Vec<QualityOption>,
}

/// Result of a fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedFile {
    pub path: PathBuf,
    pub platform: PlatformId,
    /// Quality after platform narrowing, e.g. TikTok always reports `best`
    pub quality: QualitySpec,
    pub from_cache: bool,
}
