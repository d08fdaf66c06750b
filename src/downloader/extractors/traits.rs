// InfoExtractor trait and common types

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::downloader::errors::DownloadError;
use crate::downloader::format_selector::FormatExpression;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Options shared by metadata and download calls
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    /// Path to cookies.txt file
    pub cookies_path: Option<PathBuf>,
    pub user_agent: String,
    /// Network timeout handed to yt-dlp (`--socket-timeout`)
    pub socket_timeout_seconds: u32,
    pub retries: u32,
    pub fragment_retries: u32,
    /// YouTube player clients (android, web, tv)
    pub player_clients: Vec<String>,
    pub geo_bypass: bool,
    /// Upper bound for one yt-dlp process; `None` leaves it to the caller
    pub process_timeout_seconds: Option<u64>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            cookies_path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            socket_timeout_seconds: 30,
            retries: 3,
            fragment_retries: 3,
            player_clients: Vec::new(),
            geo_bypass: false,
            process_timeout_seconds: None,
        }
    }
}

impl ExtractorConfig {
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Only keeps the cookie file if it exists on disk.
    pub fn with_cookies_path(mut self, path: Option<&Path>) -> Self {
        self.cookies_path = path.filter(|p| p.is_file()).map(Path::to_path_buf);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u32) -> Self {
        self.socket_timeout_seconds = seconds;
        self
    }

    pub fn with_retries(mut self, retries: u32, fragment_retries: u32) -> Self {
        self.retries = retries;
        self.fragment_retries = fragment_retries;
        self
    }

    pub fn with_player_clients(mut self, clients: &[&str]) -> Self {
        self.player_clients = clients.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_geo_bypass(mut self, enabled: bool) -> Self {
        self.geo_bypass = enabled;
        self
    }

    pub fn with_process_timeout(mut self, seconds: Option<u64>) -> Self {
        self.process_timeout_seconds = seconds;
        self
    }
}

/// Post-processing steps that need ffmpeg
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessor {
    /// FFmpegExtractAudio
    ExtractAudio { codec: String, quality: String },
    /// FFmpegVideoConvertor
    ConvertVideo { format: String },
}

impl PostProcessor {
    pub fn mp3() -> Self {
        Self::ExtractAudio {
            codec: "mp3".to_string(),
            quality: "192".to_string(),
        }
    }

    pub fn mp4() -> Self {
        Self::ConvertVideo {
            format: "mp4".to_string(),
        }
    }
}

/// What to download and where to put it
#[derive(Debug, Clone)]
pub struct DownloadSpec {
    pub format: FormatExpression,
    /// yt-dlp output template, e.g. `/cache/<hash>.%(ext)s`
    pub output_template: String,
    pub postprocessors: Vec<PostProcessor>,
    pub merge_output_format: Option<String>,
}

/// Format information from yt-dlp
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtendedFormat {
    /// Format ID (e.g., "137", "140")
    pub format_id: String,
    /// File extension (mp4, webm, m4a)
    pub ext: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f32>,
    /// Video codec (avc1, vp9, av01, none)
    pub vcodec: Option<String>,
    /// Audio codec (mp4a, opus, none)
    pub acodec: Option<String>,
    pub filesize: Option<u64>,
    /// Total bitrate in kbps
    pub tbr: Option<f32>,
    pub format_note: Option<String>,
}

impl ExtendedFormat {
    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref().map_or(self.height.is_some(), |v| v != "none")
    }

    pub fn has_audio(&self) -> bool {
        self.acodec.as_deref().is_some_and(|a| a != "none")
    }
}

/// Video info with all formats
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtendedVideoInfo {
    pub id: String,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub duration_seconds: Option<u64>,
    pub thumbnail: Option<String>,
    pub webpage_url: Option<String>,
    pub formats: Vec<ExtendedFormat>,
}

/// The extraction library as seen by the adapters
#[async_trait]
pub trait InfoExtractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Check if this extractor is available
    async fn is_available(&self) -> bool;

    /// Metadata only, nothing is downloaded
    async fn extract_info(
        &self,
        url: &str,
        config: &ExtractorConfig,
    ) -> Result<ExtendedVideoInfo, DownloadError>;

    /// Download and return the final on-disk path after post-processing
    async fn download(
        &self,
        url: &str,
        config: &ExtractorConfig,
        spec: &DownloadSpec,
    ) -> Result<PathBuf, DownloadError>;
}
