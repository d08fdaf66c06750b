// Dispatcher - routes requests to the platform backend
//
// Owns the cache, the extractor and one backend per platform. Every request
// is checked syntactically, resolved to a platform, then handed to an
// `Adapter` bound to that platform's backend.

use std::path::Path;
use std::sync::Arc;

use tracing::instrument;

use super::backends::{Adapter, FacebookBackend, PlatformBackend, TikTokBackend, YouTubeBackend};
use super::cache::{CacheManager, EvictionReport};
use super::errors::DownloadError;
use super::extractors::{CliInfoExtractor, ExtractorConfig, InfoExtractor};
use super::models::{FetchedFile, VideoMetadata};
use super::platform::{detect, PlatformId};
use super::quality::QualitySpec;
use super::tools::ToolType;
use super::utils::{is_netscape_cookie_file, is_valid_url};
use crate::config::{AppConfig, UnknownPlatformPolicy};

pub struct Dispatcher {
    config: AppConfig,
    cache: CacheManager,
    extractor: Arc<dyn InfoExtractor>,
    extractor_config: ExtractorConfig,
    muxer_available: bool,
    youtube: YouTubeBackend,
    facebook: FacebookBackend,
    tiktok: TikTokBackend,
}

impl Dispatcher {
    pub fn new(config: AppConfig, extractor: Arc<dyn InfoExtractor>, muxer_available: bool) -> Self {
        Self {
            cache: config.cache_manager(),
            extractor_config: config.extractor_config(),
            config,
            extractor,
            muxer_available,
            youtube: YouTubeBackend,
            facebook: FacebookBackend,
            tiktok: TikTokBackend,
        }
    }

    /// Real yt-dlp binary, muxer probed once at startup.
    pub async fn from_config(config: AppConfig) -> Self {
        let tools = config.tool_manager();
        let extractor = CliInfoExtractor::new(tools.resolve(ToolType::YtDlp));
        let muxer_available = tools.muxer_available().await;
        if !muxer_available {
            tracing::warn!("ffmpeg not found, downloads fall back to pre-muxed formats");
        }
        tracing::debug!(
            ytdlp = %extractor.path().display(),
            muxer_available,
            "Dispatcher ready"
        );
        Self::new(config, Arc::new(extractor), muxer_available)
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn muxer_available(&self) -> bool {
        self.muxer_available
    }

    fn backend(&self, platform: PlatformId) -> Option<&dyn PlatformBackend> {
        match platform {
            PlatformId::YouTube => Some(&self.youtube),
            PlatformId::Facebook => Some(&self.facebook),
            PlatformId::TikTok => Some(&self.tiktok),
            PlatformId::Unknown => None,
        }
    }

    /// Resolve the adapter for a URL. A hint of `None` or `"auto"` uses the
    /// detector; any other hint must name a platform.
    pub fn dispatch(&self, url: &str, platform_hint: Option<&str>) -> Result<Adapter<'_>, DownloadError> {
        if !is_valid_url(url) {
            return Err(DownloadError::InvalidUrl(url.to_string()));
        }

        let hint = platform_hint
            .map(str::trim)
            .filter(|hint| !hint.is_empty() && !hint.eq_ignore_ascii_case("auto"));
        let platform = match hint {
            Some(name) => name
                .parse::<PlatformId>()
                .map_err(|e| DownloadError::UnsupportedPlatform(e.0))?,
            None => detect(url),
        };

        let platform = match (platform, self.config.unknown_platform) {
            (PlatformId::Unknown, UnknownPlatformPolicy::Reject) => {
                return Err(DownloadError::UnsupportedPlatform(url.to_string()));
            }
            (PlatformId::Unknown, UnknownPlatformPolicy::YouTube) => {
                tracing::debug!(url, "Unknown platform, falling back to YouTube");
                PlatformId::YouTube
            }
            (known, _) => known,
        };

        let backend = self
            .backend(platform)
            .ok_or_else(|| DownloadError::UnsupportedPlatform(platform.to_string()))?;
        Ok(Adapter::new(
            backend,
            self.extractor.as_ref(),
            &self.cache,
            &self.extractor_config,
            self.muxer_available,
            self.config.reuse_cached,
        ))
    }

    #[instrument(skip(self))]
    pub async fn preview(
        &self,
        url: &str,
        platform_hint: Option<&str>,
        cookie_file: Option<&Path>,
    ) -> Result<VideoMetadata, DownloadError> {
        let adapter = self.dispatch(url, platform_hint)?;
        warn_on_odd_cookie_file(cookie_file).await;
        adapter.preview(url, cookie_file).await
    }

    /// Evicts expired entries first, then fetches through the cache.
    #[instrument(skip(self))]
    pub async fn fetch(
        &self,
        url: &str,
        platform_hint: Option<&str>,
        quality: QualitySpec,
        cookie_file: Option<&Path>,
    ) -> Result<FetchedFile, DownloadError> {
        let adapter = self.dispatch(url, platform_hint)?;
        self.evict_expired().await;
        warn_on_odd_cookie_file(cookie_file).await;
        adapter.fetch(url, quality, cookie_file).await
    }

    pub async fn evict_expired(&self) -> EvictionReport {
        self.cache.evict_expired().await
    }
}

async fn warn_on_odd_cookie_file(cookie_file: Option<&Path>) {
    let Some(path) = cookie_file else {
        return;
    };
    if !path.is_file() {
        tracing::warn!(path = %path.display(), "Cookie file not found, continuing without it");
    } else if !is_netscape_cookie_file(path).await {
        tracing::warn!(path = %path.display(), "Cookie file is not in Netscape format");
    }
}
