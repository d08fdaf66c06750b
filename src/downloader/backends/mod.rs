// Per-platform backends
//
// A backend only holds policy. `Adapter` runs the uniform preview/fetch flow
// on top of one backend, the extractor and the cache.

use std::path::Path;

use crate::downloader::cache::CacheManager;
use crate::downloader::errors::DownloadError;
use crate::downloader::extractors::{
    translate, DownloadSpec, ExtendedVideoInfo, ExtractorConfig, InfoExtractor, PostProcessor,
};
use crate::downloader::format_selector::{FormatExpression, FormatSelector, QualityOption};
use crate::downloader::models::{FetchedFile, VideoMetadata};
use crate::downloader::platform::{is_youtube_short, PlatformId};
use crate::downloader::quality::QualitySpec;

pub mod facebook;
pub mod tiktok;
pub mod youtube;

pub use facebook::FacebookBackend;
pub use tiktok::TikTokBackend;
pub use youtube::YouTubeBackend;

/// Post-processing steps plus the merge container, applied only with a muxer
pub type PostProcessing = (Vec<PostProcessor>, Option<String>);

/// Platform-specific policy
pub trait PlatformBackend: Send + Sync {
    fn platform(&self) -> PlatformId;

    /// Domain plus video-path check
    fn validate_url(&self, url: &str) -> bool;

    fn embed_url(&self, url: &str, info: &ExtendedVideoInfo) -> String;

    fn quality_options(&self, info: &ExtendedVideoInfo) -> Vec<QualityOption>;

    /// Platform extractor options layered over the shared config
    fn tune(&self, config: ExtractorConfig) -> ExtractorConfig {
        config
    }

    fn select_format(&self, url: &str, quality: QualitySpec, muxer_available: bool) -> FormatExpression {
        FormatSelector::select_for_url(self.platform(), url, quality, muxer_available)
    }

    /// Steps to request when the muxer is available
    fn postprocessing(&self, quality: QualitySpec) -> PostProcessing;
}

fn has_platform_domain(platform: PlatformId, url: &str) -> bool {
    let lower = url.to_lowercase();
    platform.domains().iter().any(|domain| lower.contains(domain))
}

/// One backend bound to the shared extractor, cache and config.
pub struct Adapter<'a> {
    backend: &'a dyn PlatformBackend,
    extractor: &'a dyn InfoExtractor,
    cache: &'a CacheManager,
    config: ExtractorConfig,
    muxer_available: bool,
    reuse_cached: bool,
}

impl<'a> Adapter<'a> {
    pub fn new(
        backend: &'a dyn PlatformBackend,
        extractor: &'a dyn InfoExtractor,
        cache: &'a CacheManager,
        config: &ExtractorConfig,
        muxer_available: bool,
        reuse_cached: bool,
    ) -> Self {
        Self {
            backend,
            extractor,
            cache,
            config: backend.tune(config.clone()),
            muxer_available,
            reuse_cached,
        }
    }

    pub fn platform(&self) -> PlatformId {
        self.backend.platform()
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    fn validate(&self, url: &str) -> Result<(), DownloadError> {
        if self.backend.validate_url(url) {
            Ok(())
        } else {
            Err(DownloadError::InvalidUrl(format!(
                "not a {} video URL: {}",
                self.platform().display_name(),
                url
            )))
        }
    }

    /// A per-request cookie file replaces the configured one
    fn request_config(&self, cookie_file: Option<&Path>) -> ExtractorConfig {
        match cookie_file {
            Some(path) => self.config.clone().with_cookies_path(Some(path)),
            None => self.config.clone(),
        }
    }

    pub async fn preview(
        &self,
        url: &str,
        cookie_file: Option<&Path>,
    ) -> Result<VideoMetadata, DownloadError> {
        self.validate(url)?;
        let platform = self.platform();
        let config = self.request_config(cookie_file);

        let info = self
            .extractor
            .extract_info(url, &config)
            .await
            .map_err(|e| translate(platform, e))?;

        Ok(VideoMetadata {
            title: info
                .title
                .clone()
                .unwrap_or_else(|| format!("{} Video", platform.display_name())),
            thumbnail: info.thumbnail.clone(),
            duration_seconds: info.duration_seconds,
            uploader: info.uploader.clone(),
            embed_url: self.backend.embed_url(url, &info),
            original_url: url.to_string(),
            platform,
            muxer_available: self.muxer_available,
            is_short: platform == PlatformId::YouTube && is_youtube_short(url),
            qualities: self.backend.quality_options(&info),
        })
    }

    pub async fn fetch(
        &self,
        url: &str,
        quality: QualitySpec,
        cookie_file: Option<&Path>,
    ) -> Result<FetchedFile, DownloadError> {
        self.validate(url)?;
        let platform = self.platform();
        let quality = FormatSelector::narrow(platform, quality);
        let format = self.backend.select_format(url, quality, self.muxer_available);

        self.cache.ensure_dir().await?;
        let _guard = self.cache.lock(url, quality).await;

        if self.reuse_cached {
            if let Some(entry) = self.cache.lookup(url, quality).await {
                tracing::info!(path = %entry.path.display(), "Serving cached file");
                return Ok(FetchedFile {
                    path: entry.path,
                    platform,
                    quality,
                    from_cache: true,
                });
            }
        }

        // Post-processing silently dropped without a muxer
        let (postprocessors, merge_output_format) = if self.muxer_available {
            self.backend.postprocessing(quality)
        } else {
            (Vec::new(), None)
        };
        let spec = DownloadSpec {
            format,
            output_template: self.cache.output_template(url, quality),
            postprocessors,
            merge_output_format,
        };
        tracing::debug!(format = %spec.format, template = %spec.output_template, "Starting download");

        let config = self.request_config(cookie_file);
        let path = self
            .extractor
            .download(url, &config, &spec)
            .await
            .map_err(|e| translate(platform, e))?;

        tracing::info!(platform = platform.as_str(), path = %path.display(), "Download finished");
        Ok(FetchedFile {
            path,
            platform,
            quality,
            from_cache: false,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Scripted extractor. Downloads write a small file at the template path.
    pub struct ScriptedExtractor {
        pub info: Mutex<Option<Result<ExtendedVideoInfo, String>>>,
        pub download_error: Option<String>,
        pub downloads: Mutex<Vec<DownloadSpec>>,
        pub configs: Mutex<Vec<ExtractorConfig>>,
    }

    impl ScriptedExtractor {
        pub fn new(info: ExtendedVideoInfo) -> Self {
            Self {
                info: Mutex::new(Some(Ok(info))),
                download_error: None,
                downloads: Mutex::new(Vec::new()),
                configs: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(stderr: &str) -> Self {
            Self {
                info: Mutex::new(Some(Err(stderr.to_string()))),
                download_error: Some(stderr.to_string()),
                downloads: Mutex::new(Vec::new()),
                configs: Mutex::new(Vec::new()),
            }
        }

        pub fn download_count(&self) -> usize {
            self.downloads.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl InfoExtractor for ScriptedExtractor {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn extract_info(
            &self,
            _url: &str,
            config: &ExtractorConfig,
        ) -> Result<ExtendedVideoInfo, DownloadError> {
            self.configs.lock().unwrap().push(config.clone());
            let scripted = self.info.lock().unwrap().clone();
            match scripted {
                Some(Ok(info)) => Ok(info),
                Some(Err(stderr)) => Err(DownloadError::ExtractionFailed(stderr)),
                None => Err(DownloadError::ExtractionFailed("no script".into())),
            }
        }

        async fn download(
            &self,
            _url: &str,
            config: &ExtractorConfig,
            spec: &DownloadSpec,
        ) -> Result<PathBuf, DownloadError> {
            self.configs.lock().unwrap().push(config.clone());
            self.downloads.lock().unwrap().push(spec.clone());
            if let Some(stderr) = &self.download_error {
                return Err(DownloadError::ExtractionFailed(stderr.clone()));
            }
            let ext = if spec
                .postprocessors
                .iter()
                .any(|pp| matches!(pp, PostProcessor::ExtractAudio { .. }))
            {
                "mp3"
            } else {
                "mp4"
            };
            let path = PathBuf::from(spec.output_template.replace("%(ext)s", ext));
            std::fs::write(&path, b"video bytes").unwrap();
            Ok(path)
        }
    }

    pub fn sample_info() -> ExtendedVideoInfo {
        use crate::downloader::extractors::ExtendedFormat;

        let format = |id: &str, height: u32, tbr: f32| ExtendedFormat {
            format_id: id.to_string(),
            ext: "mp4".to_string(),
            height: Some(height),
            vcodec: Some("avc1".to_string()),
            acodec: Some("mp4a".to_string()),
            tbr: Some(tbr),
            ..Default::default()
        };

        ExtendedVideoInfo {
            id: "dQw4w9WgXcQ".to_string(),
            title: Some("Sample".to_string()),
            uploader: Some("Uploader".to_string()),
            duration_seconds: Some(212),
            thumbnail: Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hq.jpg".to_string()),
            webpage_url: None,
            formats: vec![
                format("137", 1080, 4400.0),
                format("22", 720, 1500.0),
                format("136", 720, 900.0),
                format("x", 540, 700.0),
                format("18", 360, 500.0),
            ],
        }
    }
}
