use lazy_static::lazy_static;
use regex::Regex;

use super::{has_platform_domain, PlatformBackend, PostProcessing};
use crate::downloader::extractors::{ExtendedVideoInfo, ExtractorConfig, PostProcessor};
use crate::downloader::format_selector::{FormatSelector, QualityOption};
use crate::downloader::platform::{is_youtube_short, PlatformId};
use crate::downloader::quality::QualitySpec;

const STANDARD_HEIGHTS: &[u32] = &[2160, 1440, 1080, 720, 480, 360];

lazy_static! {
    // Only video paths: watch?v=, youtu.be/, /shorts/, /embed/ and /live/
    static ref VIDEO_ID_RE: Regex = Regex::new(
        r"(?i:youtube\.com/(?:watch\?(?:[^#]*&)?v=|shorts/|embed/|live/)|youtu\.be/)([0-9A-Za-z_-]{11})(?:[^0-9A-Za-z_-]|$)"
    )
    .unwrap();
}

pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub struct YouTubeBackend;

impl PlatformBackend for YouTubeBackend {
    fn platform(&self) -> PlatformId {
        PlatformId::YouTube
    }

    fn validate_url(&self, url: &str) -> bool {
        has_platform_domain(self.platform(), url) && extract_video_id(url).is_some()
    }

    fn embed_url(&self, url: &str, info: &ExtendedVideoInfo) -> String {
        let id = extract_video_id(url).unwrap_or_else(|| info.id.clone());
        if is_youtube_short(url) {
            format!("https://www.youtube.com/shorts/{}", id)
        } else {
            format!("https://www.youtube.com/embed/{}", id)
        }
    }

    fn quality_options(&self, info: &ExtendedVideoInfo) -> Vec<QualityOption> {
        let mut options = FormatSelector::build_quality_options(&info.formats, STANDARD_HEIGHTS, 0);
        options.insert(1, QualityOption::original());
        options.push(QualityOption::audio());
        options
    }

    fn tune(&self, config: ExtractorConfig) -> ExtractorConfig {
        config
            .with_player_clients(&["android", "web"])
            .with_geo_bypass(true)
    }

    fn postprocessing(&self, quality: QualitySpec) -> PostProcessing {
        match quality {
            QualitySpec::Audio => (vec![PostProcessor::mp3()], None),
            // Keep the source container
            QualitySpec::Original => (Vec::new(), None),
            QualitySpec::Best | QualitySpec::Height(_) => {
                (vec![PostProcessor::mp4()], Some("mp4".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::backends::testing::sample_info;

    #[test]
    fn validates_video_urls() {
        let backend = YouTubeBackend;
        assert!(backend.validate_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(backend.validate_url("https://youtu.be/dQw4w9WgXcQ?t=10"));
        assert!(backend.validate_url("https://m.youtube.com/shorts/abcdefghijk"));
        assert!(!backend.validate_url("https://www.youtube.com/feed/trending"));
        assert!(!backend.validate_url("https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv"));
        assert!(!backend.validate_url("https://www.youtube.com/@somebody/videos"));
        assert!(backend.validate_url("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ"));
        assert!(backend.validate_url("https://www.youtube.com/live/dQw4w9WgXcQ?si=abc"));
        assert!(!backend.validate_url("https://vimeo.com/watch?v=dQw4w9WgXcQ"));
    }

    #[test]
    fn embed_urls() {
        let backend = YouTubeBackend;
        let info = sample_info();
        assert_eq!(
            backend.embed_url("https://youtu.be/dQw4w9WgXcQ", &info),
            "https://www.youtube.com/embed/dQw4w9WgXcQ"
        );
        assert_eq!(
            backend.embed_url("https://www.youtube.com/shorts/abcdefghijk", &info),
            "https://www.youtube.com/shorts/abcdefghijk"
        );
    }

    #[test]
    fn options_bracket_heights_with_original_and_audio() {
        let values: Vec<String> = YouTubeBackend
            .quality_options(&sample_info())
            .into_iter()
            .map(|q| q.value)
            .collect();
        // 540 is not a standard height
        assert_eq!(values, ["best", "original", "1080", "720", "360", "audio"]);
    }

    #[test]
    fn postprocessing_per_quality() {
        let backend = YouTubeBackend;
        assert_eq!(backend.postprocessing(QualitySpec::Audio).0, vec![PostProcessor::mp3()]);
        assert_eq!(backend.postprocessing(QualitySpec::Original), (Vec::new(), None));
        assert_eq!(
            backend.postprocessing(QualitySpec::Height(480)),
            (vec![PostProcessor::mp4()], Some("mp4".to_string()))
        );
    }
}
