use lazy_static::lazy_static;
use regex::Regex;

use super::{has_platform_domain, PlatformBackend, PostProcessing};
use crate::downloader::extractors::{ExtendedVideoInfo, ExtractorConfig, PostProcessor};
use crate::downloader::format_selector::{FormatSelector, QualityOption};
use crate::downloader::platform::PlatformId;
use crate::downloader::quality::QualitySpec;

const STANDARD_HEIGHTS: &[u32] = &[1080, 720, 480, 360];
const MAX_OPTIONS: usize = 6;

lazy_static! {
    static ref VIDEO_PATTERNS: Vec<Regex> = [
        r"facebook\.com/.*/videos/",
        r"facebook\.com/watch\?v=",
        r"fb\.watch/",
        r"facebook\.com/.*/posts/",
        r"facebook\.com/reel/",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();
}

pub struct FacebookBackend;

impl PlatformBackend for FacebookBackend {
    fn platform(&self) -> PlatformId {
        PlatformId::Facebook
    }

    fn validate_url(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        has_platform_domain(self.platform(), url) && VIDEO_PATTERNS.iter().any(|re| re.is_match(&lower))
    }

    fn embed_url(&self, url: &str, _info: &ExtendedVideoInfo) -> String {
        format!(
            "https://www.facebook.com/plugins/video.php?href={}",
            urlencoding::encode(url)
        )
    }

    fn quality_options(&self, info: &ExtendedVideoInfo) -> Vec<QualityOption> {
        FormatSelector::build_quality_options(&info.formats, STANDARD_HEIGHTS, MAX_OPTIONS)
    }

    fn tune(&self, config: ExtractorConfig) -> ExtractorConfig {
        config.with_retries(5, 10)
    }

    fn postprocessing(&self, quality: QualitySpec) -> PostProcessing {
        match quality {
            QualitySpec::Audio => (vec![PostProcessor::mp3()], None),
            QualitySpec::Original => (Vec::new(), None),
            _ => (vec![PostProcessor::mp4()], Some("mp4".to_string())),
        }
    }
}
