use lazy_static::lazy_static;
use regex::Regex;

use super::{has_platform_domain, PlatformBackend, PostProcessing};
use crate::downloader::extractors::{ExtendedVideoInfo, PostProcessor};
use crate::downloader::format_selector::QualityOption;
use crate::downloader::platform::PlatformId;
use crate::downloader::quality::QualitySpec;

lazy_static! {
    static ref VIDEO_RE: Regex = Regex::new(r"tiktok\.com/@[^/]+/video/\d+").unwrap();
    static ref SHORT_LINK_RE: Regex = Regex::new(r"vm\.tiktok\.com/\w+").unwrap();
    static ref VIDEO_ID_RE: Regex = Regex::new(r"/video/(\d+)").unwrap();
}

/// Single-tier platform: every quality narrows to `best`.
pub struct TikTokBackend;

impl PlatformBackend for TikTokBackend {
    fn platform(&self) -> PlatformId {
        PlatformId::TikTok
    }

    fn validate_url(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        has_platform_domain(self.platform(), url)
            && (VIDEO_RE.is_match(&lower) || SHORT_LINK_RE.is_match(&lower))
    }

    /// Short links carry no id and embed as-is.
    fn embed_url(&self, url: &str, _info: &ExtendedVideoInfo) -> String {
        match VIDEO_ID_RE.captures(url).and_then(|caps| caps.get(1)) {
            Some(id) => format!("https://www.tiktok.com/embed/v2/{}", id.as_str()),
            None => url.to_string(),
        }
    }

    fn quality_options(&self, _info: &ExtendedVideoInfo) -> Vec<QualityOption> {
        vec![QualityOption::best()]
    }

    fn postprocessing(&self, _quality: QualitySpec) -> PostProcessing {
        (vec![PostProcessor::mp4()], None)
    }
}
