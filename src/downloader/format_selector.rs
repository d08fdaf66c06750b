// FormatSelector - maps (platform, quality, muxer) to a yt-dlp selector
//
// Also builds the quality options shown on the preview page from the formats
// yt-dlp reports.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::extractors::ExtendedFormat;
use super::platform::{is_youtube_short, PlatformId};
use super::quality::QualitySpec;

/// Combined-stream format ids YouTube keeps serving for shorts
const YOUTUBE_SHORTS_PREFIX: &str = "22/18/136+140";
const YOUTUBE_SHORTS_PREFIX_PREMUXED: &str = "22/18";
/// Height of YouTube's 720p MP4 (video+audio), format id 22
const YOUTUBE_COMBINED_HEIGHT: u32 = 720;
const YOUTUBE_COMBINED_ID: &str = "22";

/// Opaque `-f` selector handed to yt-dlp
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatExpression(String);

impl FormatExpression {
    pub fn new(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when some alternative needs separate video and audio streams merged
    pub fn requests_separate_streams(&self) -> bool {
        self.0.contains('+')
    }
}

impl fmt::Display for FormatExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Quality option for the preview page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityOption {
    /// Value sent back on fetch (e.g. "best", "720", "audio")
    pub value: String,
    /// Display label (e.g. "720p (1200kbps)")
    pub label: String,
}

impl QualityOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    pub fn best() -> Self {
        Self::new("best", "Best (highest available)")
    }

    pub fn original() -> Self {
        Self::new("original", "Original format (no conversion)")
    }

    pub fn audio() -> Self {
        Self::new("audio", "Audio only (MP3)")
    }
}

/// Format selector; stateless.
pub struct FormatSelector;

impl FormatSelector {
    /// Selector for a platform and quality, without URL-specific overrides
    pub fn select(
        platform: PlatformId,
        quality: QualitySpec,
        muxer_available: bool,
    ) -> FormatExpression {
        let quality = Self::narrow(platform, quality);
        match (platform, quality) {
            (PlatformId::YouTube, QualitySpec::Height(YOUTUBE_COMBINED_HEIGHT)) => {
                let generic = Self::generic(quality, muxer_available);
                FormatExpression::new(format!("{}/{}", YOUTUBE_COMBINED_ID, generic))
            }
            _ => Self::generic(quality, muxer_available),
        }
    }

    /// Selector for a concrete URL. Applies the YouTube shorts override.
    pub fn select_for_url(
        platform: PlatformId,
        url: &str,
        quality: QualitySpec,
        muxer_available: bool,
    ) -> FormatExpression {
        let shorts_quality = matches!(
            quality,
            QualitySpec::Best | QualitySpec::Height(YOUTUBE_COMBINED_HEIGHT)
        );
        if platform == PlatformId::YouTube && shorts_quality && is_youtube_short(url) {
            return Self::youtube_shorts(muxer_available);
        }
        Self::select(platform, quality, muxer_available)
    }

    /// Platform-level quality narrowing. TikTok only has one tier.
    pub fn narrow(platform: PlatformId, quality: QualitySpec) -> QualitySpec {
        match platform {
            PlatformId::TikTok => QualitySpec::Best,
            PlatformId::YouTube | PlatformId::Facebook | PlatformId::Unknown => quality,
        }
    }

    fn generic(quality: QualitySpec, muxer_available: bool) -> FormatExpression {
        let expression = match (quality, muxer_available) {
            (QualitySpec::Best | QualitySpec::Original, true) => "bestvideo+bestaudio/best".to_string(),
            // Separate streams cannot be joined without a muxer
            (QualitySpec::Best | QualitySpec::Original, false) => "best[ext=mp4]/best".to_string(),
            (QualitySpec::Audio, true) => "bestaudio/best".to_string(),
            (QualitySpec::Audio, false) => "worstaudio/worst".to_string(),
            (QualitySpec::Height(h), true) => {
                format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]/best")
            }
            (QualitySpec::Height(h), false) => {
                format!("best[height<={h}][ext=mp4]/best[height<={h}]/best")
            }
        };
        FormatExpression::new(expression)
    }

    fn youtube_shorts(muxer_available: bool) -> FormatExpression {
        let h = YOUTUBE_COMBINED_HEIGHT;
        if muxer_available {
            FormatExpression::new(format!(
                "{YOUTUBE_SHORTS_PREFIX}/bestvideo[height<={h}]+bestaudio/best[height<={h}]/best"
            ))
        } else {
            FormatExpression::new(format!(
                "{YOUTUBE_SHORTS_PREFIX_PREMUXED}/best[height<={h}][ext=mp4]/best[height<={h}]/best"
            ))
        }
    }

    /// Build quality options from raw formats.
    ///
    /// Formats are grouped by height and the highest-bitrate one represents
    /// each group. Heights listed in `standard_heights` are always offered;
    /// with `limit > 0`, other heights are offered while fewer than `limit`
    /// options exist. A synthetic "best" option goes first.
    pub fn build_quality_options(
        formats: &[ExtendedFormat],
        standard_heights: &[u32],
        limit: usize,
    ) -> Vec<QualityOption> {
        let mut best_per_height: BTreeMap<u32, &ExtendedFormat> = BTreeMap::new();

        for fmt in formats.iter().filter(|f| f.has_video()) {
            let Some(height) = fmt.height.filter(|h| *h > 0) else {
                continue;
            };
            best_per_height
                .entry(height)
                .and_modify(|current| {
                    if fmt.tbr.unwrap_or(0.0) > current.tbr.unwrap_or(0.0) {
                        *current = fmt;
                    }
                })
                .or_insert(fmt);
        }

        let mut options = vec![QualityOption::best()];
        let mut listed = 0usize;

        for (height, fmt) in best_per_height.iter().rev() {
            if standard_heights.contains(height) || (limit > 0 && listed < limit) {
                options.push(QualityOption::new(
                    height.to_string(),
                    Self::height_label(*height, fmt.tbr),
                ));
                listed += 1;
            }
        }

        options
    }

    fn height_label(height: u32, tbr: Option<f32>) -> String {
        match tbr.filter(|b| *b > 0.0) {
            Some(bitrate) => format!("{}p ({}kbps)", height, bitrate as u32),
            None => format!("{}p", height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_video_format(height: u32, tbr: f32) -> ExtendedFormat {
        ExtendedFormat {
            format_id: format!("{}-{}", height, tbr),
            ext: "mp4".to_string(),
            width: Some(height * 16 / 9),
            height: Some(height),
            vcodec: Some("avc1.4d401f".to_string()),
            acodec: Some("none".to_string()),
            tbr: Some(tbr),
            ..Default::default()
        }
    }

    fn make_audio_format(tbr: f32) -> ExtendedFormat {
        ExtendedFormat {
            format_id: "140".to_string(),
            ext: "m4a".to_string(),
            vcodec: Some("none".to_string()),
            acodec: Some("mp4a.40.2".to_string()),
            tbr: Some(tbr),
            ..Default::default()
        }
    }

    #[test]
    fn best_without_muxer_is_single_stream() {
        for platform in [
            PlatformId::YouTube,
            PlatformId::Facebook,
            PlatformId::TikTok,
            PlatformId::Unknown,
        ] {
            let expr = FormatSelector::select(platform, QualitySpec::Best, false);
            assert!(!expr.requests_separate_streams(), "{platform}: {expr}");
            assert_eq!(expr.as_str(), "best[ext=mp4]/best");
        }
    }

    #[test]
    fn generic_policy_table() {
        let fb = PlatformId::Facebook;
        assert_eq!(
            FormatSelector::select(fb, QualitySpec::Best, true).as_str(),
            "bestvideo+bestaudio/best"
        );
        assert_eq!(
            FormatSelector::select(fb, QualitySpec::Original, true).as_str(),
            "bestvideo+bestaudio/best"
        );
        assert_eq!(
            FormatSelector::select(fb, QualitySpec::Audio, true).as_str(),
            "bestaudio/best"
        );
        assert_eq!(
            FormatSelector::select(fb, QualitySpec::Audio, false).as_str(),
            "worstaudio/worst"
        );
        assert_eq!(
            FormatSelector::select(fb, QualitySpec::Height(480), true).as_str(),
            "bestvideo[height<=480]+bestaudio/best[height<=480]/best"
        );
        let capped = FormatSelector::select(fb, QualitySpec::Height(480), false);
        assert_eq!(capped.as_str(), "best[height<=480][ext=mp4]/best[height<=480]/best");
        assert!(!capped.requests_separate_streams());
    }

    #[test]
    fn invalid_quality_uses_best_policy() {
        let expr = FormatSelector::select(PlatformId::Facebook, QualitySpec::parse("garbage"), true);
        assert_eq!(expr, FormatSelector::select(PlatformId::Facebook, QualitySpec::Best, true));
    }

    #[test]
    fn tiktok_has_one_tier() {
        for quality in [QualitySpec::Audio, QualitySpec::Height(360), QualitySpec::Original] {
            assert_eq!(
                FormatSelector::select(PlatformId::TikTok, quality, true),
                FormatSelector::select(PlatformId::TikTok, QualitySpec::Best, true)
            );
        }
    }

    #[test]
    fn youtube_shorts_override() {
        let url = "https://www.youtube.com/shorts/abcdefghijk";
        let expr = FormatSelector::select_for_url(PlatformId::YouTube, url, QualitySpec::Best, true);
        assert!(expr.as_str().starts_with("22/18/136+140/"));
        assert!(expr.as_str().ends_with("best[height<=720]/best"));

        let premuxed =
            FormatSelector::select_for_url(PlatformId::YouTube, url, QualitySpec::Best, false);
        assert!(premuxed.as_str().starts_with("22/18/"));
        assert!(!premuxed.requests_separate_streams());

        // Audio on a short keeps the generic policy
        let audio = FormatSelector::select_for_url(PlatformId::YouTube, url, QualitySpec::Audio, true);
        assert_eq!(audio.as_str(), "bestaudio/best");
    }

    #[test]
    fn youtube_720_prefers_combined_id() {
        let url = "https://www.youtube.com/watch?v=abcdefghijk";
        let expr =
            FormatSelector::select_for_url(PlatformId::YouTube, url, QualitySpec::Height(720), true);
        assert_eq!(
            expr.as_str(),
            "22/bestvideo[height<=720]+bestaudio/best[height<=720]/best"
        );
    }

    #[test]
    fn quality_options_group_by_height() {
        let formats = vec![
            make_video_format(1080, 2500.0),
            make_video_format(1080, 4400.0),
            make_video_format(720, 1200.0),
            make_video_format(144, 80.0),
            make_audio_format(128.0),
        ];

        let options = FormatSelector::build_quality_options(&formats, &[1080, 720, 480, 360], 0);

        assert_eq!(options[0], QualityOption::best());
        assert_eq!(options.len(), 3);
        assert_eq!(options[1], QualityOption::new("1080", "1080p (4400kbps)"));
        assert_eq!(options[2], QualityOption::new("720", "720p (1200kbps)"));
    }

    #[test]
    fn quality_options_limit_admits_nonstandard_heights() {
        let formats = vec![
            make_video_format(1080, 2500.0),
            make_video_format(540, 900.0),
            make_video_format(144, 0.0),
        ];

        let options = FormatSelector::build_quality_options(&formats, &[1080, 720], 6);
        let values: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, ["best", "1080", "540", "144"]);
        assert_eq!(options[3].label, "144p");
    }

    #[test]
    fn quality_options_without_formats() {
        let options = FormatSelector::build_quality_options(&[], &[720], 6);
        assert_eq!(options, vec![QualityOption::best()]);
    }
}
