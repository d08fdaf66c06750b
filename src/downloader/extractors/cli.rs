// CLI InfoExtractor - drives the native `yt-dlp` binary
//
// Metadata comes from `--dump-json`; downloads print the final path via
// `--print after_move:filepath` so post-processed names are reported exactly.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::traits::{
    DownloadSpec, ExtendedFormat, ExtendedVideoInfo, ExtractorConfig, InfoExtractor, PostProcessor,
};
use crate::downloader::errors::DownloadError;
use crate::downloader::utils::run_output_with_timeout;

/// CLI-based info extractor using yt-dlp binary
pub struct CliInfoExtractor {
    ytdlp_path: PathBuf,
}

impl CliInfoExtractor {
    pub fn new(ytdlp_path: impl Into<PathBuf>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.ytdlp_path
    }

    /// Flags shared by metadata and download runs
    fn common_args(config: &ExtractorConfig) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            config.socket_timeout_seconds.to_string(),
            "--retries".to_string(),
            config.retries.to_string(),
            "--fragment-retries".to_string(),
            config.fragment_retries.to_string(),
            "--user-agent".to_string(),
            config.user_agent.clone(),
        ];

        // Player client for YouTube
        if !config.player_clients.is_empty() {
            args.push("--extractor-args".to_string());
            args.push(format!(
                "youtube:player_client={}",
                config.player_clients.join(",")
            ));
        }

        if config.geo_bypass {
            args.push("--geo-bypass".to_string());
        }

        // Cookies
        if let Some(path) = &config.cookies_path {
            args.push("--cookies".to_string());
            args.push(path.display().to_string());
        }

        // Proxy
        if let Some(proxy) = &config.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args
    }

    fn build_info_args(url: &str, config: &ExtractorConfig) -> Vec<String> {
        let mut args = vec!["--dump-json".to_string(), "--skip-download".to_string()];
        args.extend(Self::common_args(config));
        args.push(url.to_string());
        args
    }

    fn build_download_args(url: &str, config: &ExtractorConfig, spec: &DownloadSpec) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            spec.format.as_str().to_string(),
            "-o".to_string(),
            spec.output_template.clone(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "--no-simulate".to_string(),
            "--no-progress".to_string(),
        ];
        args.extend(Self::common_args(config));

        if let Some(container) = &spec.merge_output_format {
            args.push("--merge-output-format".to_string());
            args.push(container.clone());
        }

        for pp in &spec.postprocessors {
            match pp {
                PostProcessor::ExtractAudio { codec, quality } => {
                    args.push("-x".to_string());
                    args.push("--audio-format".to_string());
                    args.push(codec.clone());
                    args.push("--audio-quality".to_string());
                    args.push(format!("{}K", quality));
                }
                PostProcessor::ConvertVideo { format } => {
                    args.push("--recode-video".to_string());
                    args.push(format.clone());
                }
            }
        }

        args.push(url.to_string());
        args
    }

    fn parse_json(stdout: &[u8]) -> Result<ExtendedVideoInfo, DownloadError> {
        let json_str = String::from_utf8_lossy(stdout);
        let json: serde_json::Value = serde_json::from_str(json_str.trim())
            .map_err(|e| DownloadError::ExtractionFailed(format!("Invalid JSON: {}", e)))?;

        let text = |key: &str| json[key].as_str().map(str::to_string);

        Ok(ExtendedVideoInfo {
            id: text("id").unwrap_or_default(),
            title: text("title"),
            uploader: text("uploader"),
            duration_seconds: json["duration"].as_f64().map(|d| d.max(0.0) as u64),
            thumbnail: text("thumbnail"),
            webpage_url: text("webpage_url"),
            formats: Self::parse_formats(&json),
        })
    }

    /// Missing `formats` array yields an empty list (single-file sites)
    fn parse_formats(json: &serde_json::Value) -> Vec<ExtendedFormat> {
        let Some(formats_array) = json["formats"].as_array() else {
            return Vec::new();
        };

        formats_array
            .iter()
            .map(|f| ExtendedFormat {
                format_id: f["format_id"].as_str().unwrap_or("").to_string(),
                ext: f["ext"].as_str().unwrap_or("").to_string(),
                width: f["width"].as_u64().map(|w| w as u32),
                height: f["height"].as_u64().map(|h| h as u32),
                fps: f["fps"].as_f64().map(|fps| fps as f32),
                vcodec: f["vcodec"].as_str().map(|s| s.to_string()),
                acodec: f["acodec"].as_str().map(|s| s.to_string()),
                filesize: f["filesize"].as_u64().or_else(|| f["filesize_approx"].as_u64()),
                tbr: f["tbr"].as_f64().map(|t| t as f32),
                format_note: f["format_note"].as_str().map(|s| s.to_string()),
            })
            .collect()
    }

    /// Last non-empty stdout line is the `after_move:filepath` print
    fn parse_filepath(stdout: &[u8]) -> Result<PathBuf, DownloadError> {
        String::from_utf8_lossy(stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .map(PathBuf::from)
            .ok_or_else(|| {
                DownloadError::ExtractionFailed("yt-dlp did not report an output file".to_string())
            })
    }

    async fn run(
        &self,
        args: Vec<String>,
        config: &ExtractorConfig,
    ) -> Result<Vec<u8>, DownloadError> {
        tracing::debug!(
            "[CliExtractor] {} {}",
            self.ytdlp_path.display(),
            args.join(" ")
        );

        let out =
            run_output_with_timeout(&self.ytdlp_path, &args, config.process_timeout_seconds).await?;

        if out.status.success() {
            Ok(out.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&out.stderr).to_string();
            tracing::debug!(status = ?out.status.code(), "[CliExtractor] yt-dlp failed: {}", stderr.trim());
            Err(DownloadError::ExtractionFailed(stderr))
        }
    }
}

impl Default for CliInfoExtractor {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl InfoExtractor for CliInfoExtractor {
    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.ytdlp_path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    async fn extract_info(
        &self,
        url: &str,
        config: &ExtractorConfig,
    ) -> Result<ExtendedVideoInfo, DownloadError> {
        let stdout = self.run(Self::build_info_args(url, config), config).await?;
        Self::parse_json(&stdout)
    }

    async fn download(
        &self,
        url: &str,
        config: &ExtractorConfig,
        spec: &DownloadSpec,
    ) -> Result<PathBuf, DownloadError> {
        let stdout = self
            .run(Self::build_download_args(url, config, spec), config)
            .await?;
        Self::parse_filepath(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::format_selector::FormatExpression;

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn info_args_skip_download() {
        let config = ExtractorConfig::default()
            .with_player_clients(&["android", "web"])
            .with_geo_bypass(true)
            .with_proxy(Some("socks5://127.0.0.1:1080".into()));
        let args = CliInfoExtractor::build_info_args("https://youtu.be/dQw4w9WgXcQ", &config);

        assert!(args.contains(&"--dump-json".to_string()));
        assert!(args.contains(&"--skip-download".to_string()));
        assert!(args.contains(&"--geo-bypass".to_string()));
        assert!(has_pair(&args, "--extractor-args", "youtube:player_client=android,web"));
        assert!(has_pair(&args, "--proxy", "socks5://127.0.0.1:1080"));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/dQw4w9WgXcQ"));
    }

    #[test]
    fn download_args_carry_postprocessors() {
        let spec = DownloadSpec {
            format: FormatExpression::new("bestaudio/best"),
            output_template: "/cache/abc.%(ext)s".into(),
            postprocessors: vec![PostProcessor::mp3()],
            merge_output_format: None,
        };
        let args = CliInfoExtractor::build_download_args(
            "https://youtu.be/x",
            &ExtractorConfig::default().with_retries(5, 10),
            &spec,
        );

        assert!(has_pair(&args, "-f", "bestaudio/best"));
        assert!(has_pair(&args, "-o", "/cache/abc.%(ext)s"));
        assert!(has_pair(&args, "--print", "after_move:filepath"));
        assert!(has_pair(&args, "--audio-format", "mp3"));
        assert!(has_pair(&args, "--audio-quality", "192K"));
        assert!(has_pair(&args, "--retries", "5"));
        assert!(has_pair(&args, "--fragment-retries", "10"));
        assert!(!args.contains(&"--merge-output-format".to_string()));
        assert!(!args.contains(&"--extractor-args".to_string()));
    }

    #[test]
    fn parses_dump_json() {
        let json = br#"{"id":"abc","title":"Clip","duration":12.7,"uploader":"me",
            "formats":[{"format_id":"22","ext":"mp4","height":720,"tbr":1500.5,
            "vcodec":"avc1","acodec":"mp4a"},{"format_id":"140","ext":"m4a","vcodec":"none"}]}"#;
        let info = CliInfoExtractor::parse_json(json).unwrap();

        assert_eq!(info.id, "abc");
        assert_eq!(info.title.as_deref(), Some("Clip"));
        assert_eq!(info.duration_seconds, Some(12));
        assert!(info.thumbnail.is_none());
        assert_eq!(info.formats.len(), 2);
        assert_eq!(info.formats[0].height, Some(720));
        assert!(!info.formats[1].has_video());
    }

    #[test]
    fn invalid_json_is_extraction_failure() {
        let err = CliInfoExtractor::parse_json(b"not json").unwrap_err();
        assert_eq!(err.kind(), crate::downloader::errors::ErrorKind::ExtractionFailed);
    }

    #[test]
    fn filepath_is_last_printed_line() {
        let out = b"/cache/abc.webm\n/cache/abc.mp4\n\n";
        assert_eq!(
            CliInfoExtractor::parse_filepath(out).unwrap(),
            PathBuf::from("/cache/abc.mp4")
        );
        assert!(CliInfoExtractor::parse_filepath(b"  \n").is_err());
    }
}
