use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use video_downloader_lib::config::{AppConfig, UnknownPlatformPolicy};
use video_downloader_lib::downloader::{Dispatcher, DownloadError, QualitySpec};

#[derive(Parser, Debug)]
#[command(name = "video-downloader", version, about = "Preview and fetch videos through a local cache")]
struct Cli {
    /// Cache directory
    #[arg(long, env = "VD_CACHE_DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// Path to yt-dlp
    #[arg(long, env = "VD_YTDLP_PATH", global = true)]
    ytdlp: Option<PathBuf>,

    /// Path to ffmpeg
    #[arg(long, env = "VD_FFMPEG_PATH", global = true)]
    ffmpeg: Option<PathBuf>,

    #[arg(long, env = "VD_PROXY", global = true)]
    proxy: Option<String>,

    /// What to do with URLs no platform claims (reject, youtube)
    #[arg(long, env = "VD_UNKNOWN_PLATFORM", global = true)]
    unknown_platform: Option<UnknownPlatformPolicy>,

    /// Always download, even when a fresh cached file exists
    #[arg(long, global = true)]
    no_reuse: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print metadata and quality options for a URL
    Preview {
        url: String,
        /// Platform hint (auto, youtube, facebook, tiktok)
        #[arg(long)]
        platform: Option<String>,
        /// Netscape cookies.txt
        #[arg(long)]
        cookies: Option<PathBuf>,
    },
    /// Download into the cache and print the file path
    Fetch {
        url: String,
        /// best, original, audio or a height such as 720
        #[arg(long, short, default_value = "best")]
        quality: String,
        #[arg(long)]
        platform: Option<String>,
        #[arg(long)]
        cookies: Option<PathBuf>,
    },
    /// Remove expired entries and enforce the size cap
    Evict,
    /// Remove every cached file
    Clear,
    /// Number of cached files and their total size
    Stats,
    /// Versions of yt-dlp and ffmpeg
    Tools,
}

impl Cli {
    fn app_config(&self) -> AppConfig {
        let mut config = AppConfig::from_env();
        if let Some(dir) = &self.cache_dir {
            config = config.with_cache_dir(dir.clone());
        }
        if self.ytdlp.is_some() {
            config = config.with_ytdlp_path(self.ytdlp.clone());
        }
        if self.ffmpeg.is_some() {
            config = config.with_ffmpeg_path(self.ffmpeg.clone());
        }
        if self.proxy.is_some() {
            config = config.with_proxy(self.proxy.clone());
        }
        if let Some(policy) = self.unknown_platform {
            config = config.with_unknown_platform(policy);
        }
        if self.no_reuse {
            config = config.with_reuse_cached(false);
        }
        config
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

async fn run(cli: Cli) -> Result<Value, DownloadError> {
    let config = cli.app_config();

    match cli.command {
        Command::Tools => {
            let tools = config.tool_manager().get_all_tools().await;
            Ok(to_json(&tools))
        }
        Command::Stats => {
            let stats = config.cache_manager().stats().await?;
            Ok(to_json(&stats))
        }
        Command::Evict => {
            let report = config.cache_manager().evict_expired().await;
            Ok(to_json(&report))
        }
        Command::Clear => {
            let report = config.cache_manager().clear_all().await?;
            Ok(to_json(&report))
        }
        Command::Preview {
            url,
            platform,
            cookies,
        } => {
            let dispatcher = Dispatcher::from_config(config).await;
            let metadata = dispatcher
                .preview(&url, platform.as_deref(), cookies.as_deref())
                .await?;
            Ok(to_json(&metadata))
        }
        Command::Fetch {
            url,
            quality,
            platform,
            cookies,
        } => {
            let dispatcher = Dispatcher::from_config(config).await;
            let fetched = dispatcher
                .fetch(
                    &url,
                    platform.as_deref(),
                    QualitySpec::parse(&quality),
                    cookies.as_deref(),
                )
                .await?;
            Ok(to_json(&fetched))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries JSON only
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let (output, code) = match run(cli).await {
        Ok(value) => (value, ExitCode::SUCCESS),
        Err(e) => {
            tracing::error!(kind = e.kind().as_str(), "{}", e);
            (to_json(&e.to_response()), ExitCode::FAILURE)
        }
    };

    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to encode output: {}", e),
    }
    code
}
