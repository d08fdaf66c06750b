use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::downloader::cache::CacheManager;
use crate::downloader::extractors::{ExtractorConfig, DEFAULT_USER_AGENT};
use crate::downloader::tools::ToolManager;

pub const DEFAULT_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_CACHE_MAX_BYTES: u64 = 2 * 1024 * 1024 * 1024;
pub const DEFAULT_SOCKET_TIMEOUT_SECS: u32 = 30;
pub const DEFAULT_RETRIES: u32 = 3;

/// What to do with URLs no platform claims
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownPlatformPolicy {
    #[default]
    Reject,
    /// Hand the URL to the YouTube backend
    YouTube,
}

impl FromStr for UnknownPlatformPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "youtube" => Ok(Self::YouTube),
            other => Err(format!("unknown platform policy: {}", other)),
        }
    }
}

impl fmt::Display for UnknownPlatformPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reject => f.write_str("reject"),
            Self::YouTube => f.write_str("youtube"),
        }
    }
}

/// Runtime configuration handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cache_dir: PathBuf,
    pub cache_ttl_secs: u64,
    /// `None` disables the size cap
    pub cache_max_bytes: Option<u64>,
    pub cookie_file: Option<PathBuf>,
    pub ytdlp_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    pub user_agent: String,
    pub socket_timeout_secs: u32,
    pub retries: u32,
    pub process_timeout_secs: Option<u64>,
    pub proxy: Option<String>,
    pub unknown_platform: UnknownPlatformPolicy,
    /// Serve a fresh cached file instead of downloading again
    pub reuse_cached: bool,
}

pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("video-downloader"))
        .unwrap_or_else(|| PathBuf::from("cache"))
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            cache_max_bytes: Some(DEFAULT_CACHE_MAX_BYTES),
            cookie_file: None,
            ytdlp_path: None,
            ffmpeg_path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            socket_timeout_secs: DEFAULT_SOCKET_TIMEOUT_SECS,
            retries: DEFAULT_RETRIES,
            process_timeout_secs: None,
            proxy: None,
            unknown_platform: UnknownPlatformPolicy::Reject,
            reuse_cached: true,
        }
    }
}

impl AppConfig {
    /// Defaults overridden by `VD_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(env_var_string)
    }

    /// Unparseable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|value| value.parse::<u64>().ok());

        Self {
            cache_dir: lookup("VD_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            cache_ttl_secs: parsed("VD_CACHE_TTL_SECS").unwrap_or(defaults.cache_ttl_secs),
            cache_max_bytes: match parsed("VD_CACHE_MAX_BYTES") {
                Some(0) => None,
                Some(bytes) => Some(bytes),
                None => defaults.cache_max_bytes,
            },
            cookie_file: lookup("VD_COOKIE_FILE").map(PathBuf::from),
            ytdlp_path: lookup("VD_YTDLP_PATH").map(PathBuf::from),
            ffmpeg_path: lookup("VD_FFMPEG_PATH").map(PathBuf::from),
            user_agent: lookup("VD_USER_AGENT").unwrap_or(defaults.user_agent),
            socket_timeout_secs: lookup("VD_SOCKET_TIMEOUT_SECS")
                .and_then(|value| value.parse::<u32>().ok())
                .unwrap_or(defaults.socket_timeout_secs),
            retries: lookup("VD_RETRIES")
                .and_then(|value| value.parse::<u32>().ok())
                .unwrap_or(defaults.retries),
            process_timeout_secs: parsed("VD_PROCESS_TIMEOUT_SECS").filter(|secs| *secs > 0),
            proxy: lookup("VD_PROXY"),
            unknown_platform: lookup("VD_UNKNOWN_PLATFORM")
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.unknown_platform),
            reuse_cached: lookup("VD_REUSE_CACHED")
                .and_then(|value| parse_bool(&value))
                .unwrap_or(defaults.reuse_cached),
        }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_cache_ttl_secs(mut self, secs: u64) -> Self {
        self.cache_ttl_secs = secs;
        self
    }

    pub fn with_cache_max_bytes(mut self, bytes: Option<u64>) -> Self {
        self.cache_max_bytes = bytes;
        self
    }

    pub fn with_cookie_file(mut self, path: Option<PathBuf>) -> Self {
        self.cookie_file = path;
        self
    }

    pub fn with_ytdlp_path(mut self, path: Option<PathBuf>) -> Self {
        self.ytdlp_path = path;
        self
    }

    pub fn with_ffmpeg_path(mut self, path: Option<PathBuf>) -> Self {
        self.ffmpeg_path = path;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_socket_timeout_secs(mut self, secs: u32) -> Self {
        self.socket_timeout_secs = secs;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_process_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.process_timeout_secs = secs;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_unknown_platform(mut self, policy: UnknownPlatformPolicy) -> Self {
        self.unknown_platform = policy;
        self
    }

    pub fn with_reuse_cached(mut self, reuse: bool) -> Self {
        self.reuse_cached = reuse;
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_manager(&self) -> CacheManager {
        CacheManager::new(&self.cache_dir, self.cache_ttl(), self.cache_max_bytes)
    }

    pub fn tool_manager(&self) -> ToolManager {
        ToolManager::new(self.ytdlp_path.clone(), self.ffmpeg_path.clone())
    }

    /// Shared extractor options before per-platform tuning
    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig::default()
            .with_proxy(self.proxy.clone())
            .with_cookies_path(self.cookie_file.as_deref())
            .with_user_agent(self.user_agent.clone())
            .with_timeout(self.socket_timeout_secs)
            .with_retries(self.retries, self.retries)
            .with_process_timeout(self.process_timeout_secs)
    }

    pub fn cookie_file(&self) -> Option<&Path> {
        self.cookie_file.as_deref()
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
