use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    /// The muxer
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            ToolType::Ffmpeg => "-version", // ffmpeg uses a single dash
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
    pub is_available: bool,
}

/// Locates external binaries. Configured paths win over detection.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    ytdlp_path: Option<PathBuf>,
    ffmpeg_path: Option<PathBuf>,
}

impl ToolManager {
    pub fn new(ytdlp_path: Option<PathBuf>, ffmpeg_path: Option<PathBuf>) -> Self {
        Self {
            ytdlp_path,
            ffmpeg_path,
        }
    }

    /// Path to run for a tool; falls back to the bare name so `PATH` lookup
    /// happens at spawn time.
    pub fn resolve(&self, tool_type: ToolType) -> PathBuf {
        self.detect_tool(tool_type)
            .unwrap_or_else(|| PathBuf::from(tool_type.as_str()))
    }

    pub async fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let path = self.detect_tool(tool_type);
        let version = match &path {
            Some(p) => get_version(p, tool_type).await,
            None => None,
        };

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            is_available: path.is_some() && version.is_some(),
            version,
            path,
        }
    }

    pub async fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::YtDlp).await,
            self.get_tool_info(ToolType::Ffmpeg).await,
        ]
    }

    /// Muxer probe: run `ffmpeg -version` and check the exit status.
    pub async fn muxer_available(&self) -> bool {
        probe(&self.resolve(ToolType::Ffmpeg), ToolType::Ffmpeg).await
    }

    fn detect_tool(&self, tool_type: ToolType) -> Option<PathBuf> {
        let configured = match tool_type {
            ToolType::YtDlp => self.ytdlp_path.as_ref(),
            ToolType::Ffmpeg => self.ffmpeg_path.as_ref(),
        };
        if let Some(path) = configured {
            return Some(path.clone());
        }

        let binary_name = tool_type.as_str();

        // 1. Try common paths first
        let common_paths = [
            format!("/opt/homebrew/bin/{}", binary_name),
            format!("/usr/local/bin/{}", binary_name),
            format!("/usr/bin/{}", binary_name),
        ];

        for path in common_paths {
            if Path::new(&path).exists() {
                return Some(PathBuf::from(path));
            }
        }

        // 2. Try PATH
        which::which(binary_name).ok()
    }
}

async fn probe(path: &Path, tool_type: ToolType) -> bool {
    match Command::new(path)
        .arg(tool_type.version_arg())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        Ok(status) => status.success(),
        Err(e) => {
            tracing::debug!(tool = tool_type.as_str(), error = %e, "Tool probe failed");
            false
        }
    }
}

async fn get_version(path: &Path, tool_type: ToolType) -> Option<String> {
    match Command::new(path).arg(tool_type.version_arg()).output().await {
        Ok(output) if output.status.success() => {
            // ffmpeg prints a banner; the first line holds the version
            let out = String::from_utf8_lossy(&output.stdout);
            out.lines().next().map(|line| line.trim().to_string())
        }
        _ => None,
    }
}
