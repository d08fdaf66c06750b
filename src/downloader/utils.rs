// Helper functions for extractor implementations

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use crate::downloader::errors::DownloadError;

lazy_static! {
    static ref URL_RE: Regex = Regex::new(r"(?i)^https?://[^\s/$.?#][^\s]*$").unwrap();
}

/// Syntactic check only: `http(s)://` followed by a host, no whitespace.
pub fn is_valid_url(url: &str) -> bool {
    URL_RE.is_match(url.trim())
}

/// Run a command to completion, optionally bounded by a timeout.
///
/// A binary that cannot be spawned is reported as `ToolNotFound`.
pub async fn run_output_with_timeout(
    program: &Path,
    args: &[String],
    timeout_secs: Option<u64>,
) -> Result<std::process::Output, DownloadError> {
    let name = program.display().to_string();
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| DownloadError::ToolNotFound(format!("Failed to start {}: {}", name, e)))?;

    let mut stdout_pipe = child.stdout.take().ok_or_else(|| {
        DownloadError::ExtractionFailed(format!("Failed to capture stdout from {}", name))
    })?;
    let mut stderr_pipe = child.stderr.take().ok_or_else(|| {
        DownloadError::ExtractionFailed(format!("Failed to capture stderr from {}", name))
    })?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    let status = match timeout_secs {
        Some(secs) => match timeout(Duration::from_secs(secs), child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                let _ = child.kill().await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(DownloadError::ExtractionFailed(format!(
                    "{} timed out after {}s",
                    name, secs
                )));
            }
        },
        None => child.wait().await,
    }
    .map_err(|e| DownloadError::ExtractionFailed(format!("Failed to wait for {}: {}", name, e)))?;

    let stdout = join_pipe(stdout_task, "stdout").await?;
    let stderr = join_pipe(stderr_task, "stderr").await?;
    Ok(std::process::Output {
        status,
        stdout,
        stderr,
    })
}

async fn join_pipe(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
    label: &str,
) -> Result<Vec<u8>, DownloadError> {
    task.await
        .map_err(|e| DownloadError::ExtractionFailed(format!("{} task failed: {}", label, e)))?
        .map_err(|e| DownloadError::ExtractionFailed(format!("Failed to read {}: {}", label, e)))
}

/// Check if a file looks like a Netscape cookie export.
///
/// Either the standard header appears in the first few lines or some line
/// has the seven tab-separated cookie fields.
pub async fn is_netscape_cookie_file(path: &Path) -> bool {
    let Ok(file) = tokio::fs::File::open(path).await else {
        return false;
    };
    let mut lines = BufReader::new(file).lines();
    let mut index = 0usize;

    while let Ok(Some(line)) = lines.next_line().await {
        let trimmed = line.trim();
        if index < 5 && trimmed.contains("# Netscape HTTP Cookie File") {
            return true;
        }
        if !trimmed.is_empty() && !trimmed.starts_with('#') && trimmed.split('\t').count() >= 7 {
            return true;
        }
        index += 1;
    }
    false
}

/// First `ERROR:` line without its prefix, else the last non-empty line.
/// Used as context in translated error messages.
pub fn error_context(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.to_lowercase().starts_with("error:"))
        .or_else(|| output.lines().map(str::trim).filter(|l| !l.is_empty()).last())
        .map(|line| {
            line.strip_prefix("ERROR:")
                .unwrap_or(line)
                .trim()
                .to_string()
        })
}
