use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ExtractedMedia, MediaExtractor};
use crate::error::BotError;

/// Extracts stream information by shelling out to yt-dlp.
pub struct YtDlpExtractor {
    binary: String,
}

/// Subset of the yt-dlp JSON we care about.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    entries: Option<Vec<YtDlpInfo>>,
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Checks that the configured binary can be executed.
    pub async fn verify(&self) -> Result<String, BotError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .map_err(|e| BotError::resolution(format!("yt-dlp is not available: {e}")))?;

        if !output.status.success() {
            return Err(BotError::resolution("yt-dlp could not be executed"));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn extract(&self, target: &str) -> Result<ExtractedMedia, BotError> {
        debug!("📊 yt-dlp extracting: {}", target);

        let output = Command::new(&self.binary)
            .args([
                "--dump-json",
                "--no-playlist",
                "--no-warnings",
                "-f",
                "bestaudio/best",
                target,
            ])
            .output()
            .await
            .map_err(|e| BotError::resolution(format!("failed to run yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp error for '{}': {}", target, stderr.trim());
            return Err(BotError::resolution(first_error_line(&stderr)));
        }

        parse_output(&String::from_utf8_lossy(&output.stdout), target)
    }
}

/// Parses the first JSON document printed by yt-dlp.
fn parse_output(stdout: &str, target: &str) -> Result<ExtractedMedia, BotError> {
    let line = stdout
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| BotError::resolution(format!("no results for '{target}'")))?;

    let mut info: YtDlpInfo = serde_json::from_str(line)
        .map_err(|e| BotError::resolution(format!("unexpected yt-dlp output: {e}")))?;

    // Search and playlist wrappers carry the actual media in `entries`
    if let Some(entries) = info.entries.take() {
        info = entries
            .into_iter()
            .next()
            .ok_or_else(|| BotError::resolution(format!("no results for '{target}'")))?;
    }

    let stream_url = info
        .url
        .ok_or_else(|| BotError::resolution("no playable audio stream"))?;

    Ok(ExtractedMedia {
        title: info.title.unwrap_or_else(|| "Unknown title".to_string()),
        stream_url,
        page_url: info.webpage_url,
        duration: info
            .duration
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64),
    })
}

fn first_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("ERROR"))
        .or_else(|| stderr.lines().map(str::trim).find(|line| !line.is_empty()))
        .unwrap_or("yt-dlp failed")
        .to_string()
}
