//! ffmpeg/ffprobe inspector
//!
//! Uses subprocesses for:
//! - Decode checks (`ffmpeg -t N -f null -`)
//! - Stream properties (`ffprobe -show_entries ... -of default`)
//!
//! Every child is spawned with `kill_on_drop`, so a timed-out or cancelled
//! check never leaves a decoder running.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{parse_key_values, MediaInspector, StreamKind};

/// Inspector backed by the ffmpeg and ffprobe binaries.
#[derive(Debug, Clone)]
pub struct FfmpegInspector {
    /// Path to ffmpeg binary
    ffmpeg_path: String,
    /// Path to ffprobe binary
    ffprobe_path: String,
}

impl Default for FfmpegInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegInspector {
    /// Create new inspector, searching for binaries in PATH
    pub fn new() -> Self {
        Self {
            ffmpeg_path: locate("ffmpeg"),
            ffprobe_path: locate("ffprobe"),
        }
    }

    /// Specify custom ffmpeg binary path
    #[must_use]
    pub fn with_ffmpeg_path(mut self, path: &str) -> Self {
        self.ffmpeg_path = path.to_string();
        self
    }

    /// Specify custom ffprobe binary path
    #[must_use]
    pub fn with_ffprobe_path(mut self, path: &str) -> Self {
        self.ffprobe_path = path.to_string();
        self
    }

    fn decode_args(url: &str, duration: Duration) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-v", "error", "-i"]
            .iter()
            .map(std::string::ToString::to_string)
            .collect();
        args.push(url.to_string());
        args.push("-t".to_string());
        args.push(format_secs(duration));
        args.extend(["-f", "null", "-"].iter().map(std::string::ToString::to_string));
        args
    }

    fn probe_args(url: &str, kind: StreamKind) -> Vec<String> {
        let selector = match kind {
            StreamKind::Video => "v:0",
            StreamKind::Audio => "a:0",
        };
        vec![
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            selector.to_string(),
            "-show_entries".to_string(),
            format!("stream={}", kind.entries().join(",")),
            "-of".to_string(),
            "default=noprint_wrappers=1".to_string(),
            url.to_string(),
        ]
    }

    /// Check if both tools are available
    pub async fn check_available(&self) -> (bool, bool) {
        (
            responds_to_version(&self.ffmpeg_path).await,
            responds_to_version(&self.ffprobe_path).await,
        )
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }

    pub fn ffprobe_path(&self) -> &str {
        &self.ffprobe_path
    }
}

#[async_trait]
impl MediaInspector for FfmpegInspector {
    async fn run_decode_check(&self, url: &str, duration: Duration, timeout: Duration) -> bool {
        let args = Self::decode_args(url, duration);
        debug!("ffmpeg args: {:?}", args);

        let child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(timeout, child).await {
            Ok(Ok(output)) if output.status.success() => true,
            Ok(Ok(output)) => {
                debug!(
                    url,
                    status = %output.status,
                    stderr = %stderr_tail(&output.stderr),
                    "ffmpeg decode failed"
                );
                false
            }
            Ok(Err(e)) => {
                debug!(url, error = %e, "could not run ffmpeg");
                false
            }
            Err(_) => {
                debug!(url, ?timeout, "ffmpeg decode timed out");
                false
            }
        }
    }

    async fn run_stream_probe(
        &self,
        url: &str,
        kind: StreamKind,
        timeout: Duration,
    ) -> HashMap<String, String> {
        let args = Self::probe_args(url, kind);
        debug!("ffprobe args: {:?}", args);

        let child = Command::new(&self.ffprobe_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(timeout, child).await {
            Ok(Ok(output)) => parse_key_values(&String::from_utf8_lossy(&output.stdout)),
            Ok(Err(e)) => {
                debug!(url, ?kind, error = %e, "could not run ffprobe");
                HashMap::new()
            }
            Err(_) => {
                debug!(url, ?kind, "ffprobe timed out");
                HashMap::new()
            }
        }
    }
}

fn locate(binary: &str) -> String {
    which::which(binary).map_or_else(|_| binary.to_string(), |p| p.to_string_lossy().to_string())
}

async fn responds_to_version(path: &str) -> bool {
    Command::new(path)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// ffmpeg accepts fractional seconds for `-t`.
fn format_secs(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 {
        duration.as_secs().to_string()
    } else {
        format!("{:.3}", duration.as_secs_f64())
    }
}

/// Last few lines of stderr; decoder errors are at the end.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(5)..].join(" | ")
}
