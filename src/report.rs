//! Report rendering
//!
//! Text lines look like
//! `12/340 ✓ Channel Name | Video: 1080p 25fps H264 | Audio: 128 kbps AAC`.
//! Missing properties print as `Unknown`; dead channels carry no metadata.

use crate::inspect::{AudioInfo, VideoInfo};
use crate::scan::{ChannelReport, ScanSummary};

const UNKNOWN: &str = "Unknown";
const ALIVE_SYMBOL: char = '✓';
const DEAD_SYMBOL: char = '✗';

/// How report lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputFormat {
    /// Aligned human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Render one report in `format`.
pub fn render(report: &ChannelReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => render_text(report),
        // Plain data struct; serialization cannot fail.
        OutputFormat::Json => serde_json::to_string(report).unwrap_or_default(),
    }
}

pub fn render_text(report: &ChannelReport) -> String {
    let width = report.total.to_string().len();
    let symbol = if report.status.is_alive() {
        ALIVE_SYMBOL
    } else {
        DEAD_SYMBOL
    };
    let mut line = format!(
        "{:>width$}/{} {symbol} {}",
        report.index, report.total, report.name
    );

    if report.status.is_alive() && (report.video.is_some() || report.audio.is_some()) {
        let video = report.video.as_ref().map_or_else(|| UNKNOWN.to_string(), video_summary);
        let audio = report.audio.as_ref().map_or_else(|| UNKNOWN.to_string(), audio_summary);
        line.push_str(&format!(" | Video: {video} | Audio: {audio}"));
    }

    line
}

/// `1080p 25fps H264`, or just `Unknown` when the inspector reported
/// nothing. A missing field is replaced by `Unknown` together with its unit.
pub fn video_summary(video: &VideoInfo) -> String {
    if video.is_empty() {
        return UNKNOWN.to_string();
    }
    let resolution = video
        .resolution
        .map_or_else(|| UNKNOWN.to_string(), |r| r.to_string());
    let fps = video
        .fps
        .map_or_else(|| UNKNOWN.to_string(), |f| format!("{f}fps"));
    let codec = video.codec.as_deref().unwrap_or(UNKNOWN);
    format!("{resolution} {fps} {codec}")
}

/// `128 kbps AAC`, per-field `Unknown` (unit included), or just `Unknown`.
pub fn audio_summary(audio: &AudioInfo) -> String {
    if audio.is_empty() {
        return UNKNOWN.to_string();
    }
    let bitrate = audio
        .bitrate_kbps
        .map_or_else(|| UNKNOWN.to_string(), |b| format!("{b} kbps"));
    let codec = audio.codec.as_deref().unwrap_or(UNKNOWN);
    format!("{bitrate} {codec}")
}

pub fn render_summary(summary: &ScanSummary) -> String {
    format!(
        "{} alive, {} dead of {} channels in {:.1}s",
        summary.alive,
        summary.dead,
        summary.total,
        summary.elapsed.as_secs_f64()
    )
}
