//! Stream properties for alive channels (reporting only).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::instrument;

use super::{MediaInspector, StreamKind};

/// Resolution class derived from frame width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Resolution {
    #[serde(rename = "4K")]
    Uhd,
    #[serde(rename = "1080p")]
    FullHd,
    #[serde(rename = "720p")]
    Hd,
    #[serde(rename = "SD")]
    Sd,
}

impl Resolution {
    pub fn from_width(width: u32) -> Self {
        match width {
            w if w >= 3840 => Resolution::Uhd,
            w if w >= 1920 => Resolution::FullHd,
            w if w >= 1280 => Resolution::Hd,
            _ => Resolution::Sd,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resolution::Uhd => "4K",
            Resolution::FullHd => "1080p",
            Resolution::Hd => "720p",
            Resolution::Sd => "SD",
        })
    }
}

/// First video stream. Each field is absent when the tool didn't report it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VideoInfo {
    pub resolution: Option<Resolution>,
    pub fps: Option<u32>,
    pub codec: Option<String>,
}

/// First audio stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AudioInfo {
    pub bitrate_kbps: Option<u64>,
    pub codec: Option<String>,
}

impl VideoInfo {
    pub fn from_properties(props: &HashMap<String, String>) -> Self {
        let width = props.get("width").and_then(|w| w.parse::<u32>().ok());
        Self {
            resolution: width.map(Resolution::from_width),
            fps: props.get("r_frame_rate").and_then(|r| parse_frame_rate(r)),
            codec: codec_name(props),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.resolution.is_none() && self.fps.is_none() && self.codec.is_none()
    }
}

impl AudioInfo {
    pub fn from_properties(props: &HashMap<String, String>) -> Self {
        Self {
            bitrate_kbps: props
                .get("bit_rate")
                .and_then(|b| b.parse::<u64>().ok())
                .map(|bps| bps / 1000),
            codec: codec_name(props),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bitrate_kbps.is_none() && self.codec.is_none()
    }
}

fn codec_name(props: &HashMap<String, String>) -> Option<String> {
    props
        .get("codec_name")
        .filter(|c| !c.is_empty() && c.as_str() != "N/A")
        .map(|c| c.to_uppercase())
}

/// Rational frame rate ("30000/1001") rounded to whole frames per second.
/// A zero denominator or zero rate yields `None`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_frame_rate(rate: &str) -> Option<u32> {
    let (num, den) = match rate.split_once('/') {
        Some((n, d)) => (n.trim().parse::<f64>().ok()?, d.trim().parse::<f64>().ok()?),
        None => (rate.trim().parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 {
        return None;
    }
    let fps = (num / den).round();
    if fps.is_finite() && fps >= 1.0 && fps <= f64::from(u32::MAX) {
        Some(fps as u32)
    } else {
        None
    }
}

/// Queries video and audio properties for a confirmed-alive URL.
#[derive(Clone)]
pub struct MetadataExtractor {
    inspector: Arc<dyn MediaInspector>,
    timeout: Duration,
}

impl fmt::Debug for MetadataExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataExtractor")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl MetadataExtractor {
    pub fn new(inspector: Arc<dyn MediaInspector>, timeout: Duration) -> Self {
        Self { inspector, timeout }
    }

    /// Both queries run concurrently; either may come back empty.
    #[instrument(skip(self))]
    pub async fn extract(&self, url: &str) -> (VideoInfo, AudioInfo) {
        let (video, audio) = tokio::join!(
            self.inspector
                .run_stream_probe(url, StreamKind::Video, self.timeout),
            self.inspector
                .run_stream_probe(url, StreamKind::Audio, self.timeout),
        );
        (
            VideoInfo::from_properties(&video),
            AudioInfo::from_properties(&audio),
        )
    }
}
