//! External media inspection
//!
//! Decode checks and stream-property queries run external tools. They sit
//! behind [`MediaInspector`] so the probing logic can be exercised without
//! ffmpeg installed.

pub mod decode;
pub mod ffmpeg;
pub mod metadata;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

pub use decode::DecodeValidator;
pub use ffmpeg::FfmpegInspector;
pub use metadata::{AudioInfo, MetadataExtractor, VideoInfo};

/// Which elementary stream a property query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    /// Keys requested from the inspection tool for this stream kind.
    pub fn entries(self) -> &'static [&'static str] {
        match self {
            StreamKind::Video => &["codec_name", "width", "height", "r_frame_rate"],
            StreamKind::Audio => &["codec_name", "bit_rate"],
        }
    }
}

/// Capability interface over the external decoder and stream inspector.
#[async_trait]
pub trait MediaInspector: Send + Sync {
    /// Decode `duration` of media from `url`, discarding output. `true` only
    /// if the decoder exits successfully within `timeout`.
    async fn run_decode_check(&self, url: &str, duration: Duration, timeout: Duration) -> bool;

    /// `key=value` properties of the first stream of `kind`. Empty when the
    /// tool fails, times out, or finds no such stream.
    async fn run_stream_probe(
        &self,
        url: &str,
        kind: StreamKind,
        timeout: Duration,
    ) -> HashMap<String, String>;
}

/// Parse `key=value` lines; other lines are ignored.
pub fn parse_key_values(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.trim().split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_writer_output() {
        let props =
            parse_key_values("codec_name=h264\nwidth=1920\nheight=1080\nr_frame_rate=25/1\n");
        assert_eq!(props.get("codec_name").map(String::as_str), Some("h264"));
        assert_eq!(props.get("r_frame_rate").map(String::as_str), Some("25/1"));
        assert_eq!(props.len(), 4);
    }

    #[test]
    fn ignores_noise_lines() {
        let props = parse_key_values("[STREAM]\n\ncodec_name=aac\n");
        assert_eq!(props.len(), 1);
    }
}
