//! `iptvprobe` - IPTV playlist availability prober
//!
//! # Features
//!
//! - **Bounded probing**: worker pool for channels, separate admission gate
//!   for open connections
//! - **Real liveness**: HTTP 200 video responses must deliver a byte
//!   threshold, then survive a short decode
//! - **Patient second pass**: optional extended timeout for slow origins
//! - **Stream properties**: resolution, frame rate, codecs, audio bitrate
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use iptvprobe::{playlist, FfmpegInspector, ScanConfig, Scanner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ScanConfig::default();
//!     let content = playlist::read_playlist("channels.m3u".as_ref())?;
//!     let tasks = playlist::build_tasks(&content, Some("News"), config.timeout, None);
//!
//!     let scanner = Scanner::new(config, Arc::new(FfmpegInspector::new()))?;
//!     let summary = scanner
//!         .run(tasks, |report| println!("{}", iptvprobe::report::render_text(report)))
//!         .await;
//!     println!("{} alive", summary.alive);
//!     Ok(())
//! }
//! ```

pub mod admission;
pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod http_client;
pub mod inspect;
pub mod playlist;
pub mod probe;
pub mod report;
pub mod scan;

pub use admission::{AdmissionController, AdmissionSlot};
pub use cache::ResultCache;
pub use config::{ConfigFile, ScanConfig};
pub use error::{ProbeError, Result};
pub use inspect::{
    AudioInfo, DecodeValidator, FfmpegInspector, MediaInspector, MetadataExtractor, StreamKind,
    VideoInfo,
};
pub use playlist::ChannelTask;
pub use probe::{AttemptOutcome, AvailabilityProber, ProbeStatus};
pub use report::OutputFormat;
pub use scan::{ChannelReport, ScanSummary, Scanner};

/// Version of iptvprobe
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
