//! Scan configuration.
//!
//! Built-in defaults, optionally overridden by `~/.config/iptvprobe/config.toml`
//! (every key optional, durations in seconds), then by CLI flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProbeError, Result};

/// 500 KiB: payload volume a stream must deliver before it counts as alive.
pub const DEFAULT_MIN_DATA_THRESHOLD: u64 = 1024 * 500;

/// Settings for one scan. Read-only once dispatch begins.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Read timeout for the first phase.
    pub timeout: Duration,
    /// Read timeout for the second, more patient phase (if any).
    pub extended_timeout: Option<Duration>,
    /// TCP/TLS connect timeout for every request.
    pub connect_timeout: Duration,
    /// Admission slots: probes allowed on the network at once.
    pub max_connections: usize,
    /// Channels processed concurrently.
    pub max_workers: usize,
    /// How long one admission attempt waits for a free slot.
    pub acquire_timeout: Duration,
    /// Admission attempts before giving up on this probe attempt.
    pub acquire_retries: u32,
    /// Bytes that must arrive before a stream is judged alive.
    pub min_data_threshold: u64,
    /// Probe attempts per phase.
    pub retry_count: u32,
    /// Backoff after attempt `n` (0-based) is `(n + 1) * backoff_unit`.
    pub backoff_unit: Duration,
    /// Seconds of media the decoder must get through.
    pub decode_window: Duration,
    /// Wall-clock limit for the decoder process.
    pub decode_timeout: Duration,
    /// Wall-clock limit for each metadata query.
    pub metadata_timeout: Duration,
    /// Confirm alive streams with an actual decode.
    pub validate_decode: bool,
    /// Query video/audio properties of alive streams.
    pub extract_metadata: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            extended_timeout: None,
            connect_timeout: Duration::from_secs(5),
            max_connections: 3,
            max_workers: default_workers(),
            acquire_timeout: Duration::from_secs(10),
            acquire_retries: 3,
            min_data_threshold: DEFAULT_MIN_DATA_THRESHOLD,
            retry_count: 6,
            backoff_unit: Duration::from_secs(1),
            decode_window: Duration::from_secs(5),
            decode_timeout: Duration::from_secs(15),
            metadata_timeout: Duration::from_secs(10),
            validate_decode: true,
            extract_metadata: true,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

impl ScanConfig {
    /// Reject settings that would make a scan hang or never probe.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(ProbeError::InvalidConfig("timeout must be positive".into()));
        }
        if self.extended_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ProbeError::InvalidConfig(
                "extended timeout must be positive".into(),
            ));
        }
        for (name, value) in [
            ("connect timeout", self.connect_timeout),
            ("decode window", self.decode_window),
            ("decode timeout", self.decode_timeout),
            ("metadata timeout", self.metadata_timeout),
        ] {
            if value.is_zero() {
                return Err(ProbeError::InvalidConfig(format!("{name} must be positive")));
            }
        }
        if self.max_connections == 0 {
            return Err(ProbeError::InvalidConfig(
                "max connections must be at least 1".into(),
            ));
        }
        if self.max_workers == 0 {
            return Err(ProbeError::InvalidConfig(
                "worker count must be at least 1".into(),
            ));
        }
        if self.retry_count == 0 || self.acquire_retries == 0 {
            return Err(ProbeError::InvalidConfig(
                "retry counts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Apply every key present in `file` on top of the current values.
    pub fn merge(&mut self, file: &ConfigFile) {
        if let Some(s) = file.timeout {
            self.timeout = secs(s);
        }
        if let Some(s) = file.extended_timeout {
            self.extended_timeout = Some(secs(s));
        }
        if let Some(s) = file.connect_timeout {
            self.connect_timeout = secs(s);
        }
        if let Some(n) = file.max_connections {
            self.max_connections = n;
        }
        if let Some(n) = file.max_workers {
            self.max_workers = n;
        }
        if let Some(s) = file.acquire_timeout {
            self.acquire_timeout = secs(s);
        }
        if let Some(n) = file.acquire_retries {
            self.acquire_retries = n;
        }
        if let Some(n) = file.min_data_threshold {
            self.min_data_threshold = n;
        }
        if let Some(n) = file.retry_count {
            self.retry_count = n;
        }
        if let Some(s) = file.backoff_unit {
            self.backoff_unit = secs(s);
        }
        if let Some(s) = file.decode_window {
            self.decode_window = secs(s);
        }
        if let Some(s) = file.decode_timeout {
            self.decode_timeout = secs(s);
        }
        if let Some(s) = file.metadata_timeout {
            self.metadata_timeout = secs(s);
        }
        if let Some(b) = file.validate_decode {
            self.validate_decode = b;
        }
        if let Some(b) = file.extract_metadata {
            self.extract_metadata = b;
        }
    }
}

/// Negative or NaN values clamp to zero; `validate` rejects a zero timeout.
fn secs(s: f64) -> Duration {
    Duration::try_from_secs_f64(s).unwrap_or(Duration::ZERO)
}

/// On-disk configuration. Durations are seconds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub timeout: Option<f64>,
    pub extended_timeout: Option<f64>,
    pub connect_timeout: Option<f64>,
    pub max_connections: Option<usize>,
    pub max_workers: Option<usize>,
    pub acquire_timeout: Option<f64>,
    pub acquire_retries: Option<u32>,
    pub min_data_threshold: Option<u64>,
    pub retry_count: Option<u32>,
    pub backoff_unit: Option<f64>,
    pub decode_window: Option<f64>,
    pub decode_timeout: Option<f64>,
    pub metadata_timeout: Option<f64>,
    pub validate_decode: Option<bool>,
    pub extract_metadata: Option<bool>,
}

impl ConfigFile {
    /// Load configuration.
    ///
    /// With `explicit = Some(path)` the file must exist and parse. Without it,
    /// the default location is tried and a missing file yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(p) => (p.to_path_buf(), true),
            None => (default_path(), false),
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ProbeError::Config {
            path: path.clone(),
            message: e.to_string(),
        })?;

        Self::parse(&content).map_err(|message| ProbeError::Config { path, message })
    }

    fn parse(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }
}

/// `~/.config/iptvprobe/config.toml` (platform equivalent elsewhere).
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("iptvprobe")
        .join("config.toml")
}
