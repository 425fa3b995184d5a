//! Error types for scan setup.
//!
//! Only setup can fail: reading the playlist, loading configuration, and
//! building the HTTP client. Once dispatch begins, every per-channel failure
//! is folded into a Dead verdict instead of an error.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced to the caller before a scan is dispatched.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("failed to read playlist {}: {source}", .path.display())]
    PlaylistRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("invalid scan configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ProbeError>;
