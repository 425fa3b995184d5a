//! Streaming HTTP client for probes
//!
//! One client per scan, shared by every worker:
//! - Fixed connect timeout; no overall request timeout (read timeouts are
//!   applied per await by the prober so a healthy stream is never cut off)
//! - No content decoding, so byte counts reflect what the origin sent
//! - Connection pooling with keep-alive
//! - Realistic browser headers

use std::time::Duration;

use reqwest::Client;

use crate::config::ScanConfig;
use crate::error::Result;
use crate::fingerprint::{random_profile, BrowserProfile};

/// Build the client used by every probe attempt of one scan.
pub fn build_client(config: &ScanConfig) -> Result<Client> {
    build_client_with_profile(config, &random_profile())
}

/// Build a probe client that presents `profile`.
pub fn build_client_with_profile(config: &ScanConfig, profile: &BrowserProfile) -> Result<Client> {
    let client = Client::builder()
        .default_headers(profile.to_headers())
        .connect_timeout(config.connect_timeout)
        .pool_max_idle_per_host(config.max_connections)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .use_rustls_tls()
        // Playlists often point at redirectors in front of the real origin
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()?;

    Ok(client)
}
