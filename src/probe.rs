//! Availability probing
//!
//! Decides whether a stream URL is delivering media:
//! - Admission-gated streaming GET with a browser User-Agent
//! - Accepts only HTTP 200 video (or `.ts`) responses that deliver the
//!   byte threshold; reading stops as soon as it is reached
//! - Retries with linear backoff, then a second phase at the extended
//!   timeout if one is configured
//! - Alive verdicts are confirmed by a bounded decode
//! - Final verdicts are memoized for the rest of the scan

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::admission::AdmissionController;
use crate::cache::ResultCache;
use crate::config::ScanConfig;
use crate::inspect::{DecodeValidator, MediaInspector};

/// Reachability verdict for one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProbeStatus {
    Alive,
    Dead,
}

impl ProbeStatus {
    pub fn is_alive(self) -> bool {
        self == ProbeStatus::Alive
    }
}

/// Classified result of a single probe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Threshold bytes of media arrived.
    Success,
    /// Network-level failure worth retrying (connect error, reset, timeout).
    TransientFailure(String),
    /// The origin answered, but not with usable media. Ends the phase.
    PermanentFailure(String),
}

/// Scan-scoped prober. Owns the result cache and admission gate shared by
/// every worker of one scan.
pub struct AvailabilityProber {
    client: Client,
    config: Arc<ScanConfig>,
    cache: ResultCache,
    admission: AdmissionController,
    validator: Option<DecodeValidator>,
}

impl std::fmt::Debug for AvailabilityProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvailabilityProber")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("admission", &self.admission)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl AvailabilityProber {
    pub fn new(
        client: Client,
        config: Arc<ScanConfig>,
        inspector: Arc<dyn MediaInspector>,
    ) -> Self {
        let admission = AdmissionController::new(
            config.max_connections,
            config.acquire_timeout,
            config.acquire_retries,
        );
        let validator = config.validate_decode.then(|| {
            DecodeValidator::new(inspector, config.decode_window, config.decode_timeout)
        });

        Self {
            client,
            config,
            cache: ResultCache::new(),
            admission,
            validator,
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Full verdict for `url`: cached value if present, otherwise the
    /// normal phase, the extended phase if needed, and decode confirmation.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn probe(
        &self,
        url: &str,
        read_timeout: Duration,
        extended_timeout: Option<Duration>,
    ) -> ProbeStatus {
        if let Some(cached) = self.cache.lookup(url) {
            debug!(?cached, "cache hit");
            return cached;
        }

        let mut status = self.run_phase(url, read_timeout).await;

        if status == ProbeStatus::Dead {
            if let Some(extended) = extended_timeout {
                if let Some(cached) = self.cache.lookup(url) {
                    return cached;
                }
                info!(?extended, "retrying with extended timeout");
                status = self.run_phase(url, extended).await;
            }
        }

        if status.is_alive() {
            if let Some(validator) = &self.validator {
                if !validator.validate(url).await {
                    status = ProbeStatus::Dead;
                }
            }
        }

        self.cache.store(url, status)
    }

    /// One phase: up to `retry_count` attempts at a single read timeout.
    async fn run_phase(&self, url: &str, read_timeout: Duration) -> ProbeStatus {
        let attempts = self.config.retry_count;

        for attempt in 0..attempts {
            // Starvation burns an attempt without touching the network.
            let Some(slot) = self.admission.acquire().await else {
                warn!(url, attempt = attempt + 1, "could not acquire connection slot");
                continue;
            };

            let outcome = self.attempt(url, read_timeout).await;
            drop(slot);

            match outcome {
                AttemptOutcome::Success => return ProbeStatus::Alive,
                AttemptOutcome::PermanentFailure(reason) => {
                    debug!(url, attempt = attempt + 1, %reason, "stream rejected");
                    return ProbeStatus::Dead;
                }
                AttemptOutcome::TransientFailure(reason) => {
                    debug!(url, attempt = attempt + 1, %reason, "attempt failed");
                }
            }

            if attempt + 1 < attempts {
                tokio::time::sleep(self.config.backoff_unit * (attempt + 1)).await;
            }
        }

        ProbeStatus::Dead
    }

    /// Single streaming GET. Headers must arrive within `connect_timeout`
    /// plus `read_timeout`; after that `read_timeout` bounds every body
    /// chunk, not the transfer as a whole.
    async fn attempt(&self, url: &str, read_timeout: Duration) -> AttemptOutcome {
        let headers_timeout = self.config.connect_timeout + read_timeout;
        let mut response = match timeout(headers_timeout, self.client.get(url).send()).await {
            Err(_) => {
                return AttemptOutcome::TransientFailure(format!(
                    "no response within {headers_timeout:?}"
                ))
            }
            Ok(Err(e)) if e.is_builder() => {
                return AttemptOutcome::PermanentFailure(format!("unusable URL: {e}"))
            }
            Ok(Err(e)) => return AttemptOutcome::TransientFailure(e.to_string()),
            Ok(Ok(response)) => response,
        };

        if response.status() != StatusCode::OK {
            return AttemptOutcome::PermanentFailure(format!("HTTP {}", response.status()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !content_type.contains("video") && !is_transport_stream(url) {
            return AttemptOutcome::PermanentFailure(format!(
                "not a video response (content-type {content_type:?})"
            ));
        }

        let threshold = self.config.min_data_threshold;
        let mut received = 0u64;
        loop {
            match timeout(read_timeout, response.chunk()).await {
                Err(_) => {
                    return AttemptOutcome::TransientFailure(format!(
                        "read stalled after {received} bytes"
                    ))
                }
                Ok(Err(e)) => return AttemptOutcome::TransientFailure(e.to_string()),
                Ok(Ok(None)) => {
                    return AttemptOutcome::PermanentFailure(format!(
                        "stream ended after {received} of {threshold} bytes"
                    ))
                }
                Ok(Ok(Some(chunk))) => {
                    received += chunk.len() as u64;
                    if received >= threshold {
                        return AttemptOutcome::Success;
                    }
                }
            }
        }
    }
}

/// URL path names an MPEG transport stream (`.ts`).
pub fn is_transport_stream(url: &str) -> bool {
    match Url::parse(url.trim()) {
        Ok(parsed) => parsed.path().to_ascii_lowercase().ends_with(".ts"),
        Err(_) => url.to_ascii_lowercase().contains(".ts"),
    }
}
