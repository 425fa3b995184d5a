//! Decode validation.
//!
//! An HTTP 200 with plausible bytes doesn't prove the bytes are media.
//! Streams the prober judges alive are confirmed by decoding a short window.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use super::MediaInspector;

/// Confirms playability by running a bounded decode.
#[derive(Clone)]
pub struct DecodeValidator {
    inspector: Arc<dyn MediaInspector>,
    window: Duration,
    timeout: Duration,
}

impl std::fmt::Debug for DecodeValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeValidator")
            .field("window", &self.window)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl DecodeValidator {
    pub fn new(inspector: Arc<dyn MediaInspector>, window: Duration, timeout: Duration) -> Self {
        Self {
            inspector,
            window,
            timeout,
        }
    }

    /// `true` when the decoder gets through the window and exits cleanly.
    #[instrument(skip(self))]
    pub async fn validate(&self, url: &str) -> bool {
        let confirmed = self
            .inspector
            .run_decode_check(url, self.window, self.timeout)
            .await;
        if !confirmed {
            debug!("decode check rejected stream");
        }
        confirmed
    }
}
