//! Scan-scoped memoization of URL → final status.
//!
//! Playlists often list the same stream under several names. The first
//! verdict stored for a URL is the one every later lookup sees; concurrent
//! probes of the same URL may both run, but only one result is kept.

use dashmap::DashMap;
use url::Url;

use crate::probe::ProbeStatus;

/// Concurrent URL → status map with first-writer-wins inserts.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: DashMap<String, ProbeStatus>,
}

impl ResultCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached status for `url`, if any probe has finished for it.
    pub fn lookup(&self, url: &str) -> Option<ProbeStatus> {
        self.entries.get(&normalize(url)).map(|entry| *entry)
    }

    /// Store `status` unless a value already exists. Returns the value that
    /// is authoritative after the call.
    pub fn store(&self, url: &str, status: ProbeStatus) -> ProbeStatus {
        *self.entries.entry(normalize(url)).or_insert(status)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Trim and canonicalize through `Url` when parseable (lower-cased scheme and
/// host, default port dropped). Anything else is keyed verbatim.
pub fn normalize(url: &str) -> String {
    let trimmed = url.trim();
    Url::parse(trimmed).map_or_else(|_| trimmed.to_string(), String::from)
}
