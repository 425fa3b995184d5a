//! Extended M3U playlist parsing
//!
//! Each channel is an `#EXTINF` line (attributes, then the display name after
//! the first comma) followed by its URL. Player directives such as
//! `#EXTVLCOPT` may sit between the two and are skipped.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{ProbeError, Result};

const ENTRY_MARKER: &str = "#EXTINF";

static GROUP_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"group-title="([^"]+)""#).expect("valid regex"));

/// One playlist entry, before filtering and numbering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub name: String,
    pub url: String,
    info_line: String,
}

impl PlaylistEntry {
    /// Same test the filter has always used: the literal attribute text
    /// appears on the entry line.
    pub fn in_category(&self, category: &str) -> bool {
        self.info_line.contains(&format!("group-title=\"{category}\""))
    }
}

/// A channel to probe. `index` is 1-based and dense over the filtered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelTask {
    pub index: usize,
    pub name: String,
    pub url: String,
    pub timeout: Duration,
    pub extended_timeout: Option<Duration>,
}

/// Read a playlist file. Invalid UTF-8 is replaced rather than rejected.
pub fn read_playlist(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|source| ProbeError::PlaylistRead {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// All well-formed entries, in file order. Entries without a name or a URL
/// are skipped.
pub fn parse_entries(content: &str) -> Vec<PlaylistEntry> {
    let lines: Vec<&str> = content.lines().collect();
    let mut entries = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let line = line.trim();
        if !line.starts_with(ENTRY_MARKER) {
            continue;
        }

        let name = line
            .split_once(',')
            .map(|(_, name)| name.trim())
            .unwrap_or_default();
        if name.is_empty() {
            debug!(line = i + 1, "skipping entry without a name");
            continue;
        }

        let Some(url) = find_url(&lines[i + 1..]) else {
            debug!(line = i + 1, name, "skipping entry without a URL");
            continue;
        };

        entries.push(PlaylistEntry {
            name: name.to_string(),
            url: url.to_string(),
            info_line: line.to_string(),
        });
    }

    entries
}

/// First non-empty, non-directive line. Another `#EXTINF` means this entry
/// has no URL.
fn find_url<'a>(rest: &[&'a str]) -> Option<&'a str> {
    for line in rest {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with(ENTRY_MARKER) {
            return None;
        }
        if line.starts_with('#') {
            continue;
        }
        return Some(line);
    }
    None
}

/// Number the entries that pass `category` as channel tasks.
pub fn build_tasks(
    content: &str,
    category: Option<&str>,
    timeout: Duration,
    extended_timeout: Option<Duration>,
) -> Vec<ChannelTask> {
    parse_entries(content)
        .into_iter()
        .filter(|entry| category.is_none_or(|c| entry.in_category(c)))
        .enumerate()
        .map(|(i, entry)| ChannelTask {
            index: i + 1,
            name: entry.name,
            url: entry.url,
            timeout,
            extended_timeout,
        })
        .collect()
}

/// Distinct `group-title` values, sorted.
pub fn discover_categories(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| GROUP_TITLE.captures(line).map(|c| c[1].to_string()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
