//! Browser-like request headers
//!
//! Some IPTV origins refuse requests that don't look like a player or a
//! browser. Every probe carries a realistic desktop User-Agent.

use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};

/// Headers presented by the prober.
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
}

/// Real Chrome versions from 2024-2025 (high market share)
const CHROME_VERSIONS: &[&str] = &["131.0.0.0", "130.0.0.0", "129.0.0.0", "128.0.0.0"];

/// Real Firefox versions
const FIREFOX_VERSIONS: &[&str] = &["133.0", "132.0", "131.0"];

const PLATFORMS: &[&str] = &[
    "Windows NT 10.0; Win64; x64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "X11; Linux x86_64",
];

/// Generate a realistic Chrome browser profile
#[must_use]
pub fn chrome_profile() -> BrowserProfile {
    let mut rng = rand::thread_rng();
    let platform = PLATFORMS.choose(&mut rng).copied().unwrap_or(PLATFORMS[0]);
    let version = CHROME_VERSIONS
        .choose(&mut rng)
        .copied()
        .unwrap_or(CHROME_VERSIONS[0]);

    BrowserProfile {
        user_agent: format!(
            "Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{version} Safari/537.36"
        ),
        accept: "*/*".to_string(),
        accept_language: "en-US,en;q=0.9".to_string(),
    }
}

/// Generate a realistic Firefox browser profile
#[must_use]
pub fn firefox_profile() -> BrowserProfile {
    let mut rng = rand::thread_rng();
    let platform = PLATFORMS.choose(&mut rng).copied().unwrap_or(PLATFORMS[0]);
    let version = FIREFOX_VERSIONS
        .choose(&mut rng)
        .copied()
        .unwrap_or(FIREFOX_VERSIONS[0]);

    BrowserProfile {
        user_agent: format!(
            "Mozilla/5.0 ({platform}; rv:{version}) Gecko/20100101 Firefox/{version}"
        ),
        accept: "*/*".to_string(),
        accept_language: "en-US,en;q=0.5".to_string(),
    }
}

/// Pick Chrome or Firefox at random (Chrome weighted 3:1).
#[must_use]
pub fn random_profile() -> BrowserProfile {
    if rand::random::<u8>() % 4 == 0 {
        firefox_profile()
    } else {
        chrome_profile()
    }
}

impl BrowserProfile {
    /// Convert to a reqwest `HeaderMap`; invalid values are skipped.
    #[must_use]
    pub fn to_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(v) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, v);
        }
        if let Ok(v) = HeaderValue::from_str(&self.accept) {
            headers.insert(ACCEPT, v);
        }
        if let Ok(v) = HeaderValue::from_str(&self.accept_language) {
            headers.insert(ACCEPT_LANGUAGE, v);
        }
        headers
    }
}
