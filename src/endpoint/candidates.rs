//! Ordered candidate base addresses.

use std::fmt;
use tracing::warn;
use url::Url;

/// Well-known service names on the container network.
pub const SERVICE_CANDIDATES: &[&str] = &[
    "http://llm_service:11434",
    "http://ki_self_sustain_llm:11434",
    "http://ollama:11434",
];

/// Local development addresses.
pub const LOOPBACK_CANDIDATES: &[&str] = &["http://localhost:11434", "http://127.0.0.1:11434"];

/// Docker Desktop host bridge.
pub const HOST_BRIDGE_CANDIDATE: &str = "http://host.docker.internal:11434";

/// Trim whitespace and trailing slashes; `None` for blank input or anything
/// that is not an absolute http(s) URL with a host.
pub fn normalize_base_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match Url::parse(trimmed) {
        Ok(u) if matches!(u.scheme(), "http" | "https") && u.host_str().is_some() => {
            Some(trimmed.to_string())
        }
        _ => {
            warn!(address = trimmed, "dropping malformed candidate address");
            None
        }
    }
}

/// Deduplicated, normalized base addresses; priority is list position.
///
/// Immutable once built. A configuration change builds a new list rather than
/// editing this one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndpointCandidates {
    urls: Vec<String>,
}

impl EndpointCandidates {
    /// Explicit primary (if any), then service names, loopback, host bridge.
    pub fn build(primary: Option<&str>) -> Self {
        let defaults = SERVICE_CANDIDATES
            .iter()
            .chain(LOOPBACK_CANDIDATES)
            .chain(std::iter::once(&HOST_BRIDGE_CANDIDATE))
            .copied();
        Self::from_addresses(primary.into_iter().chain(defaults))
    }

    /// Only the given addresses, normalized and deduplicated in first-seen order.
    pub fn from_addresses<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut urls: Vec<String> = Vec::new();
        for raw in addresses {
            if let Some(u) = normalize_base_url(raw.as_ref()) {
                if !urls.contains(&u) {
                    urls.push(u);
                }
            }
        }
        Self { urls }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.urls
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.urls.iter()
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl<'a> IntoIterator for &'a EndpointCandidates {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.urls.iter()
    }
}

impl fmt::Display for EndpointCandidates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.urls.join(", "))
    }
}
