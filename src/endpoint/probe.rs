//! Protocol detection per base address.

use crate::transport::{CallOptions, Transport};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Native protocol probe paths, in order.
pub const NATIVE_PROBE_PATHS: &[&str] = &["/api/version", "/api/tags"];

/// OpenAI-compatible listing paths, in order.
pub const COMPATIBLE_PROBE_PATHS: &[&str] = &["/v1/models", "/api/v1/models", "/models"];

/// Generic health paths consulted only by the connection test.
pub const HEALTH_PATHS: &[&str] = &["/health", "/api/health"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    Native,
    OpenAiCompatible,
    Unknown,
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProtocolKind::Native => "native",
            ProtocolKind::OpenAiCompatible => "openai_compatible",
            ProtocolKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Result of [`Prober::test_connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionReport {
    Connected { base_url: String, endpoint: String },
    Unreachable { tried: Vec<String> },
}

impl ConnectionReport {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionReport::Connected { .. })
    }

    pub fn to_envelope(&self) -> Value {
        match self {
            ConnectionReport::Connected { base_url, endpoint } => json!({
                "status": "success",
                "endpoint": endpoint,
                "base_url": base_url,
                "message": "Connection successful",
            }),
            ConnectionReport::Unreachable { tried } => json!({
                "status": "error",
                "message": format!("No valid endpoints found. Tried: [{}]", tried.join(", ")),
            }),
        }
    }
}

/// Short-timeout reads against well-known paths.
///
/// Probing is an ordering hint for callers, never a gate: it does not raise,
/// and failures of any kind count as a negative answer.
#[derive(Clone)]
pub struct Prober {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    bearer: Option<String>,
}

impl Prober {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport,
            timeout,
            bearer: None,
        }
    }

    pub fn with_bearer(mut self, bearer: Option<String>) -> Self {
        self.bearer = bearer;
        self
    }

    /// First path in `paths` answering HTTP 200 at `base`.
    async fn first_ok(&self, base: &str, paths: &[&'static str]) -> Option<&'static str> {
        let opts = CallOptions::new(self.timeout).with_bearer(self.bearer.as_deref());
        for path in paths {
            let url = format!("{}{}", base, path);
            match tokio::time::timeout(self.timeout, self.transport.get(&url, opts)).await {
                Ok(Ok(resp)) if resp.is_ok() => return Some(*path),
                Ok(Ok(resp)) => debug!(url = url.as_str(), status = resp.status, "probe negative"),
                Ok(Err(e)) => debug!(url = url.as_str(), error = %e, "probe failed"),
                Err(_) => debug!(url = url.as_str(), "probe timed out"),
            }
        }
        None
    }

    pub async fn probe(&self, base: &str) -> ProtocolKind {
        if self.first_ok(base, NATIVE_PROBE_PATHS).await.is_some() {
            return ProtocolKind::Native;
        }
        if self.first_ok(base, COMPATIBLE_PROBE_PATHS).await.is_some() {
            return ProtocolKind::OpenAiCompatible;
        }
        ProtocolKind::Unknown
    }

    /// Walk `candidates` and report the first address answering any native,
    /// compatible or health path.
    pub async fn test_connection<'a, I>(&self, candidates: I) -> ConnectionReport
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut tried = Vec::new();
        for base in candidates {
            tried.push(base.clone());
            for group in [NATIVE_PROBE_PATHS, COMPATIBLE_PROBE_PATHS, HEALTH_PATHS] {
                if let Some(path) = self.first_ok(base, group).await {
                    info!(base_url = base.as_str(), endpoint = path, "connection established");
                    return ConnectionReport::Connected {
                        base_url: base.clone(),
                        endpoint: path.to_string(),
                    };
                }
            }
        }
        ConnectionReport::Unreachable { tried }
    }
}
