use super::{CallOptions, Transport, TransportError, TransportResponse};
use crate::Result;
use async_trait::async_trait;
use reqwest::Proxy;
use std::env;
use std::time::Duration;

/// reqwest-backed transport.
///
/// Holds one pooled client for the lifetime of a configuration epoch. Deadlines
/// are applied per request so probes, listings and chat calls can each use
/// their own budget on the same connection pool.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        // Minimal production-friendly defaults (env-overridable).
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(
                env::var("LLM_HTTP_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(5),
            ))
            .pool_max_idle_per_host(
                env::var("LLM_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(8),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Ok(proxy_url) = env::var("LLM_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder
            .build()
            .map_err(|e| crate::Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self { client })
    }

    /// Wrap an already configured reqwest client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn send(
        &self,
        mut req: reqwest::RequestBuilder,
        opts: &CallOptions<'_>,
    ) -> Result<TransportResponse> {
        req = req.timeout(opts.timeout);
        if let Some(key) = opts.bearer {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(|e| map_reqwest(e, opts.timeout))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| map_reqwest(e, opts.timeout))?;

        Ok(TransportResponse { status, body })
    }
}

fn map_reqwest(e: reqwest::Error, timeout: Duration) -> crate::Error {
    if e.is_timeout() {
        crate::Error::Transport(TransportError::Timeout(timeout))
    } else {
        crate::Error::Transport(TransportError::Http(e))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, opts: CallOptions<'_>) -> Result<TransportResponse> {
        self.send(self.client.get(url), &opts).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        opts: CallOptions<'_>,
    ) -> Result<TransportResponse> {
        self.send(self.client.post(url).json(body), &opts).await
    }
}
