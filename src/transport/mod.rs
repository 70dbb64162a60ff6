//! Outbound HTTP seam.
//!
//! Every network call made by the prober, the model cache and the dispatcher
//! goes through [`Transport`], always with an explicit deadline. The default
//! implementation is [`HttpTransport`]; tests substitute a scripted double.

mod http;

pub use http::HttpTransport;

use crate::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Per-call options: deadline and optional bearer credential.
#[derive(Debug, Clone, Copy)]
pub struct CallOptions<'a> {
    pub timeout: Duration,
    pub bearer: Option<&'a str>,
}

impl<'a> CallOptions<'a> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            bearer: None,
        }
    }

    pub fn with_bearer(mut self, bearer: Option<&'a str>) -> Self {
        self.bearer = bearer;
        self
    }
}

/// Raw response: status code plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Only a plain 200 counts as success for the backends we talk to.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, opts: CallOptions<'_>) -> Result<TransportResponse>;

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        opts: CallOptions<'_>,
    ) -> Result<TransportResponse>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request exceeded {}ms deadline", .0.as_millis())]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Other(String),
}
