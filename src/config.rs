//! Client configuration snapshot.
//!
//! A [`ClientConfig`] is a plain immutable value. Changing the base URL or the
//! credential produces a new value which the client swaps in atomically; any
//! dispatch already in flight keeps the snapshot it started with.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "phi3:mini";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_MODEL_CACHE_TTL_SECS: u64 = 300;

const KEYRING_SERVICE: &str = "llm-backend";
const KEYRING_USER: &str = "default";

/// Per-call deadlines, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Protocol probes and connection tests.
    pub probe_secs: u64,
    /// Model listing requests.
    pub list_secs: u64,
    /// Chat round trips; model responses are slow.
    pub chat_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            probe_secs: 5,
            list_secs: 10,
            chat_secs: 120,
        }
    }
}

impl Timeouts {
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn list(&self) -> Duration {
        Duration::from_secs(self.list_secs)
    }

    pub fn chat(&self) -> Duration {
        Duration::from_secs(self.chat_secs)
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Explicit primary address, tried before the well-known candidates.
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub default_model: String,
    pub default_temperature: f64,
    pub default_max_tokens: u32,
    /// When false only `base_url` is tried.
    pub include_default_candidates: bool,
    pub timeouts: Timeouts,
    pub model_cache_ttl_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            default_model: DEFAULT_MODEL.to_string(),
            default_temperature: DEFAULT_TEMPERATURE,
            default_max_tokens: DEFAULT_MAX_TOKENS,
            include_default_candidates: true,
            timeouts: Timeouts::default(),
            model_cache_ttl_secs: DEFAULT_MODEL_CACHE_TTL_SECS,
        }
    }
}

// Keep the credential out of logs.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("include_default_candidates", &self.include_default_candidates)
            .field("timeouts", &self.timeouts)
            .field("model_cache_ttl_secs", &self.model_cache_ttl_secs)
            .finish()
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from process environment, falling back to the OS keyring for the
    /// credential.
    ///
    /// - `LLM_API_BASE_URL`, `OLLAMA_HOST`, `OLLAMA_BASE_URL` (first set wins)
    /// - `LLM_API_KEY`
    /// - `LLM_DEFAULT_MODEL`, `LLM_TEMPERATURE`, `LLM_MAX_TOKENS`
    /// - `LLM_PROBE_TIMEOUT_SECS`, `LLM_LIST_TIMEOUT_SECS`, `LLM_CHAT_TIMEOUT_SECS`
    /// - `LLM_MODEL_CACHE_TTL_SECS`
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::from_lookup(|k| std::env::var(k).ok())?;
        if cfg.api_key.is_none() {
            cfg.api_key = keyring_credential();
        }
        Ok(cfg)
    }

    /// Same as [`ClientConfig::from_env`] but reading variables through `lookup`
    /// and never touching the keyring.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        cfg.base_url = non_blank("LLM_API_BASE_URL")
            .or_else(|| non_blank("OLLAMA_HOST"))
            .or_else(|| non_blank("OLLAMA_BASE_URL"));
        cfg.api_key = non_blank("LLM_API_KEY");

        if let Some(model) = non_blank("LLM_DEFAULT_MODEL") {
            cfg.default_model = model;
        }
        if let Some(t) = non_blank("LLM_TEMPERATURE") {
            cfg.default_temperature = parse_var("LLM_TEMPERATURE", &t)?;
        }
        if let Some(n) = non_blank("LLM_MAX_TOKENS") {
            cfg.default_max_tokens = parse_var("LLM_MAX_TOKENS", &n)?;
        }
        if let Some(s) = non_blank("LLM_PROBE_TIMEOUT_SECS") {
            cfg.timeouts.probe_secs = parse_var("LLM_PROBE_TIMEOUT_SECS", &s)?;
        }
        if let Some(s) = non_blank("LLM_LIST_TIMEOUT_SECS") {
            cfg.timeouts.list_secs = parse_var("LLM_LIST_TIMEOUT_SECS", &s)?;
        }
        if let Some(s) = non_blank("LLM_CHAT_TIMEOUT_SECS") {
            cfg.timeouts.chat_secs = parse_var("LLM_CHAT_TIMEOUT_SECS", &s)?;
        }
        if let Some(s) = non_blank("LLM_MODEL_CACHE_TTL_SECS") {
            cfg.model_cache_ttl_secs = parse_var("LLM_MODEL_CACHE_TTL_SECS", &s)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(Error::configuration_with_context(
                format!(
                    "temperature {} outside 0.0..=2.0",
                    self.default_temperature
                ),
                ErrorContext::new()
                    .with_field_path("config.default_temperature")
                    .with_source("config"),
            ));
        }
        if self.default_max_tokens == 0 {
            return Err(Error::configuration_with_context(
                "max tokens must be positive",
                ErrorContext::new()
                    .with_field_path("config.default_max_tokens")
                    .with_source("config"),
            ));
        }
        let t = &self.timeouts;
        if t.probe_secs == 0 || t.list_secs == 0 || t.chat_secs == 0 {
            return Err(Error::configuration_with_context(
                "timeouts must be at least one second",
                ErrorContext::new()
                    .with_field_path("config.timeouts")
                    .with_source("config"),
            ));
        }
        Ok(())
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_default_candidates(mut self, include: bool) -> Self {
        self.include_default_candidates = include;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_model_cache_ttl(mut self, ttl: Duration) -> Self {
        self.model_cache_ttl_secs = ttl.as_secs();
        self
    }

    pub fn model_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.model_cache_ttl_secs)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        Error::configuration_with_context(
            format!("cannot parse {}={:?}", name, raw),
            ErrorContext::new()
                .with_field_path(name.to_string())
                .with_source("config"),
        )
    })
}

fn keyring_credential() -> Option<String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER).ok()?;
    entry.get_password().ok().filter(|k| !k.trim().is_empty())
}
