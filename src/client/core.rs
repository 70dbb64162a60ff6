use crate::config::ClientConfig;
use crate::endpoint::{ConnectionReport, EndpointCandidates, Prober, ProtocolKind};
use crate::models::ModelCache;
use crate::transport::{CallOptions, Transport};
use crate::Result;
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::info;

/// One configuration epoch: a config snapshot and the candidate list derived
/// from it. Replaced wholesale, never edited.
#[derive(Debug)]
pub(crate) struct Epoch {
    pub(crate) config: Arc<ClientConfig>,
    pub(crate) candidates: Arc<EndpointCandidates>,
}

impl Epoch {
    pub(crate) fn candidates_for(config: &ClientConfig) -> EndpointCandidates {
        if config.include_default_candidates {
            EndpointCandidates::build(config.base_url.as_deref())
        } else {
            EndpointCandidates::from_addresses(config.base_url.as_deref())
        }
    }

    pub(crate) fn call_options(&self, timeout: std::time::Duration) -> CallOptions<'_> {
        CallOptions::new(timeout).with_bearer(self.config.api_key.as_deref())
    }
}

/// Client for a native chat backend with OpenAI-compatible fallback.
///
/// Cheap to share behind an `Arc`; configuration changes swap in a new epoch
/// while in-flight dispatches finish against the one they loaded.
pub struct LlmClient {
    pub(crate) epoch: ArcSwap<Epoch>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) models: Arc<ModelCache>,
}

impl LlmClient {
    /// Client configured from the environment, using the reqwest transport.
    pub fn from_env() -> Result<Self> {
        crate::client::builder::LlmClientBuilder::new().build()
    }

    pub fn new(config: ClientConfig) -> Result<Self> {
        crate::client::builder::LlmClientBuilder::new()
            .config(config)
            .build()
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        crate::client::builder::LlmClientBuilder::new()
            .config(config)
            .transport(transport)
            .build()
    }

    pub fn builder() -> crate::client::builder::LlmClientBuilder {
        crate::client::builder::LlmClientBuilder::new()
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<ClientConfig> {
        self.epoch.load().config.clone()
    }

    /// Current candidate list.
    pub fn candidates(&self) -> Arc<EndpointCandidates> {
        self.epoch.load().candidates.clone()
    }

    pub fn model_cache(&self) -> &ModelCache {
        &self.models
    }

    /// Point the client at a new primary address.
    ///
    /// Starts a new epoch (fresh candidate list) and drops every cached model
    /// listing.
    pub async fn set_base_url(&self, url: impl Into<String>) {
        let current = self.epoch.load_full();
        let config = (*current.config).clone().with_base_url(url);
        let candidates = Epoch::candidates_for(&config);
        info!(candidates = %candidates, "base url changed, new candidate epoch");
        self.epoch.store(Arc::new(Epoch {
            config: Arc::new(config),
            candidates: Arc::new(candidates),
        }));
        self.models.invalidate_all().await;
    }

    /// Set or clear the bearer credential for subsequent calls.
    pub fn set_api_key(&self, api_key: Option<String>) {
        let current = self.epoch.load_full();
        let config = (*current.config).clone().with_api_key(api_key.clone());
        self.epoch.store(Arc::new(Epoch {
            config: Arc::new(config),
            candidates: current.candidates.clone(),
        }));
        self.models.set_bearer(api_key);
    }

    fn prober(&self, epoch: &Epoch) -> Prober {
        Prober::new(self.transport.clone(), epoch.config.timeouts.probe())
            .with_bearer(epoch.config.api_key.clone())
    }

    /// Classify one address. Never fails; see [`Prober::probe`].
    pub async fn probe(&self, base: &str) -> ProtocolKind {
        let epoch = self.epoch.load_full();
        self.prober(&epoch).probe(base).await
    }

    /// First reachable candidate and the path that answered.
    pub async fn test_connection(&self) -> ConnectionReport {
        let epoch = self.epoch.load_full();
        let report = self.prober(&epoch).test_connection(epoch.candidates.iter()).await;
        if let ConnectionReport::Unreachable { tried } = &report {
            tracing::error!(tried = ?tried, "no valid endpoints found");
        }
        report
    }
}
