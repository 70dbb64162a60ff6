use crate::client::core::{Epoch, LlmClient};
use crate::config::ClientConfig;
use crate::endpoint::EndpointCandidates;
use crate::models::ModelCache;
use crate::transport::{HttpTransport, Transport};
use crate::Result;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Builder for [`LlmClient`].
///
/// Keep this surface area small and predictable.
pub struct LlmClientBuilder {
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn Transport>>,
    candidates: Option<Vec<String>>,
}

impl LlmClientBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            transport: None,
            candidates: None,
        }
    }

    /// Use `config` instead of [`ClientConfig::from_env`].
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the reqwest transport (tests, instrumentation).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Pin the initial candidate list instead of deriving it from the config.
    ///
    /// A later [`LlmClient::set_base_url`] rebuilds the list from config rules.
    pub fn candidates<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = Some(addresses.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> Result<LlmClient> {
        let config = match self.config {
            Some(c) => {
                c.validate()?;
                c
            }
            None => ClientConfig::from_env()?,
        };

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new()?),
        };

        let candidates = match self.candidates {
            Some(list) => EndpointCandidates::from_addresses(list),
            None => Epoch::candidates_for(&config),
        };

        let models = ModelCache::new(
            transport.clone(),
            config.model_cache_ttl(),
            config.timeouts.list(),
        );
        models.set_bearer(config.api_key.clone());

        Ok(LlmClient {
            epoch: ArcSwap::from_pointee(Epoch {
                config: Arc::new(config),
                candidates: Arc::new(candidates),
            }),
            transport,
            models: Arc::new(models),
        })
    }
}

impl Default for LlmClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
