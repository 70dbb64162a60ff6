//! Model listing across candidates.

use crate::client::core::LlmClient;
use crate::client::execution::bounded;
use crate::endpoint::{ProtocolKind, COMPATIBLE_PROBE_PATHS};
use crate::models::{parse_tags, TAGS_PATH};
use crate::{Error, ErrorContext, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Models served by the first candidate that answered a listing request.
#[derive(Debug, Clone, Serialize)]
pub struct ModelListing {
    pub base_url: String,
    pub protocol: ProtocolKind,
    /// OpenAI-style `{"object": "list", "data": [...]}`.
    pub data: Value,
}

impl ModelListing {
    /// Model identifiers from `data[].id`.
    pub fn ids(&self) -> Vec<&str> {
        self.data
            .get("data")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|m| m.get("id").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn native_listing(models: &[String]) -> Value {
    let created = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let data: Vec<Value> = models
        .iter()
        .map(|name| {
            json!({
                "id": name,
                "object": "model",
                "created": created,
                "owned_by": "ollama",
                "permission": [],
                "root": name,
                "parent": null,
            })
        })
        .collect();
    json!({ "object": "list", "data": data })
}

impl LlmClient {
    /// List models at the first candidate that answers, native listing first.
    pub async fn list_models(&self) -> Result<ModelListing> {
        let epoch = self.epoch.load_full();
        let limit = epoch.config.timeouts.list();

        for base in epoch.candidates.iter() {
            let ctx = ErrorContext::new().with_base_url(base.as_str()).with_source("list_models");

            let url = format!("{}{}", base, TAGS_PATH);
            match bounded(limit, ctx.clone(), self.transport.get(&url, epoch.call_options(limit))).await {
                Ok(resp) if resp.is_ok() => match parse_tags(&resp.body) {
                    Ok(models) => {
                        return Ok(ModelListing {
                            base_url: base.clone(),
                            protocol: ProtocolKind::Native,
                            data: native_listing(&models),
                        })
                    }
                    Err(e) => debug!(url = url.as_str(), error = %e, "unparseable tag listing"),
                },
                Ok(resp) => debug!(url = url.as_str(), status = resp.status, "tag listing refused"),
                Err(e) => debug!(url = url.as_str(), error = %e, "tag listing failed"),
            }

            for path in COMPATIBLE_PROBE_PATHS {
                let url = format!("{}{}", base, path);
                match bounded(limit, ctx.clone(), self.transport.get(&url, epoch.call_options(limit))).await {
                    Ok(resp) if resp.is_ok() => match resp.json::<Value>() {
                        Ok(data) => {
                            return Ok(ModelListing {
                                base_url: base.clone(),
                                protocol: ProtocolKind::OpenAiCompatible,
                                data,
                            })
                        }
                        Err(e) => debug!(url = url.as_str(), error = %e, "unparseable model listing"),
                    },
                    Ok(resp) => debug!(url = url.as_str(), status = resp.status, "model listing refused"),
                    Err(e) => debug!(url = url.as_str(), error = %e, "model listing failed"),
                }
            }
        }

        Err(Error::network_unreachable(
            format!("no candidate served a model listing, URLs: {}", epoch.candidates),
            ErrorContext::new().with_source("list_models"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::transport::testing::ScriptedTransport;
    use std::sync::Arc;

    fn client(t: Arc<ScriptedTransport>) -> LlmClient {
        LlmClient::builder()
            .config(ClientConfig::default())
            .transport(t)
            .candidates(["http://a", "http://b"])
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn native_tags_become_openai_listing() {
        let t = Arc::new(ScriptedTransport::new().respond(
            "GET",
            "http://a/api/tags",
            200,
            r#"{"models":[{"name":"phi3:mini"},{"name":"gemma2:2b"}]}"#,
        ));
        let listing = client(t).list_models().await.unwrap();
        assert_eq!(listing.protocol, ProtocolKind::Native);
        assert_eq!(listing.ids(), vec!["phi3:mini", "gemma2:2b"]);
        assert_eq!(listing.data["data"][0]["owned_by"], "ollama");
        assert_eq!(listing.data["data"][0]["root"], "phi3:mini");
    }

    #[tokio::test]
    async fn compatible_listing_is_passed_through() {
        let body = r#"{"object":"list","data":[{"id":"gpt-local","object":"model"}]}"#;
        let t = Arc::new(ScriptedTransport::new().respond("GET", "http://b/api/v1/models", 200, body));
        let listing = client(t).list_models().await.unwrap();
        assert_eq!(listing.base_url, "http://b");
        assert_eq!(listing.protocol, ProtocolKind::OpenAiCompatible);
        assert_eq!(listing.data, serde_json::from_str::<Value>(body).unwrap());
    }

    #[tokio::test]
    async fn nothing_answers() {
        let err = client(Arc::new(ScriptedTransport::new()))
            .list_models()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "network_unreachable");
        assert!(err.to_string().contains("[http://a, http://b]"));
    }
}
