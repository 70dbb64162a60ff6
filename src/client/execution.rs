//! Dispatch execution: native first, then OpenAI-compatible, per address.

use crate::client::core::{Epoch, LlmClient};
use crate::transport::{TransportError, TransportResponse};
use crate::types::response::compatible_content;
use crate::types::{ChatRequest, ChatResponse, Message, NormalizedResult};
use crate::{Error, ErrorContext, Result};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Native chat path.
pub const NATIVE_CHAT_PATH: &str = "/api/chat";

/// OpenAI-compatible chat paths, in trial order.
pub const COMPATIBLE_CHAT_PATHS: &[&str] = &[
    "/v1/chat/completions",
    "/api/v1/chat/completions",
    "/chat/completions",
];

/// Bound `fut` by `limit` from the caller's side, independent of any deadline
/// the transport applies itself. Transport-level timeouts are folded into the
/// same [`Error::Timeout`].
pub(crate) async fn bounded<F>(limit: Duration, ctx: ErrorContext, fut: F) -> Result<TransportResponse>
where
    F: Future<Output = Result<TransportResponse>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(resp)) => Ok(resp),
        Ok(Err(Error::Transport(TransportError::Timeout(elapsed)))) => Err(Error::timeout(elapsed, ctx)),
        Ok(Err(Error::Transport(e))) => Err(Error::network_unreachable(e.to_string(), ctx)),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(Error::timeout(limit, ctx)),
    }
}

impl LlmClient {
    /// Send `request` to the first candidate that answers with content.
    ///
    /// Never fails: per-address errors are absorbed and exhaustion is reported
    /// as [`NormalizedResult::Error`] naming the model and the candidates tried.
    pub async fn chat_completion(&self, request: &ChatRequest) -> NormalizedResult {
        if let Err(e) = request.validate() {
            return NormalizedResult::error(e.to_string());
        }

        let epoch = self.epoch.load_full();
        let mut attempted_model = request.model().to_string();

        for base in epoch.candidates.iter() {
            let model = self.models.resolve_model(base, request.model()).await;
            attempted_model = model.clone();
            let attempt = request.for_model(&model);

            match self.native_chat(&epoch, base, &attempt).await {
                Ok(resp) => return NormalizedResult::Success(resp),
                Err(Error::ModelNotFound { .. }) => {
                    self.models.invalidate(base).await;
                    let retry_model = self.models.resolve_model(base, request.model()).await;
                    info!(
                        base_url = base.as_str(),
                        previous = model.as_str(),
                        retry = retry_model.as_str(),
                        "model not found, retrying native once with re-resolved model"
                    );
                    attempted_model = retry_model.clone();
                    let retry = request.for_model(&retry_model);
                    match self.native_chat(&epoch, base, &retry).await {
                        Ok(resp) => return NormalizedResult::Success(resp),
                        Err(e) => debug!(base_url = base.as_str(), error = %e, "native retry failed"),
                    }
                }
                Err(e) => debug!(base_url = base.as_str(), error = %e, "native chat failed"),
            }

            let compatible = request.for_model(&attempted_model);
            for path in COMPATIBLE_CHAT_PATHS {
                match self.compatible_chat(&epoch, base, path, &compatible).await {
                    Ok(resp) => return NormalizedResult::Success(resp),
                    Err(e) => debug!(base_url = base.as_str(), path = *path, error = %e, "compatible chat failed"),
                }
            }
        }

        warn!(model = attempted_model.as_str(), candidates = %epoch.candidates, "no chat endpoint answered");
        NormalizedResult::error(format!(
            "No valid chat completion endpoints found. Tried model: {}, URLs: {}",
            attempted_model, epoch.candidates
        ))
    }

    /// Single user turn with configured defaults.
    pub async fn simple_completion(&self, prompt: &str, model: Option<&str>) -> NormalizedResult {
        let config = self.config();
        let mut request = ChatRequest::from_config(vec![Message::user(prompt)], &config);
        if let Some(m) = model {
            request = request.for_model(m);
        }
        self.chat_completion(&request).await
    }

    async fn native_chat(&self, epoch: &Epoch, base: &str, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}{}", base, NATIVE_CHAT_PATH);
        let ctx = ErrorContext::new()
            .with_base_url(base)
            .with_model(request.model())
            .with_source("native");
        let limit = epoch.config.timeouts.chat();
        let payload = request.native_payload();
        let resp = bounded(
            limit,
            ctx.clone(),
            self.transport.post_json(&url, &payload, epoch.call_options(limit)),
        )
        .await?;

        if resp.is_not_found() {
            return Err(Error::model_not_found(request.model(), ctx));
        }
        if !resp.is_ok() {
            return Err(Error::protocol_mismatch(format!("HTTP {}", resp.status), ctx));
        }
        let body: Value = resp
            .json()
            .map_err(|_| Error::protocol_mismatch("response is not JSON", ctx.clone()))?;
        match body
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
        {
            Some(content) => Ok(ChatResponse::Native {
                content: content.to_string(),
            }),
            None => Err(Error::protocol_mismatch("missing message.content", ctx)),
        }
    }

    async fn compatible_chat(
        &self,
        epoch: &Epoch,
        base: &str,
        path: &str,
        request: &ChatRequest,
    ) -> Result<ChatResponse> {
        let url = format!("{}{}", base, path);
        let ctx = ErrorContext::new()
            .with_base_url(base)
            .with_model(request.model())
            .with_source(path);
        let limit = epoch.config.timeouts.chat();
        let payload = request.compatible_payload();
        let resp = bounded(
            limit,
            ctx.clone(),
            self.transport.post_json(&url, &payload, epoch.call_options(limit)),
        )
        .await?;

        if !resp.is_ok() {
            return Err(Error::protocol_mismatch(format!("HTTP {}", resp.status), ctx));
        }
        let body: Value = resp
            .json()
            .map_err(|_| Error::protocol_mismatch("response is not JSON", ctx.clone()))?;
        if compatible_content(&body).is_none() {
            return Err(Error::protocol_mismatch("no choices content", ctx));
        }
        Ok(ChatResponse::Compatible { body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::transport::testing::ScriptedTransport;
    use crate::transport::{CallOptions, Transport};
    use async_trait::async_trait;
    use std::sync::Arc;

    const A: &str = "http://a:11434";
    const B: &str = "http://b:11434";
    const NATIVE_OK: &str = r#"{"message":{"role":"assistant","content":"hi from native"}}"#;
    const COMPAT_OK: &str = r#"{"choices":[{"message":{"role":"assistant","content":"hi from compat"}}]}"#;

    fn client(t: Arc<ScriptedTransport>) -> LlmClient {
        LlmClient::builder()
            .config(ClientConfig::default().with_default_candidates(false))
            .transport(t)
            .candidates([A, B])
            .build()
            .unwrap()
    }

    fn tags(models: &[&str]) -> String {
        let entries: Vec<String> = models
            .iter()
            .map(|m| format!(r#"{{"name":"{}"}}"#, m))
            .collect();
        format!(r#"{{"models":[{}]}}"#, entries.join(","))
    }

    fn posts(t: &ScriptedTransport) -> Vec<String> {
        t.calls()
            .into_iter()
            .filter(|c| c.method == "POST")
            .map(|c| c.url)
            .collect()
    }

    #[tokio::test]
    async fn native_success_short_circuits() {
        let t = Arc::new(
            ScriptedTransport::new()
                .respond("GET", &format!("{A}/api/tags"), 200, &tags(&["phi3:mini"]))
                .respond("POST", &format!("{A}/api/chat"), 200, NATIVE_OK),
        );
        let c = client(t.clone());
        let r = c.chat_completion(&ChatRequest::prompt("hello", "phi3:mini")).await;
        assert_eq!(r.content(), Some("hi from native"));
        assert_eq!(posts(&t), vec![format!("{A}/api/chat")]);
        assert_eq!(t.calls_to(B), 0);
    }

    #[tokio::test]
    async fn compatible_paths_follow_native_in_order() {
        let t = Arc::new(
            ScriptedTransport::new()
                .respond("POST", &format!("{A}/api/chat"), 500, "")
                .respond("POST", &format!("{A}/v1/chat/completions"), 404, "")
                .respond("POST", &format!("{A}/api/v1/chat/completions"), 200, COMPAT_OK),
        );
        let c = client(t.clone());
        let r = c.chat_completion(&ChatRequest::prompt("hello", "m")).await;
        assert_eq!(r.content(), Some("hi from compat"));
        assert_eq!(
            posts(&t),
            vec![
                format!("{A}/api/chat"),
                format!("{A}/v1/chat/completions"),
                format!("{A}/api/v1/chat/completions"),
            ]
        );
        assert_eq!(t.calls_to(B), 0);
    }

    #[tokio::test]
    async fn compatible_without_content_is_skipped() {
        let t = Arc::new(
            ScriptedTransport::new()
                .respond("POST", &format!("{A}/v1/chat/completions"), 200, r#"{"object":"list"}"#)
                .respond("POST", &format!("{A}/chat/completions"), 200, COMPAT_OK),
        );
        let r = client(t).chat_completion(&ChatRequest::prompt("hello", "m")).await;
        assert_eq!(r.content(), Some("hi from compat"));
    }

    #[tokio::test]
    async fn not_found_evicts_and_retries_exactly_once() {
        let t = Arc::new(
            ScriptedTransport::new()
                .respond("GET", &format!("{A}/api/tags"), 200, &tags(&["llama3:8b"]))
                .respond("POST", &format!("{A}/api/chat"), 404, r#"{"error":"model not found"}"#),
        );
        let c = client(t.clone());
        let r = c.chat_completion(&ChatRequest::prompt("hello", "llama3:8b")).await;
        assert!(!r.is_success());

        assert_eq!(
            t.calls()
                .iter()
                .filter(|c| c.url == format!("{A}/api/chat"))
                .count(),
            2
        );
        assert_eq!(t.calls_to(&format!("{A}/api/tags")), 2);
        assert_eq!(c.model_cache().stats().evictions, 1);
    }

    #[tokio::test]
    async fn retry_uses_re_resolved_model() {
        let t = Arc::new(
            ScriptedTransport::new()
                .respond("GET", &format!("{A}/api/tags"), 200, &tags(&["llama3:8b"]))
                .respond("GET", &format!("{A}/api/tags"), 200, &tags(&["gemma2:2b"]))
                .respond("POST", &format!("{A}/api/chat"), 404, "")
                .respond("POST", &format!("{A}/api/chat"), 200, NATIVE_OK),
        );
        let c = client(t.clone());
        let r = c.chat_completion(&ChatRequest::prompt("hello", "llama3:8b")).await;
        assert_eq!(r.content(), Some("hi from native"));

        let bodies: Vec<_> = t
            .calls()
            .into_iter()
            .filter(|c| c.method == "POST")
            .filter_map(|c| c.body)
            .collect();
        assert_eq!(bodies[0]["model"], "llama3:8b");
        assert_eq!(bodies[1]["model"], "gemma2:2b");
    }

    #[tokio::test]
    async fn substituted_model_is_sent() {
        let t = Arc::new(
            ScriptedTransport::new()
                .respond("GET", &format!("{A}/api/tags"), 200, &tags(&["phi3:mini"]))
                .respond("POST", &format!("{A}/api/chat"), 200, NATIVE_OK),
        );
        let c = client(t.clone());
        c.chat_completion(&ChatRequest::prompt("hello", "x")).await;
        let sent = t.calls().into_iter().find(|c| c.method == "POST").unwrap();
        assert_eq!(sent.body.unwrap()["model"], "phi3:mini");
    }

    #[tokio::test]
    async fn exhaustion_names_model_and_candidates() {
        let c = client(Arc::new(ScriptedTransport::new()));
        let r = c.chat_completion(&ChatRequest::prompt("hello", "x")).await;
        assert_eq!(
            r.error_message(),
            Some("No valid chat completion endpoints found. Tried model: x, URLs: [http://a:11434, http://b:11434]")
        );
    }

    #[tokio::test]
    async fn invalid_request_never_touches_network() {
        let t = Arc::new(ScriptedTransport::new());
        let c = client(t.clone());
        let r = c
            .chat_completion(&ChatRequest::prompt("hello", "m").with_temperature(9.0))
            .await;
        assert!(!r.is_success());
        assert!(t.calls().is_empty());
    }

    #[tokio::test]
    async fn simple_completion_uses_default_model() {
        let t = Arc::new(ScriptedTransport::new().respond("POST", &format!("{A}/api/chat"), 200, NATIVE_OK));
        let c = client(t.clone());
        assert!(c.simple_completion("hi", None).await.is_success());
        let sent = t.calls().into_iter().find(|c| c.method == "POST").unwrap();
        let body = sent.body.unwrap();
        assert_eq!(body["model"], "phi3:mini");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    struct Hanging;

    #[async_trait]
    impl Transport for Hanging {
        async fn get(&self, _url: &str, _opts: CallOptions<'_>) -> Result<TransportResponse> {
            std::future::pending().await
        }

        async fn post_json(&self, _url: &str, _body: &Value, _opts: CallOptions<'_>) -> Result<TransportResponse> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn bounded_enforces_deadline_externally() {
        let t = Hanging;
        let err = bounded(
            Duration::from_millis(20),
            ErrorContext::new(),
            t.get("http://x", CallOptions::new(Duration::from_secs(60))),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "timeout");
    }

    #[tokio::test]
    async fn bounded_maps_transport_timeout() {
        let err = bounded(Duration::from_secs(1), ErrorContext::new(), async {
            Err(Error::Transport(TransportError::Timeout(Duration::from_millis(5))))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Timeout { elapsed, .. } if elapsed == Duration::from_millis(5)));
    }
}
