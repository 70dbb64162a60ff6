//! Logical chat request and its two wire encodings.

use super::message::Message;
use crate::config::ClientConfig;
use crate::{Error, ErrorContext, Result};
use serde_json::{json, Value};

/// A protocol-independent chat request.
///
/// Immutable per dispatch attempt: substituting the model yields a new request
/// via [`ChatRequest::for_model`], the original is left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    messages: Vec<Message>,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>, model: impl Into<String>) -> Self {
        Self {
            messages,
            model: model.into(),
            temperature: crate::config::DEFAULT_TEMPERATURE,
            max_tokens: crate::config::DEFAULT_MAX_TOKENS,
        }
    }

    /// Build a request using the model, temperature and token budget defaults
    /// from `config`.
    pub fn from_config(messages: Vec<Message>, config: &ClientConfig) -> Self {
        Self {
            messages,
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            max_tokens: config.default_max_tokens,
        }
    }

    /// Single user turn.
    pub fn prompt(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(vec![Message::user(text)], model)
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// A new attempt of the same request against another model.
    pub fn for_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn validate(&self) -> Result<()> {
        if self.messages.is_empty() {
            return Err(Error::validation_with_context(
                "chat request has no messages",
                ErrorContext::new()
                    .with_field_path("request.messages")
                    .with_source("request_validator"),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::validation_with_context(
                format!("temperature {} outside 0.0..=2.0", self.temperature),
                ErrorContext::new()
                    .with_field_path("request.temperature")
                    .with_source("request_validator"),
            ));
        }
        if self.max_tokens == 0 {
            return Err(Error::validation_with_context(
                "max_tokens must be positive",
                ErrorContext::new()
                    .with_field_path("request.max_tokens")
                    .with_source("request_validator"),
            ));
        }
        Ok(())
    }

    /// Body for `POST {base}/api/chat`.
    pub fn native_payload(&self) -> Value {
        json!({
            "model": self.model,
            "messages": self.messages,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            },
        })
    }

    /// Body for the OpenAI-compatible chat completion paths.
    pub fn compatible_payload(&self) -> Value {
        json!({
            "model": self.model,
            "messages": self.messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_payload_shape() {
        let req = ChatRequest::prompt("hi", "phi3:mini")
            .with_temperature(0.5)
            .with_max_tokens(64);
        let v = req.native_payload();
        assert_eq!(v["model"], "phi3:mini");
        assert_eq!(v["stream"], false);
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["options"]["temperature"], 0.5);
        assert_eq!(v["options"]["num_predict"], 64);
    }

    #[test]
    fn compatible_payload_shape() {
        let v = ChatRequest::prompt("hi", "m").with_max_tokens(10).compatible_payload();
        assert_eq!(v["max_tokens"], 10);
        assert!(v.get("stream").is_none());
        assert!(v.get("options").is_none());
    }

    #[test]
    fn default_temperature_is_sent_exactly() {
        let req = ChatRequest::prompt("hi", "m");
        let native = serde_json::to_string(&req.native_payload()).unwrap();
        let compat = serde_json::to_string(&req.compatible_payload()).unwrap();
        assert!(native.contains(r#""temperature":0.7"#), "{native}");
        assert!(compat.contains(r#""temperature":0.7"#), "{compat}");

        let cfg = ClientConfig::from_lookup(|k| (k == "LLM_TEMPERATURE").then(|| "0.3".to_string())).unwrap();
        let wire = ChatRequest::from_config(vec![Message::user("x")], &cfg).compatible_payload();
        assert!(serde_json::to_string(&wire).unwrap().contains(r#""temperature":0.3"#));
    }

    #[test]
    fn for_model_leaves_original_untouched() {
        let original = ChatRequest::prompt("hi", "llama3:70b");
        let retry = original.for_model("phi3:mini");
        assert_eq!(original.model(), "llama3:70b");
        assert_eq!(retry.model(), "phi3:mini");
        assert_eq!(retry.messages(), original.messages());
    }

    #[test]
    fn validation_rules() {
        assert!(ChatRequest::prompt("hi", "m").validate().is_ok());
        assert!(ChatRequest::new(vec![], "m").validate().is_err());
        assert!(ChatRequest::prompt("hi", "m")
            .with_temperature(2.1)
            .validate()
            .is_err());
        assert!(ChatRequest::prompt("hi", "m")
            .with_max_tokens(0)
            .validate()
            .is_err());
    }

    #[test]
    fn from_config_uses_defaults() {
        let cfg = ClientConfig::default().with_default_model("tinyllama");
        let req = ChatRequest::from_config(vec![Message::user("x")], &cfg);
        assert_eq!(req.model(), "tinyllama");
        assert_eq!(req.max_tokens(), 1000);
    }
}
