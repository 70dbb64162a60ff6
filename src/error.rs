use crate::transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Structured error context for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "config.temperature")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Component that produced the error (e.g., "dispatcher", "model_cache")
    pub source: Option<String>,
    /// Candidate address the failure is attributed to
    pub base_url: Option<String>,
    /// Model identifier in use when the failure happened
    pub model: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
            base_url: None,
            model: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for backend resolution, dispatch, fallback and checkpointing.
///
/// The first five variants form the failure taxonomy the dispatcher and the
/// fallback executor reason about; the rest wrap lower-level causes.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Network unreachable: {message}{}", format_context(.context))]
    NetworkUnreachable {
        message: String,
        context: ErrorContext,
    },

    #[error("Protocol mismatch: {message}{}", format_context(.context))]
    ProtocolMismatch {
        message: String,
        context: ErrorContext,
    },

    #[error("Model not found: {model}{}", format_context(.context))]
    ModelNotFound { model: String, context: ErrorContext },

    #[error("Timed out after {}ms{}", .elapsed.as_millis(), format_context(.context))]
    Timeout {
        elapsed: Duration,
        context: ErrorContext,
    },

    #[error("Validation failed: {message}{}", format_context(.context))]
    ValidationFailed {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Restore failed: {message}{}", format_context(.context))]
    RestoreFailed {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref base) = ctx.base_url {
        parts.push(format!("base_url: {}", base));
    }
    if let Some(ref model) = ctx.model {
        parts.push(format!("model: {}", model));
    }
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn network_unreachable(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::NetworkUnreachable {
            message: msg.into(),
            context,
        }
    }

    pub fn protocol_mismatch(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::ProtocolMismatch {
            message: msg.into(),
            context,
        }
    }

    pub fn model_not_found(model: impl Into<String>, context: ErrorContext) -> Self {
        Error::ModelNotFound {
            model: model.into(),
            context,
        }
    }

    pub fn timeout(elapsed: Duration, context: ErrorContext) -> Self {
        Error::Timeout { elapsed, context }
    }

    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::ValidationFailed {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn restore_failed(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::RestoreFailed {
            message: msg.into(),
            context,
        }
    }

    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::NetworkUnreachable { context, .. }
            | Error::ProtocolMismatch { context, .. }
            | Error::ModelNotFound { context, .. }
            | Error::Timeout { context, .. }
            | Error::ValidationFailed { context, .. }
            | Error::Configuration { context, .. }
            | Error::RestoreFailed { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Short, stable name of the error class, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NetworkUnreachable { .. } => "network_unreachable",
            Error::ProtocolMismatch { .. } => "protocol_mismatch",
            Error::ModelNotFound { .. } => "model_not_found",
            Error::Timeout { .. } => "timeout",
            Error::ValidationFailed { .. } => "validation_failed",
            Error::Configuration { .. } => "configuration",
            Error::RestoreFailed { .. } => "restore_failed",
            Error::Runtime { .. } => "runtime",
            Error::Transport(TransportError::Timeout(_)) => "timeout",
            Error::Transport(_) => "transport",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
            Error::Yaml(_) => "yaml",
        }
    }

    /// Whether this failure is local to one candidate address / protocol shape
    /// and should simply advance the dispatcher to the next candidate.
    pub fn is_candidate_local(&self) -> bool {
        matches!(
            self,
            Error::NetworkUnreachable { .. }
                | Error::ProtocolMismatch { .. }
                | Error::Timeout { .. }
                | Error::Transport(_)
                | Error::Serialization(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context_fields() {
        let err = Error::network_unreachable(
            "connection refused",
            ErrorContext::new()
                .with_base_url("http://localhost:11434")
                .with_source("dispatcher"),
        );
        let text = err.to_string();
        assert!(text.starts_with("Network unreachable: connection refused"));
        assert!(text.contains("base_url: http://localhost:11434"));
        assert!(text.contains("source: dispatcher"));
    }

    #[test]
    fn display_without_context_has_no_suffix() {
        let err = Error::validation_with_context("empty content", ErrorContext::new());
        assert_eq!(err.to_string(), "Validation failed: empty content");
    }

    #[test]
    fn timeout_reports_millis() {
        let err = Error::timeout(Duration::from_millis(1500), ErrorContext::new());
        assert_eq!(err.to_string(), "Timed out after 1500ms");
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn candidate_local_classification() {
        assert!(Error::protocol_mismatch("bad shape", ErrorContext::new()).is_candidate_local());
        assert!(!Error::model_not_found("x", ErrorContext::new()).is_candidate_local());
        assert!(!Error::restore_failed("checksum", ErrorContext::new()).is_candidate_local());
    }

    #[test]
    fn context_accessor() {
        let err = Error::model_not_found("phi3:mini", ErrorContext::new().with_model("phi3:mini"));
        assert_eq!(
            err.context().and_then(|c| c.model.as_deref()),
            Some("phi3:mini")
        );
        let io: Error = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert!(io.context().is_none());
    }
}
