//! Model substitution policy.

/// Small, fast models preferred when the requested one is not served.
///
/// The order is policy and is kept literally.
pub const FALLBACK_MODELS: &[&str] = &[
    "phi3:mini",
    "tinyllama",
    "tinyllama:latest",
    "phi3:3.8b",
    "llama3.2:1b",
    "llama3.2:3b",
    "gemma2:2b",
    "qwen2:0.5b",
    "qwen2:1.5b",
];

/// How a model identifier was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelChoice {
    /// The requested model is served.
    Exact(String),
    /// A preferred fallback from [`FALLBACK_MODELS`].
    Fallback(String),
    /// The first model in listing order.
    FirstAvailable(String),
    /// Nothing is known to be served; the request goes out unchanged.
    Requested(String),
}

impl ModelChoice {
    pub fn model(&self) -> &str {
        match self {
            ModelChoice::Exact(m)
            | ModelChoice::Fallback(m)
            | ModelChoice::FirstAvailable(m)
            | ModelChoice::Requested(m) => m,
        }
    }

    pub fn into_model(self) -> String {
        match self {
            ModelChoice::Exact(m)
            | ModelChoice::Fallback(m)
            | ModelChoice::FirstAvailable(m)
            | ModelChoice::Requested(m) => m,
        }
    }

    pub fn is_substitution(&self) -> bool {
        matches!(
            self,
            ModelChoice::Fallback(_) | ModelChoice::FirstAvailable(_)
        )
    }
}

/// Exact match > fallback list order > first available > requested.
pub fn select_model(available: &[String], requested: &str) -> ModelChoice {
    if available.is_empty() {
        return ModelChoice::Requested(requested.to_string());
    }
    if available.iter().any(|m| m == requested) {
        return ModelChoice::Exact(requested.to_string());
    }
    if let Some(fb) = FALLBACK_MODELS
        .iter()
        .find(|fb| available.iter().any(|m| m == *fb))
    {
        return ModelChoice::Fallback((*fb).to_string());
    }
    ModelChoice::FirstAvailable(available[0].clone())
}
