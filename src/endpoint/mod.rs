//! # Endpoint Module
//!
//! Where to send requests, and what the far side speaks.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`EndpointCandidates`] | Ordered, deduplicated base addresses |
//! | [`Prober`] | Classifies an address as [`ProtocolKind::Native`] or compatible |
//! | [`ConnectionReport`] | First reachable address and path |
//!
//! ```rust
//! use resilient_llm_backend::endpoint::EndpointCandidates;
//!
//! let candidates = EndpointCandidates::build(Some("http://gpu-box:11434/"));
//! assert_eq!(candidates.as_slice()[0], "http://gpu-box:11434");
//! assert_eq!(candidates.as_slice()[1], "http://llm_service:11434");
//! ```

mod candidates;
mod probe;

pub use candidates::{
    normalize_base_url, EndpointCandidates, HOST_BRIDGE_CANDIDATE, LOOPBACK_CANDIDATES,
    SERVICE_CANDIDATES,
};
pub use probe::{
    ConnectionReport, ProtocolKind, Prober, COMPATIBLE_PROBE_PATHS, HEALTH_PATHS,
    NATIVE_PROBE_PATHS,
};
