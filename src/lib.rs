//! # resilient-llm-backend
//!
//! 面向本地 LLM 服务的弹性后端解析与回退执行层。
//!
//! Resilient backend resolution for a local LLM service: find an address that
//! answers, speak whichever of the two chat protocols it understands, and
//! keep callers out of unbounded hangs.
//!
//! ## Overview
//!
//! A chat request is tried address by address. At each address the native
//! protocol goes first; OpenAI-compatible paths follow. The model is resolved
//! against a cached listing of what the address actually serves, and a
//! "model not found" answer evicts that listing and retries once.
//!
//! Around that, two envelopes make risky work survivable: a fallback chain
//! that hard-cancels hung operations and degrades to a minimal-state sentinel,
//! and a checkpoint envelope that rolls state back when a mutation fails.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resilient_llm_backend::{ChatRequest, ClientConfig, LlmClient, Message};
//!
//! #[tokio::main]
//! async fn main() -> resilient_llm_backend::Result<()> {
//!     let client = LlmClient::new(ClientConfig::from_env()?)?;
//!
//!     let request = ChatRequest::new(vec![Message::user("Hello!")], "phi3:mini")
//!         .with_temperature(0.2);
//!     let result = client.chat_completion(&request).await;
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Client configuration from env, YAML or code |
//! | [`endpoint`] | Candidate addresses and protocol probing |
//! | [`models`] | Model availability cache and substitution policy |
//! | [`client`] | Dual-protocol dispatcher, connection test, model listing |
//! | [`transport`] | Outbound HTTP seam |
//! | [`types`] | Messages, chat requests, normalized results |
//! | [`resilience`] | Fallback chain executor and checkpoint envelope |
//! | [`state`] | Versioned system state and recovery chain |

pub mod client;
pub mod config;
pub mod endpoint;
pub mod models;
pub mod resilience;
pub mod state;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::{LlmClient, LlmClientBuilder, ModelListing};
pub use config::{ClientConfig, Timeouts};
pub use endpoint::{ConnectionReport, EndpointCandidates, ProtocolKind};
pub use resilience::{FallbackExecutor, FallbackResult, MinimalState};
pub use types::{ChatRequest, ChatResponse, Message, MessageRole, NormalizedResult};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
