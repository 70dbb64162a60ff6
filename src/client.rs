//! Dual-protocol chat client.
//!
//! Developer-friendly goal: keep the public surface small and predictable.
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod core;
mod endpoint;
mod execution;

pub use builder::LlmClientBuilder;
pub use core::LlmClient;
pub use endpoint::ModelListing;
pub use execution::{COMPATIBLE_CHAT_PATHS, NATIVE_CHAT_PATH};
