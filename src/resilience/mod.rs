//! 弹性模块：回退链执行与检查点恢复。
//!
//! # Resilience Module
//!
//! Two envelopes for work that may hang, fail, or leave state half-changed.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`FallbackExecutor`] | Primary + ordered fallbacks, each under a hard-cancel deadline |
//! | [`FallbackResult`] | First valid value, or the [`MinimalState`] sentinel |
//! | [`with_checkpoint`] | Snapshot, run, restore on failure, reset to minimal if restore fails |
//! | [`StateStore`] | What the checkpoint envelope needs from a piece of state |
//!
//! ## Fallback chain
//!
//! Operations run on their own tasks. A deadline expiry aborts the task and
//! moves on; the chain itself never errors.
//!
//! ```rust
//! use resilient_llm_backend::resilience::{operation, FallbackExecutor, FallbackResult};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let exec = FallbackExecutor::new(Duration::from_secs(1));
//! let result = exec
//!     .run_with_fallback(
//!         operation(|| async { Ok(String::new()) }),
//!         vec![operation(|| async { Ok("cached answer".to_string()) })],
//!         |s: &String| !s.is_empty(),
//!     )
//!     .await;
//! assert_eq!(result.value().map(String::as_str), Some("cached answer"));
//! # });
//! ```

pub mod checkpoint;
pub mod fallback;

pub use checkpoint::{content_checksum, with_checkpoint, Checkpoint, StateStore};
pub use fallback::{
    operation, AttemptSource, ExecutionOutcome, FallbackExecutor, FallbackResult, MinimalState,
    Operation,
};
