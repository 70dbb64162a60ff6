//! # State Module
//!
//! Versioned system state that plugs into the checkpoint envelope.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`VersionedState`] | Current version, history, learning ledger; implements [`StateStore`](crate::resilience::StateStore) |
//! | [`recovery_chain`] | Restore previous version > safe mode > emergency shutdown |
//! | [`next_patch_version`] | Patch-level version bump |
//!
//! ```rust
//! use resilient_llm_backend::resilience::with_checkpoint;
//! use resilient_llm_backend::state::VersionedState;
//! use resilient_llm_backend::{Error, ErrorContext};
//!
//! # tokio_test::block_on(async {
//! let state = VersionedState::default();
//! let result: resilient_llm_backend::Result<()> = with_checkpoint(&state, "upgrade", || async {
//!     state.bump_patch(vec!["new prompt template".into()]).await?;
//!     Err(Error::runtime_with_context("smoke test failed", ErrorContext::new()))
//! })
//! .await;
//! assert!(result.is_err());
//! assert_eq!(state.current_version().await, "1.0.0");
//! # });
//! ```

mod recovery;
mod versioned;

pub use recovery::{recover, recovery_chain, RecoveryAction};
pub use versioned::{
    next_patch_version, LearningEntry, OperatingMode, SystemState, VersionRecord, VersionedState,
    MINIMAL_VERSION,
};
